use crate::CalibError;

/// Borrowed 8-bit grayscale image, row-major with no padding.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // len = width * height
}

impl<'a> GrayImageView<'a> {
    /// Wrap a tightly packed luma buffer, checking its length.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, CalibError> {
        let expected = width.checked_mul(height).ok_or_else(|| {
            CalibError::InvalidInput(format!("image dimensions {width}x{height} overflow"))
        })?;
        if width == 0 || height == 0 {
            return Err(CalibError::InvalidInput(format!(
                "empty image ({width}x{height})"
            )));
        }
        if data.len() != expected {
            return Err(CalibError::InvalidInput(format!(
                "pixel buffer has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Owned 8-bit grayscale image.
#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, CalibError> {
        GrayImageView::new(width, height, &data)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert a strided 1-, 3- or 4-channel 8-bit buffer to luma.
    ///
    /// Color buffers are treated as RGB(A) and weighted `0.299 R + 0.587 G +
    /// 0.114 B`. `stride` is the byte distance between row starts.
    pub fn from_interleaved(
        width: usize,
        height: usize,
        channels: usize,
        stride: usize,
        data: &[u8],
    ) -> Result<Self, CalibError> {
        if width == 0 || height == 0 {
            return Err(CalibError::InvalidInput(format!(
                "empty image ({width}x{height})"
            )));
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(CalibError::InvalidInput(format!(
                "unsupported channel count {channels} (expected 1, 3 or 4)"
            )));
        }
        let row_bytes = width * channels;
        if stride < row_bytes {
            return Err(CalibError::InvalidInput(format!(
                "row stride {stride} is smaller than {row_bytes} bytes per row"
            )));
        }
        let needed = stride * (height - 1) + row_bytes;
        if data.len() < needed {
            return Err(CalibError::InvalidInput(format!(
                "pixel buffer has {} bytes, expected at least {needed}",
                data.len()
            )));
        }

        let mut out = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = &data[y * stride..y * stride + row_bytes];
            match channels {
                1 => out.extend_from_slice(row),
                _ => out.extend(row.chunks_exact(channels).map(|px| {
                    let l = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                    l.round().clamp(0.0, 255.0) as u8
                })),
            }
        }
        Ok(Self {
            width,
            height,
            data: out,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
fn get_gray_clamped(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    let x = x.clamp(0, src.width as i32 - 1) as usize;
    let y = y.clamp(0, src.height as i32 - 1) as usize;
    src.data[y * src.width + x]
}

#[inline]
fn bilinear(fetch: impl Fn(i32, i32) -> u8, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = fetch(x0, y0) as f32;
    let p10 = fetch(x0 + 1, y0) as f32;
    let p01 = fetch(x0, y0 + 1) as f32;
    let p11 = fetch(x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear sample; pixels outside the image read as black.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    bilinear(|px, py| get_gray(src, px, py), x, y)
}

/// Bilinear sample with edge replication.
#[inline]
pub fn sample_bilinear_clamped(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    bilinear(|px, py| get_gray_clamped(src, px, py), x, y)
}
