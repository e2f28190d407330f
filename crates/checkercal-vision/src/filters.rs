//! Photometric preprocessing applied before corner finding.

use checkercal_core::{GrayImage, GrayImageView};

/// Stretch intensities linearly to the full `0..=255` range.
///
/// Flat images are returned unchanged.
pub fn normalize_contrast(src: &GrayImageView<'_>) -> GrayImage {
    let (lo, hi) = src
        .data
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi <= lo {
        return to_owned(src);
    }
    let scale = 255.0 / (hi - lo) as f32;
    let data = src
        .data
        .iter()
        .map(|&v| ((v - lo) as f32 * scale).round() as u8)
        .collect();
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

/// Remove slowly varying illumination by subtracting a box-filtered local
/// mean and re-centering at mid-gray.
///
/// `radius` is the half side of the averaging window; it should cover at
/// least one board square so the mean stays between black and white.
pub fn flatten_illumination(src: &GrayImageView<'_>, radius: usize) -> GrayImage {
    let (w, h) = (src.width, src.height);
    let integral = integral_image(src);
    let stride = w + 1;
    let mut data = Vec::with_capacity(w * h);

    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(w);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let area = ((x1 - x0) * (y1 - y0)) as f32;
            let mean = sum as f32 / area;
            let v = 128.0 + src.data[y * w + x] as f32 - mean;
            data.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }

    GrayImage {
        width: w,
        height: h,
        data,
    }
}

/// Summed-area table with a zero first row and column.
fn integral_image(src: &GrayImageView<'_>) -> Vec<u64> {
    let (w, h) = (src.width, src.height);
    let stride = w + 1;
    let mut out = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += src.data[y * w + x] as u64;
            out[(y + 1) * stride + x + 1] = out[y * stride + x + 1] + row_sum;
        }
    }
    out
}

fn to_owned(src: &GrayImageView<'_>) -> GrayImage {
    GrayImage {
        width: src.width,
        height: src.height,
        data: src.data.to_vec(),
    }
}
