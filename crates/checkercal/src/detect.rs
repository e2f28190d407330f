use crate::pipeline::Pipeline;
use checkercal_core::{CalibError, GrayImageView, PatternDetection, PatternSize};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Convert an `image::GrayImage` into the borrowed core view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode any supported image file and convert it to 8-bit gray.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, CalibError> {
    let path = path.as_ref();
    let img = ::image::open(path)
        .map_err(|err| CalibError::ImageUnreadable(format!("{}: {err}", path.display())))?;
    let gray = img.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(CalibError::ImageUnreadable(format!(
            "{}: image is empty",
            path.display()
        )));
    }
    Ok(gray)
}

/// Load an image from disk and run the pattern search on it.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(path, pipeline), fields(path = %path.as_ref().display()))
)]
pub fn detect_image_file<B>(
    path: impl AsRef<Path>,
    hint: Option<PatternSize>,
    pipeline: &Pipeline<B>,
) -> Result<PatternDetection, CalibError>
where
    B: crate::pipeline::VisionBackend,
{
    let gray = load_gray(path)?;
    pipeline.detect(&gray_view(&gray), hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_view_borrows_pixels() {
        let img = ::image::GrayImage::from_fn(5, 3, |x, y| ::image::Luma([(x + 10 * y) as u8]));
        let view = gray_view(&img);
        assert_eq!(5, view.width);
        assert_eq!(3, view.height);
        assert_eq!(21, view.get(1, 2));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = load_gray("/nonexistent/board.png").unwrap_err();
        assert!(matches!(err, CalibError::ImageUnreadable(_)));
    }

    #[test]
    fn garbage_file_is_unreadable() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        std::fs::write(file.path(), b"not a png").unwrap();
        assert!(matches!(
            load_gray(file.path()),
            Err(CalibError::ImageUnreadable(_))
        ));
    }
}
