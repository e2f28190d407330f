//! ChESS X-corner detection via `chess-corners`.

use checkercal_core::GrayImageView;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// An X-junction with its diagonal direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XCorner {
    pub position: Point2<f32>,
    /// Direction of one checker diagonal through the corner, modulo π.
    /// Grid neighbours have orthogonal diagonals.
    pub orientation: f32,
    pub response: f32,
}

/// Detector knobs forwarded to [`ChessConfig`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessCornerParams {
    /// Keep responses above this fraction of the strongest one.
    pub threshold_rel: f32,
    /// Absolute response floor; overrides `threshold_rel` when set.
    pub threshold_abs: Option<f32>,
    /// Half side of the non-maximum suppression window.
    pub nms_radius: u32,
}

impl Default for ChessCornerParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            threshold_abs: None,
            nms_radius: 2,
        }
    }
}

impl ChessCornerParams {
    pub fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel;
        if self.threshold_abs.is_some() {
            cfg.params.threshold_abs = self.threshold_abs;
        }
        cfg.params.nms_radius = self.nms_radius;
        cfg
    }
}

/// Detect X-corners. Images too small to hold the detector ring yield none.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(w = image.width, h = image.height))
)]
pub fn detect_xcorners(image: &GrayImageView<'_>, params: &ChessCornerParams) -> Vec<XCorner> {
    let Some(img) = to_image(image) else {
        return Vec::new();
    };
    find_chess_corners_image(&img, &params.chess_config())
        .iter()
        .map(adapt_chess_corner)
        .collect()
}

fn to_image(view: &GrayImageView<'_>) -> Option<image::GrayImage> {
    let len = view.width.checked_mul(view.height)?;
    let pixels = view.data.get(..len)?;
    image::GrayImage::from_raw(
        u32::try_from(view.width).ok()?,
        u32::try_from(view.height).ok()?,
        pixels.to_vec(),
    )
}

fn adapt_chess_corner(c: &CornerDescriptor) -> XCorner {
    XCorner {
        position: Point2::new(c.x, c.y),
        orientation: c.orientation,
        response: c.response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::axis_vec_diff;
    use checkercal_core::GrayImage;
    use std::f32::consts::FRAC_PI_2;

    /// Four quadrants meeting at (30, 30).
    fn saddle(bright_main_diagonal: bool) -> GrayImage {
        let (w, h) = (60, 60);
        let mut data = vec![30u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let same = (x < 30) == (y < 30);
                if same == bright_main_diagonal {
                    data[y * w + x] = 220;
                }
            }
        }
        GrayImage::new(w, h, data).unwrap()
    }

    #[test]
    fn single_saddle_is_found() {
        let img = saddle(true);
        let corners = detect_xcorners(&img.view(), &ChessCornerParams::default());
        assert_eq!(1, corners.len(), "{corners:?}");
        let c = corners[0];
        assert!((c.position.x - 29.5).abs() < 1.0, "{c:?}");
        assert!((c.position.y - 29.5).abs() < 1.0, "{c:?}");
    }

    #[test]
    fn swapped_colors_rotate_the_diagonal() {
        let params = ChessCornerParams::default();
        let a = detect_xcorners(&saddle(true).view(), &params);
        let b = detect_xcorners(&saddle(false).view(), &params);
        assert_eq!((1, 1), (a.len(), b.len()));
        let diff = axis_vec_diff(a[0].orientation, b[0].orientation);
        assert!((diff - FRAC_PI_2).abs() < 0.2, "{a:?} {b:?}");
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = GrayImage::new(60, 60, vec![128; 3600]).unwrap();
        assert!(detect_xcorners(&img.view(), &ChessCornerParams::default()).is_empty());
    }

    #[test]
    fn truncated_view_yields_nothing() {
        let data = vec![0u8; 10];
        let view = GrayImageView {
            width: 8,
            height: 8,
            data: &data,
        };
        assert!(detect_xcorners(&view, &ChessCornerParams::default()).is_empty());
    }
}
