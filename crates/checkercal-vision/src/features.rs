//! Minimum-eigenvalue ("good features to track") corner detector.
//!
//! Used only to estimate how many corner-like features an image holds, which
//! bounds the automatic pattern-size search.

use checkercal_core::{FeatureCounter, FeatureParams, GrayImageView};
use nalgebra::Point2;

/// Shi–Tomasi corner detector with greedy minimum-distance suppression.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShiTomasiDetector;

impl ShiTomasiDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, image: &GrayImageView<'_>, params: &FeatureParams) -> Vec<Point2<f32>> {
        let (w, h) = (image.width, image.height);
        if w < 3 || h < 3 {
            return Vec::new();
        }

        let response = min_eigen_response(image, params.block_size.max(1));
        let max_resp = response.iter().copied().fold(0.0f32, f32::max);
        if max_resp <= 0.0 {
            return Vec::new();
        }
        let threshold = max_resp * params.quality_level.max(0.0);

        // Local maxima in a 3x3 neighborhood above the quality threshold.
        let mut peaks: Vec<(f32, usize)> = Vec::new();
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let r = response[y * w + x];
                if r <= threshold {
                    continue;
                }
                let mut is_max = true;
                'nbhd: for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let n = ((y as i32 + dy) as usize) * w + (x as i32 + dx) as usize;
                        if response[n] > r {
                            is_max = false;
                            break 'nbhd;
                        }
                    }
                }
                if is_max {
                    peaks.push((r, y * w + x));
                }
            }
        }

        // Strongest first; index order breaks ties so output is deterministic.
        peaks.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let limit = if params.max_features == 0 {
            usize::MAX
        } else {
            params.max_features
        };
        let mut grid = SpacingGrid::new(w, h, params.min_distance);
        let mut out = Vec::new();
        for (_, idx) in peaks {
            let p = Point2::new((idx % w) as f32, (idx / w) as f32);
            if grid.try_insert(p) {
                out.push(p);
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }
}

impl FeatureCounter for ShiTomasiDetector {
    fn detect_features(
        &self,
        image: &GrayImageView<'_>,
        params: &FeatureParams,
    ) -> Vec<Point2<f32>> {
        self.detect(image, params)
    }
}

/// Per-pixel smaller eigenvalue of the gradient structure tensor summed over
/// a `block` × `block` window. Border pixels are zero.
fn min_eigen_response(image: &GrayImageView<'_>, block: usize) -> Vec<f32> {
    let (w, h) = (image.width, image.height);
    let px = |x: usize, y: usize| image.data[y * w + x] as f32;

    let mut ixx = vec![0.0f32; w * h];
    let mut iyy = vec![0.0f32; w * h];
    let mut ixy = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            // 3x3 Sobel, scaled to unit-step gradients.
            let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2.0 * px(x - 1, y)
                - px(x - 1, y + 1))
                / 8.0;
            let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2.0 * px(x, y - 1)
                - px(x + 1, y - 1))
                / 8.0;
            let i = y * w + x;
            ixx[i] = gx * gx;
            iyy[i] = gy * gy;
            ixy[i] = gx * gy;
        }
    }

    let half = (block / 2) as i32;
    let mut out = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
            for dy in -half..=half {
                let yy = (y as i32 + dy).clamp(0, h as i32 - 1) as usize;
                for dx in -half..=half {
                    let xx = (x as i32 + dx).clamp(0, w as i32 - 1) as usize;
                    let i = yy * w + xx;
                    a += ixx[i];
                    b += ixy[i];
                    c += iyy[i];
                }
            }
            let half_trace = 0.5 * (a + c);
            let disc = (0.25 * (a - c) * (a - c) + b * b).sqrt();
            out[y * w + x] = (half_trace - disc).max(0.0);
        }
    }
    out
}

/// Bucket grid answering "is any accepted point closer than `min_distance`".
struct SpacingGrid {
    cell: f32,
    cols: usize,
    rows: usize,
    min_dist_sq: f32,
    buckets: Vec<Vec<Point2<f32>>>,
}

impl SpacingGrid {
    fn new(width: usize, height: usize, min_distance: f32) -> Self {
        let cell = min_distance.max(1.0);
        let cols = (width as f32 / cell).ceil() as usize + 1;
        let rows = (height as f32 / cell).ceil() as usize + 1;
        Self {
            cell,
            cols,
            rows,
            min_dist_sq: min_distance.max(0.0).powi(2),
            buckets: vec![Vec::new(); cols * rows],
        }
    }

    fn try_insert(&mut self, p: Point2<f32>) -> bool {
        let cx = (p.x / self.cell) as usize;
        let cy = (p.y / self.cell) as usize;
        for by in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for bx in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                let too_close = self.buckets[by * self.cols + bx]
                    .iter()
                    .any(|q| (q - p).norm_squared() < self.min_dist_sq);
                if too_close {
                    return false;
                }
            }
        }
        self.buckets[cy * self.cols + cx].push(p);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkercal_core::GrayImage;

    fn square_image() -> GrayImage {
        // A bright 20x20 square on a dark 60x60 background: four corners.
        let (w, h) = (60, 60);
        let mut data = vec![20u8; w * h];
        for y in 20..40 {
            for x in 20..40 {
                data[y * w + x] = 230;
            }
        }
        GrayImage::new(w, h, data).unwrap()
    }

    #[test]
    fn finds_square_corners() {
        let img = square_image();
        let corners = ShiTomasiDetector::new().detect(&img.view(), &FeatureParams::default());
        assert_eq!(4, corners.len());
        for target in [(19.5, 19.5), (39.5, 19.5), (19.5, 39.5), (39.5, 39.5)] {
            assert!(
                corners
                    .iter()
                    .any(|c| (c.x - target.0).abs() <= 2.0 && (c.y - target.1).abs() <= 2.0),
                "missing corner near {target:?}: {corners:?}"
            );
        }
    }

    #[test]
    fn max_features_caps_output() {
        let img = square_image();
        let params = FeatureParams {
            max_features: 2,
            ..FeatureParams::default()
        };
        assert_eq!(2, ShiTomasiDetector::new().detect(&img.view(), &params).len());
    }

    #[test]
    fn blank_image_has_no_features() {
        let img = GrayImage::new(32, 32, vec![128; 32 * 32]).unwrap();
        let corners = ShiTomasiDetector::new().detect(&img.view(), &FeatureParams::default());
        assert!(corners.is_empty());
    }
}
