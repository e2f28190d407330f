//! Gradient-orthogonality sub-pixel corner refinement.
//!
//! At the true saddle point `q`, every image gradient `g(p)` in a small
//! window is orthogonal to `p - q`. Minimizing `Σ w(p) (g(p)·(p - q))²`
//! gives a 2×2 linear system, iterated until the update is below `epsilon`.

use checkercal_core::{sample_bilinear_clamped, CornerRefiner, GrayImageView, RefineParams};
use nalgebra::{Matrix2, Point2, Vector2};

#[derive(Clone, Copy, Debug, Default)]
pub struct GradientRefiner;

impl GradientRefiner {
    pub fn new() -> Self {
        Self
    }

    pub fn refine_one(
        &self,
        image: &GrayImageView<'_>,
        start: Point2<f32>,
        params: &RefineParams,
    ) -> Point2<f32> {
        let half = params.half_window.max(1) as i32;
        let mask = gaussian_mask(half);
        let side = (2 * half + 1) as usize;
        let eps_sq = params.epsilon * params.epsilon;
        let (w, h) = (image.width as f32, image.height as f32);

        let mut q = start;
        for _ in 0..params.max_iterations.max(1) {
            let mut a = Matrix2::<f32>::zeros();
            let mut b = Vector2::<f32>::zeros();
            for dy in -half..=half {
                for dx in -half..=half {
                    let (x, y) = (q.x + dx as f32, q.y + dy as f32);
                    let gx = sample_bilinear_clamped(image, x + 1.0, y)
                        - sample_bilinear_clamped(image, x - 1.0, y);
                    let gy = sample_bilinear_clamped(image, x, y + 1.0)
                        - sample_bilinear_clamped(image, x, y - 1.0);
                    let m = mask[(dy + half) as usize * side + (dx + half) as usize];
                    let (gxx, gxy, gyy) = (gx * gx * m, gx * gy * m, gy * gy * m);
                    a[(0, 0)] += gxx;
                    a[(0, 1)] += gxy;
                    a[(1, 1)] += gyy;
                    b[0] += gxx * dx as f32 + gxy * dy as f32;
                    b[1] += gxy * dx as f32 + gyy * dy as f32;
                }
            }
            a[(1, 0)] = a[(0, 1)];

            if a.determinant().abs() <= f32::EPSILON * f32::EPSILON {
                break;
            }
            let Some(step) = a.try_inverse().map(|inv| inv * b) else {
                break;
            };
            let next = Point2::new(q.x + step.x, q.y + step.y);
            let moved_sq = step.norm_squared();
            q = next;
            if q.x < 0.0 || q.y < 0.0 || q.x >= w || q.y >= h || moved_sq <= eps_sq {
                break;
            }
        }

        // Drifting further than the window means the window never saw the
        // saddle; keep the original estimate.
        let drift = q - start;
        if !q.x.is_finite()
            || !q.y.is_finite()
            || drift.x.abs() > half as f32
            || drift.y.abs() > half as f32
        {
            return start;
        }
        q
    }
}

impl CornerRefiner for GradientRefiner {
    fn refine_corners(
        &self,
        image: &GrayImageView<'_>,
        corners: &[Point2<f32>],
        params: &RefineParams,
    ) -> Vec<Point2<f32>> {
        corners
            .iter()
            .map(|&c| self.refine_one(image, c, params))
            .collect()
    }
}

/// Separable weights `exp(-d²/half²)` over the `(2·half+1)²` window.
fn gaussian_mask(half: i32) -> Vec<f32> {
    let coeff = 1.0 / (half * half) as f32;
    let line: Vec<f32> = (-half..=half)
        .map(|d| (-(d * d) as f32 * coeff).exp())
        .collect();
    let mut out = Vec::with_capacity(line.len() * line.len());
    for wy in &line {
        for wx in &line {
            out.push(wy * wx);
        }
    }
    out
}
