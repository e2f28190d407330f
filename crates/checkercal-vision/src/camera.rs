//! Pinhole camera with Brown–Conrady / rational lens distortion.
//!
//! Distortion coefficients follow the usual solver order
//! `k1 k2 p1 p2 [k3 [k4 k5 k6]]`.

use checkercal_core::{BackendError, Projector};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

/// Accepted distortion vector lengths.
pub const DISTORTION_LENGTHS: [usize; 4] = [0, 4, 5, 8];

/// Apply lens distortion to a normalized image point.
pub fn distort(x: f64, y: f64, dist: &[f64]) -> (f64, f64) {
    let k = |i: usize| dist.get(i).copied().unwrap_or(0.0);
    let (k1, k2, p1, p2, k3) = (k(0), k(1), k(2), k(3), k(4));
    let (k4, k5, k6) = (k(5), k(6), k(7));

    let r2 = x * x + y * y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;
    let radial = (1.0 + k1 * r2 + k2 * r4 + k3 * r6) / (1.0 + k4 * r2 + k5 * r4 + k6 * r6);
    let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
    (xd, yd)
}

/// Project one camera-frame point; `None` when it is not in front of the
/// camera or the result is not finite.
#[inline]
pub fn project_camera_point(
    pc: &Vector3<f64>,
    camera_matrix: &Matrix3<f64>,
    dist: &[f64],
) -> Option<Point2<f64>> {
    if pc.z <= f64::EPSILON {
        return None;
    }
    let (xd, yd) = distort(pc.x / pc.z, pc.y / pc.z, dist);
    let k = camera_matrix;
    let u = k[(0, 0)] * xd + k[(0, 1)] * yd + k[(0, 2)];
    let v = k[(1, 1)] * yd + k[(1, 2)];
    (u.is_finite() && v.is_finite()).then(|| Point2::new(u, v))
}

#[inline]
pub fn rotation_from_rvec(rvec: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::from_scaled_axis(*rvec)
}

/// Native projector backing the reprojection evaluator.
#[derive(Clone, Copy, Debug, Default)]
pub struct PinholeProjector;

impl Projector for PinholeProjector {
    fn project(
        &self,
        points: &[Point3<f64>],
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
        camera_matrix: &Matrix3<f64>,
        dist_coeffs: &[f64],
    ) -> Result<Vec<Point2<f64>>, BackendError> {
        if !DISTORTION_LENGTHS.contains(&dist_coeffs.len()) {
            return Err(BackendError::new(format!(
                "unsupported distortion vector length {} (expected 0, 4, 5 or 8)",
                dist_coeffs.len()
            )));
        }
        let rot = rotation_from_rvec(rvec);
        points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let pc = rot * p.coords + tvec;
                project_camera_point(&pc, camera_matrix, dist_coeffs).ok_or_else(|| {
                    BackendError::new(format!(
                        "point {i} cannot be projected (camera-frame z = {:.3e})",
                        pc.z
                    ))
                })
            })
            .collect()
    }
}
