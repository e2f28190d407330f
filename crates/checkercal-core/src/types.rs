use crate::CalibError;
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detected 2D corners of one view, in raster order of the detected grid.
pub type ImagePointSet = Vec<Point2<f64>>;

/// 3D board-frame points of one view (typically planar, `z = 0`).
pub type ObjectPointSet = Vec<Point3<f64>>;

/// Inner-corner grid dimensions of a chessboard.
///
/// `rows` counts corner rows (the image's vertical direction), `cols` counts
/// corners per row. A board of 8×6 *squares* has 7×5 inner corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternSize {
    pub rows: u32,
    pub cols: u32,
}

impl PatternSize {
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Number of inner corners in the grid. Widened so that any pair of
    /// `u32` dimensions fits.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.cols)
    }

    /// Same grid with the axes swapped.
    #[inline]
    pub fn transposed(&self) -> Self {
        Self::new(self.cols, self.rows)
    }

    /// Grid with one fewer corner on both axes, for hints that counted
    /// squares instead of inner corners. `None` when an axis would hit zero.
    pub fn shrunk(&self) -> Option<Self> {
        if self.rows > 1 && self.cols > 1 {
            Some(Self::new(self.rows - 1, self.cols - 1))
        } else {
            None
        }
    }
}

impl fmt::Display for PatternSize {
    /// Width-first, matching the `cols x rows` convention of the corner finder.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Pixel dimensions of the sensor, constant across all views of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Board point as supplied by callers; `z` may be omitted for planar boards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl BoardPoint {
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Resolve to a 3D point, defaulting a missing `z` to `0.0`.
    #[inline]
    pub fn to_point3(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z.unwrap_or(0.0))
    }
}

/// Output of a successful pattern search.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternDetection {
    /// Grid size the corner finder accepted.
    pub size: PatternSize,
    /// Sub-pixel refined corners, `size.cols` per row.
    pub corners: Vec<Point2<f32>>,
    pub image_size: ImageSize,
    /// Candidates attempted up to and including the accepted one.
    pub candidates_tried: Vec<PatternSize>,
}

/// Reconciled calibration input: one object point set per image point set.
///
/// Construction enforces `object_points[i].len() == image_points[i].len()`
/// for every view.
#[derive(Clone, Debug)]
pub struct CalibrationSession {
    image_points: Vec<ImagePointSet>,
    object_points: Vec<ObjectPointSet>,
    image_size: ImageSize,
}

impl CalibrationSession {
    pub fn new(
        image_points: Vec<ImagePointSet>,
        object_points: Vec<ObjectPointSet>,
        image_size: ImageSize,
    ) -> Result<Self, CalibError> {
        if image_points.len() != object_points.len() {
            return Err(CalibError::InvalidInput(format!(
                "{} image point sets but {} object point sets",
                image_points.len(),
                object_points.len()
            )));
        }
        for (view, (img, obj)) in image_points.iter().zip(&object_points).enumerate() {
            if img.len() != obj.len() {
                return Err(CalibError::PointCountMismatch {
                    view,
                    object: obj.len(),
                    image: img.len(),
                });
            }
        }
        Ok(Self {
            image_points,
            object_points,
            image_size,
        })
    }

    #[inline]
    pub fn view_count(&self) -> usize {
        self.image_points.len()
    }

    #[inline]
    pub fn image_points(&self) -> &[ImagePointSet] {
        &self.image_points
    }

    #[inline]
    pub fn object_points(&self) -> &[ObjectPointSet] {
        &self.object_points
    }

    #[inline]
    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }
}

/// Full calibration output for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationResult {
    pub camera_matrix: Matrix3<f64>,
    /// Distortion coefficients in solver order (`k1 k2 p1 p2 k3 ...`).
    pub dist_coeffs: Vec<f64>,
    /// Rodrigues rotation vector per view.
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
    /// RMS reprojection error as reported by the solver.
    pub rms: f64,
    /// `sqrt(err² / count)` per view, recomputed by re-projection.
    pub per_view_errors: Vec<f64>,
    pub view_point_counts: Vec<usize>,
}

impl CalibrationResult {
    /// Pool the per-view errors into one RMS weighted by point count.
    ///
    /// This equals [`CalibrationResult::rms`] up to floating-point noise when
    /// the solver and the projector share one camera model.
    pub fn pooled_view_rms(&self) -> Option<f64> {
        let total: usize = self.view_point_counts.iter().sum();
        if total == 0 || self.view_point_counts.len() != self.per_view_errors.len() {
            return None;
        }
        let sum_sq: f64 = self
            .per_view_errors
            .iter()
            .zip(&self.view_point_counts)
            .map(|(e, &n)| e * e * n as f64)
            .sum();
        Some((sum_sq / total as f64).sqrt())
    }
}
