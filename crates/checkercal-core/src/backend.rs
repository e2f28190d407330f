//! Collaborator seams of the pipeline.
//!
//! The search and calibration orchestration only talks to these traits, so
//! alternative detectors and solvers can be plugged in without touching the
//! orchestration code.

use crate::{
    FeatureParams, FinderFlags, GrayImageView, ImagePointSet, ImageSize, ObjectPointSet,
    PatternSize, RefineParams,
};
use nalgebra::{Matrix3, Point2, Point3, Vector3};

/// Failure reported by a collaborator, carried verbatim into the
/// corresponding [`crate::CalibError`] variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Counts strong corner-like features; used to bound the automatic search.
pub trait FeatureCounter {
    fn detect_features(
        &self,
        image: &GrayImageView<'_>,
        params: &FeatureParams,
    ) -> Vec<Point2<f32>>;
}

/// Locates a chessboard of exactly `size` inner corners.
///
/// A search tries many sizes on one image, so the size-independent work
/// lives in [`PatternFinder::prepare`]. The returned scene is owned by the
/// caller and dropped with the search; finders keep no state between calls.
pub trait PatternFinder {
    type Scene;

    fn prepare(&self, image: &GrayImageView<'_>, flags: &FinderFlags) -> Self::Scene;

    /// Returns `size.area()` corners in row-major order (`size.cols` per
    /// row), or `None` when the grid is not present.
    fn find_in_scene(
        &self,
        scene: &Self::Scene,
        size: PatternSize,
        flags: &FinderFlags,
    ) -> Option<Vec<Point2<f32>>>;

    /// One-shot [`prepare`](PatternFinder::prepare) plus
    /// [`find_in_scene`](PatternFinder::find_in_scene).
    fn find_corners(
        &self,
        image: &GrayImageView<'_>,
        size: PatternSize,
        flags: &FinderFlags,
    ) -> Option<Vec<Point2<f32>>> {
        let scene = self.prepare(image, flags);
        self.find_in_scene(&scene, size, flags)
    }
}

/// Refines approximate corner positions to sub-pixel accuracy.
pub trait CornerRefiner {
    /// Output has the same length and order as `corners`.
    fn refine_corners(
        &self,
        image: &GrayImageView<'_>,
        corners: &[Point2<f32>],
        params: &RefineParams,
    ) -> Vec<Point2<f32>>;
}

/// Raw solver output before per-view error evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutput {
    pub camera_matrix: Matrix3<f64>,
    pub dist_coeffs: Vec<f64>,
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
    /// Root mean square reprojection error over all points of all views.
    pub rms: f64,
}

/// Estimates intrinsics, distortion and per-view extrinsics.
pub trait CalibrationSolver {
    fn calibrate(
        &self,
        object_points: &[ObjectPointSet],
        image_points: &[ImagePointSet],
        image_size: ImageSize,
    ) -> Result<SolverOutput, BackendError>;
}

/// Projects board points through a pinhole camera with lens distortion.
pub trait Projector {
    fn project(
        &self,
        points: &[Point3<f64>],
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
        camera_matrix: &Matrix3<f64>,
        dist_coeffs: &[f64],
    ) -> Result<Vec<Point2<f64>>, BackendError>;
}
