use crate::calibrate::{PlanarCalibrator, SolverParams};
use crate::camera::PinholeProjector;
use crate::features::ShiTomasiDetector;
use crate::finder::{ChessboardFinder, ChessboardFinderParams, ChessboardScene};
use crate::subpix::GradientRefiner;
use checkercal_core::{
    BackendError, CalibrationSolver, CornerRefiner, FeatureCounter, FeatureParams, FinderFlags,
    GrayImageView, ImagePointSet, ImageSize, ObjectPointSet, PatternFinder, PatternSize,
    Projector, RefineParams, SolverOutput,
};
use nalgebra::{Matrix3, Point2, Point3, Vector3};

/// All five collaborators implemented natively.
#[derive(Clone, Debug, Default)]
pub struct NativeBackend {
    pub features: ShiTomasiDetector,
    pub finder: ChessboardFinder,
    pub refiner: GradientRefiner,
    pub solver: PlanarCalibrator,
    pub projector: PinholeProjector,
}

impl NativeBackend {
    pub fn new(finder: ChessboardFinderParams, solver: SolverParams) -> Self {
        Self {
            finder: ChessboardFinder::new(finder),
            solver: PlanarCalibrator::new(solver),
            ..Self::default()
        }
    }
}

impl FeatureCounter for NativeBackend {
    fn detect_features(
        &self,
        image: &GrayImageView<'_>,
        params: &FeatureParams,
    ) -> Vec<Point2<f32>> {
        self.features.detect_features(image, params)
    }
}

impl PatternFinder for NativeBackend {
    type Scene = ChessboardScene;

    fn prepare(&self, image: &GrayImageView<'_>, flags: &FinderFlags) -> ChessboardScene {
        self.finder.prepare(image, flags)
    }

    fn find_in_scene(
        &self,
        scene: &ChessboardScene,
        size: PatternSize,
        flags: &FinderFlags,
    ) -> Option<Vec<Point2<f32>>> {
        self.finder.find_in_scene(scene, size, flags)
    }
}

impl CornerRefiner for NativeBackend {
    fn refine_corners(
        &self,
        image: &GrayImageView<'_>,
        corners: &[Point2<f32>],
        params: &RefineParams,
    ) -> Vec<Point2<f32>> {
        self.refiner.refine_corners(image, corners, params)
    }
}

impl CalibrationSolver for NativeBackend {
    fn calibrate(
        &self,
        object_points: &[ObjectPointSet],
        image_points: &[ImagePointSet],
        image_size: ImageSize,
    ) -> Result<SolverOutput, BackendError> {
        self.solver.calibrate(object_points, image_points, image_size)
    }
}

impl Projector for NativeBackend {
    fn project(
        &self,
        points: &[Point3<f64>],
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
        camera_matrix: &Matrix3<f64>,
        dist_coeffs: &[f64],
    ) -> Result<Vec<Point2<f64>>, BackendError> {
        self.projector
            .project(points, rvec, tvec, camera_matrix, dist_coeffs)
    }
}
