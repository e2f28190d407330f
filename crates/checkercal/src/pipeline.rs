//! The single detection and calibration pipeline both front ends call.

use crate::calibrate::calibrate;
use crate::candidates::generate_candidates;
use crate::reconcile::{reconcile, ObjectPointsInput};
use crate::search::search_pattern;
use checkercal_core::{
    CalibError, CalibrationResult, CalibrationSession, CalibrationSolver, CandidateParams,
    CornerRefiner, FeatureCounter, FinderFlags, GrayImageView, ImagePointSet, ImageSize,
    PatternDetection, PatternFinder, PatternSize, Projector, RefineParams,
};
use checkercal_vision::{ChessboardFinderParams, NativeBackend, SolverParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Every tunable of the pipeline. Missing JSON fields keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub candidates: CandidateParams,
    pub finder: FinderFlags,
    pub refine: RefineParams,
    pub solver: SolverParams,
    /// Tuning of the native chessboard finder.
    pub chessboard: ChessboardFinderParams,
}

#[derive(thiserror::Error, Debug)]
pub enum ParamsIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineParams {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ParamsIoError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Everything the pipeline needs from the vision side.
pub trait VisionBackend:
    FeatureCounter + PatternFinder + CornerRefiner + CalibrationSolver + Projector
{
}

impl<T: ?Sized> VisionBackend for T where
    T: FeatureCounter + PatternFinder + CornerRefiner + CalibrationSolver + Projector
{
}

/// Candidate generation followed by the pattern search.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(image, backend, params),
        fields(width = image.width, height = image.height)
    )
)]
pub fn detect_pattern<B>(
    image: &GrayImageView<'_>,
    hint: Option<PatternSize>,
    backend: &B,
    params: &PipelineParams,
) -> Result<PatternDetection, CalibError>
where
    B: FeatureCounter + PatternFinder + CornerRefiner + ?Sized,
{
    let candidates = generate_candidates(image, hint, backend, &params.candidates);
    log::debug!(
        "{} search over {} candidate size(s)",
        candidates.mode,
        candidates.sizes.len()
    );
    search_pattern(
        image,
        &candidates,
        backend,
        backend,
        &params.finder,
        &params.refine,
    )
}

/// Reconcile the inputs and calibrate.
pub fn calibrate_points<B>(
    image_points: Vec<ImagePointSet>,
    object_points: ObjectPointsInput,
    image_size: ImageSize,
    backend: &B,
) -> Result<CalibrationResult, CalibError>
where
    B: CalibrationSolver + Projector + ?Sized,
{
    let session = reconcile(image_points, object_points, image_size)?;
    calibrate_session(&session, backend)
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(views = session.view_count()))
)]
pub fn calibrate_session<B>(
    session: &CalibrationSession,
    backend: &B,
) -> Result<CalibrationResult, CalibError>
where
    B: CalibrationSolver + Projector + ?Sized,
{
    calibrate(session, backend)
}

/// A backend paired with its tuning.
#[derive(Clone, Debug)]
pub struct Pipeline<B> {
    pub backend: B,
    pub params: PipelineParams,
}

impl Pipeline<NativeBackend> {
    /// Native backend configured from `params`.
    pub fn native(params: PipelineParams) -> Self {
        let backend = NativeBackend::new(params.chessboard.clone(), params.solver.clone());
        Self { backend, params }
    }
}

impl Default for Pipeline<NativeBackend> {
    fn default() -> Self {
        Self::native(PipelineParams::default())
    }
}

impl<B: VisionBackend> Pipeline<B> {
    pub fn new(backend: B, params: PipelineParams) -> Self {
        Self { backend, params }
    }

    pub fn detect(
        &self,
        image: &GrayImageView<'_>,
        hint: Option<PatternSize>,
    ) -> Result<PatternDetection, CalibError> {
        detect_pattern(image, hint, &self.backend, &self.params)
    }

    pub fn calibrate(
        &self,
        image_points: Vec<ImagePointSet>,
        object_points: ObjectPointsInput,
        image_size: ImageSize,
    ) -> Result<CalibrationResult, CalibError> {
        calibrate_points(image_points, object_points, image_size, &self.backend)
    }
}
