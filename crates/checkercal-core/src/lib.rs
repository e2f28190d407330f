//! Core types and collaborator traits for chessboard camera calibration.
//!
//! This crate is intentionally small. It defines the data model shared by the
//! detection and calibration pipeline, the error taxonomy every operation
//! returns, the tuning parameters passed explicitly into the pipeline, and the
//! traits behind which the geometric-vision collaborators live (feature
//! counting, pattern finding, sub-pixel refinement, calibration, projection).
//!
//! It does *not* depend on any concrete detector or solver; see
//! `checkercal-vision` for the native implementations.

mod backend;
mod error;
mod image;
mod logger;
mod params;
mod types;

pub use backend::{
    BackendError, CalibrationSolver, CornerRefiner, FeatureCounter, PatternFinder, Projector,
    SolverOutput,
};
pub use error::{CalibError, ErrorKind, SearchMode};
pub use image::{sample_bilinear, sample_bilinear_clamped, GrayImage, GrayImageView};
pub use params::{CandidateParams, FeatureParams, FinderFlags, RefineParams};
pub use types::{
    BoardPoint, CalibrationResult, CalibrationSession, ImagePointSet, ImageSize, ObjectPointSet,
    PatternDetection, PatternSize,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
