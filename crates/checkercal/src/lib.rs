//! Chessboard pattern-size search and camera calibration.
//!
//! The pipeline has two halves:
//!
//! - detection: [`candidates`] orders grid sizes to try (from a rows/cols hint
//!   or a feature-count estimate) and [`search`] runs them against a
//!   [`PatternFinder`] until one matches, then refines the corners;
//! - calibration: [`reconcile`] pairs object points with image points,
//!   [`calibrate`] runs the solver once and re-projects each view.
//!
//! [`pipeline`] composes both halves over any [`pipeline::VisionBackend`];
//! the CLI and the C ABI crate call nothing else. The default backend is
//! [`checkercal_vision::NativeBackend`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use checkercal::{detect, pipeline::Pipeline, report};
//!
//! let pipeline = Pipeline::default();
//! let outcome = detect::detect_image_file("board.png", None, &pipeline);
//! println!("{}", report::outcome_json::<_, report::DetectionReport>(&outcome, true));
//! ```
//!
//! ## Features
//!
//! - `image` (default): decode image files via the `image` crate.
//! - `cli` (default): the `checkercal` binary.
//! - `tracing`: spans on the pipeline entry points.

pub use checkercal_core as core;
pub use checkercal_vision as vision;

pub use checkercal_core::{
    CalibError, CalibrationResult, CalibrationSession, CornerRefiner, ErrorKind, FeatureCounter,
    GrayImage, GrayImageView, PatternDetection, PatternFinder, PatternSize, SearchMode,
};

pub mod calibrate;
pub mod candidates;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod search;
pub mod session_io;

#[cfg(feature = "image")]
pub mod detect;

pub use pipeline::{Pipeline, PipelineParams, VisionBackend};
pub use reconcile::{ObjectLayout, ObjectPointEntry, ObjectPointsInput};
