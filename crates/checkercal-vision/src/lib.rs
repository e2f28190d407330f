//! Native implementations of the `checkercal-core` collaborator traits.
//!
//! - [`ShiTomasiDetector`]: feature counting for the automatic size search.
//! - [`ChessboardFinder`]: ChESS X-corners (from `chess-corners`) linked into
//!   a grid graph, matched against an exact inner-corner size.
//! - [`GradientRefiner`]: iterative sub-pixel corner refinement.
//! - [`PlanarCalibrator`]: closed-form initialization followed by
//!   Levenberg–Marquardt (`levenberg-marquardt`) over intrinsics, distortion and poses.
//! - [`PinholeProjector`]: pinhole projection with lens distortion.
//!
//! [`NativeBackend`] bundles all five.

mod backend;
mod calibrate;
mod camera;
mod corners;
mod features;
mod filters;
mod finder;
mod geom;
mod grid;
mod homography;
mod subpix;
pub mod synthetic;

pub use backend::NativeBackend;
pub use calibrate::{DistortionModel, PlanarCalibrator, SolverParams};
pub use camera::{distort, PinholeProjector, DISTORTION_LENGTHS};
pub use corners::{detect_xcorners, ChessCornerParams, XCorner};
pub use features::ShiTomasiDetector;
pub use filters::{flatten_illumination, normalize_contrast};
pub use finder::{ChessboardFinder, ChessboardFinderParams, ChessboardScene};
pub use grid::{GridGraph, GridGraphParams, GridLayout};
pub use homography::{estimate_homography, Homography};
pub use subpix::GradientRefiner;
