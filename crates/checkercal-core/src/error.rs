use crate::PatternSize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the candidate sizes of a pattern search were produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Sizes derived from a caller-supplied rows/cols hint.
    Hinted,
    /// Sizes derived from a feature-count estimate.
    Auto,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Hinted => f.write_str("hinted"),
            SearchMode::Auto => f.write_str("auto"),
        }
    }
}

/// Errors produced by the detection and calibration pipeline.
///
/// None of these are retried; each one ends the invocation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("image unreadable: {0}")]
    ImageUnreadable(String),

    #[error("chessboard pattern not found ({mode} search, tried {})", format_sizes(.tried))]
    PatternNotFound {
        mode: SearchMode,
        tried: Vec<PatternSize>,
    },

    #[error("view {view}: {object} object points vs {image} image points")]
    PointCountMismatch {
        view: usize,
        object: usize,
        image: usize,
    },

    #[error("calibration solver error: {0}")]
    CalibrationSolver(String),

    #[error("reprojection error in view {view}: {message}")]
    Reprojection { view: usize, message: String },
}

/// Stable, serializable discriminant of [`CalibError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    ImageUnreadable,
    PatternNotFound,
    PointCountMismatch,
    CalibrationSolverError,
    ReprojectionError,
}

impl ErrorKind {
    /// Errors caused by how the tool was invoked rather than by the data.
    pub fn is_invocation_error(self) -> bool {
        matches!(self, ErrorKind::InvalidInput | ErrorKind::ImageUnreadable)
    }
}

impl CalibError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalibError::InvalidInput(_) => ErrorKind::InvalidInput,
            CalibError::ImageUnreadable(_) => ErrorKind::ImageUnreadable,
            CalibError::PatternNotFound { .. } => ErrorKind::PatternNotFound,
            CalibError::PointCountMismatch { .. } => ErrorKind::PointCountMismatch,
            CalibError::CalibrationSolver(_) => ErrorKind::CalibrationSolverError,
            CalibError::Reprojection { .. } => ErrorKind::ReprojectionError,
        }
    }
}

const MAX_LISTED_SIZES: usize = 8;

fn format_sizes(sizes: &[PatternSize]) -> String {
    if sizes.is_empty() {
        return "no candidate sizes".to_string();
    }
    let listed: Vec<String> = sizes
        .iter()
        .take(MAX_LISTED_SIZES)
        .map(PatternSize::to_string)
        .collect();
    let mut out = listed.join(", ");
    if sizes.len() > MAX_LISTED_SIZES {
        out.push_str(&format!(" and {} more", sizes.len() - MAX_LISTED_SIZES));
    }
    out
}
