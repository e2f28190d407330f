use serde::{Deserialize, Serialize};

/// Tuning for the feature counter used by the automatic size search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    /// Upper bound on returned features; `0` means unbounded.
    pub max_features: usize,
    /// Fraction of the strongest response a feature must reach.
    pub quality_level: f32,
    /// Minimum pixel distance between two accepted features.
    pub min_distance: f32,
    /// Side of the square window used to accumulate gradients.
    pub block_size: usize,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_features: 0,
            quality_level: 0.01,
            min_distance: 10.0,
            block_size: 3,
        }
    }
}

/// Bounds of the automatic candidate enumeration.
///
/// A candidate `(rows, cols)` qualifies when both dimensions lie in
/// `min_dim..=max_dim` and `rows * cols <= detected + area_slack`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateParams {
    pub min_dim: u32,
    pub max_dim: u32,
    pub area_slack: u32,
    pub features: FeatureParams,
}

impl Default for CandidateParams {
    fn default() -> Self {
        Self {
            min_dim: 3,
            max_dim: 20,
            area_slack: 20,
            features: FeatureParams::default(),
        }
    }
}

/// Flags handed to the pattern finder on every attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderFlags {
    /// Flatten uneven illumination before looking for corners.
    pub adaptive_threshold: bool,
    /// Stretch image contrast to the full 8-bit range.
    pub normalize_image: bool,
    /// Reject quickly when the image cannot hold the requested grid.
    pub fast_check: bool,
}

impl Default for FinderFlags {
    fn default() -> Self {
        Self {
            adaptive_threshold: true,
            normalize_image: true,
            fast_check: true,
        }
    }
}

/// Sub-pixel corner refinement settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Half side of the search window; `5` gives an 11×11 window.
    pub half_window: usize,
    pub max_iterations: usize,
    /// Stop once a corner moves less than this many pixels in one step.
    pub epsilon: f32,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 30,
            epsilon: 0.1,
        }
    }
}
