//! Ordered candidate grid sizes for the pattern search.

use checkercal_core::{
    CandidateParams, FeatureCounter, GrayImageView, PatternSize, SearchMode,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Sizes to try, in order, plus how they were produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidates {
    pub mode: SearchMode,
    pub sizes: Vec<PatternSize>,
    /// Feature count the automatic bound was derived from.
    pub detected_features: Option<usize>,
}

/// Interpret caller-supplied rows/cols. Only a hint with both dimensions
/// positive counts; anything else selects the automatic search.
pub fn size_hint(rows: i64, cols: i64) -> Option<PatternSize> {
    if rows <= 0 || cols <= 0 {
        return None;
    }
    let rows = u32::try_from(rows).ok()?;
    let cols = u32::try_from(cols).ok()?;
    Some(PatternSize::new(rows, cols))
}

/// Hint as given, hint transposed and, when both axes exceed one, both
/// variants shrunk by one corner (callers often count squares).
pub fn hinted_candidates(hint: PatternSize) -> Vec<PatternSize> {
    let mut sizes = vec![hint, hint.transposed()];
    if let Some(shrunk) = hint.shrunk() {
        sizes.push(shrunk);
        sizes.push(shrunk.transposed());
    }
    dedup_in_order(sizes)
}

/// Every `(rows, cols)` inside the configured bounds whose area fits
/// `detected + area_slack`, largest area first.
///
/// Equal areas keep enumeration order, so ties sort by `rows` then `cols`
/// ascending.
pub fn auto_candidates(detected: usize, params: &CandidateParams) -> Vec<PatternSize> {
    let bound = detected as u64 + u64::from(params.area_slack);
    let mut sizes = Vec::new();
    for rows in params.min_dim.max(1)..=params.max_dim {
        for cols in params.min_dim.max(1)..=params.max_dim {
            if u64::from(rows) * u64::from(cols) <= bound {
                sizes.push(PatternSize::new(rows, cols));
            }
        }
    }
    sizes.sort_by(|a, b| b.area().cmp(&a.area()));
    dedup_in_order(sizes)
}

/// Produce the candidate list for one image.
///
/// The feature counter is only consulted in automatic mode.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(hint = ?hint))
)]
pub fn generate_candidates<C>(
    image: &GrayImageView<'_>,
    hint: Option<PatternSize>,
    counter: &C,
    params: &CandidateParams,
) -> Candidates
where
    C: FeatureCounter + ?Sized,
{
    match hint {
        Some(hint) => Candidates {
            mode: SearchMode::Hinted,
            sizes: hinted_candidates(hint),
            detected_features: None,
        },
        None => {
            let detected = counter.detect_features(image, &params.features).len();
            log::debug!("feature counter found {detected} corner-like features");
            Candidates {
                mode: SearchMode::Auto,
                sizes: auto_candidates(detected, params),
                detected_features: Some(detected),
            }
        }
    }
}

fn dedup_in_order(sizes: Vec<PatternSize>) -> Vec<PatternSize> {
    let mut out: Vec<PatternSize> = Vec::with_capacity(sizes.len());
    for size in sizes {
        if !out.contains(&size) {
            out.push(size);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkercal_core::{FeatureParams, GrayImage};
    use nalgebra::Point2;

    struct FixedCount(usize);

    impl FeatureCounter for FixedCount {
        fn detect_features(
            &self,
            _image: &GrayImageView<'_>,
            _params: &FeatureParams,
        ) -> Vec<Point2<f32>> {
            vec![Point2::new(0.0, 0.0); self.0]
        }
    }

    fn p(rows: u32, cols: u32) -> PatternSize {
        PatternSize::new(rows, cols)
    }

    #[test]
    fn hint_yields_four_candidates_in_order() {
        assert_eq!(
            vec![p(6, 9), p(9, 6), p(5, 8), p(8, 5)],
            hinted_candidates(p(6, 9))
        );
    }

    #[test]
    fn unit_axis_hint_yields_two() {
        assert_eq!(vec![p(1, 7), p(7, 1)], hinted_candidates(p(1, 7)));
    }

    #[test]
    fn square_hint_is_deduplicated() {
        assert_eq!(vec![p(7, 7), p(6, 6)], hinted_candidates(p(7, 7)));
        assert_eq!(vec![p(1, 1)], hinted_candidates(p(1, 1)));
    }

    #[test]
    fn partial_hint_means_auto() {
        assert_eq!(None, size_hint(0, 9));
        assert_eq!(None, size_hint(6, -1));
        assert_eq!(Some(p(6, 9)), size_hint(6, 9));
    }

    #[test]
    fn auto_bound_and_order() {
        let sizes = auto_candidates(40, &CandidateParams::default());
        assert!(!sizes.contains(&p(9, 9)));
        assert!(sizes.iter().all(|s| s.area() <= 60));
        assert!(sizes.iter().all(|s| (3..=20).contains(&s.rows)));
        assert!(sizes.iter().all(|s| (3..=20).contains(&s.cols)));
        assert_eq!(p(3, 20), sizes[0]);
        assert_eq!(p(4, 15), sizes[1]);
        for pair in sizes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                a.area() > b.area() || (a.area() == b.area() && (a.rows, a.cols) < (b.rows, b.cols))
            );
        }
    }

    #[test]
    fn auto_with_no_features_still_tries_small_boards() {
        let sizes = auto_candidates(0, &CandidateParams::default());
        assert_eq!(p(4, 5), sizes[0]);
        assert_eq!(p(3, 3), *sizes.last().unwrap());
        assert_eq!(10, sizes.len());
    }

    #[test]
    fn generate_consults_counter_only_in_auto_mode() {
        let img = GrayImage::new(4, 4, vec![0; 16]).unwrap();
        let params = CandidateParams::default();

        let auto = generate_candidates(&img.view(), None, &FixedCount(40), &params);
        assert_eq!(SearchMode::Auto, auto.mode);
        assert_eq!(Some(40), auto.detected_features);
        assert_eq!(p(3, 20), auto.sizes[0]);

        let hinted = generate_candidates(&img.view(), Some(p(6, 9)), &FixedCount(40), &params);
        assert_eq!(SearchMode::Hinted, hinted.mode);
        assert_eq!(None, hinted.detected_features);
        assert_eq!(4, hinted.sizes.len());
    }
}
