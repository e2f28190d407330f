//! First-match search over candidate pattern sizes.

use crate::candidates::Candidates;
use checkercal_core::{
    CalibError, CornerRefiner, FinderFlags, GrayImageView, ImageSize, PatternDetection,
    PatternFinder, RefineParams,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Try each candidate in order and refine the first grid the finder accepts.
///
/// Fails with [`CalibError::PatternNotFound`] when no candidate matches,
/// including when the candidate list is empty.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip_all,
        fields(mode = %candidates.mode, candidates = candidates.sizes.len())
    )
)]
pub fn search_pattern<F, R>(
    image: &GrayImageView<'_>,
    candidates: &Candidates,
    finder: &F,
    refiner: &R,
    flags: &FinderFlags,
    refine: &RefineParams,
) -> Result<PatternDetection, CalibError>
where
    F: PatternFinder + ?Sized,
    R: CornerRefiner + ?Sized,
{
    // Built once per search and dropped with it.
    let scene = (!candidates.sizes.is_empty()).then(|| finder.prepare(image, flags));
    for (idx, &size) in candidates.sizes.iter().enumerate() {
        log::debug!("trying {size} ({}/{})", idx + 1, candidates.sizes.len());
        let Some(corners) = scene
            .as_ref()
            .and_then(|scene| finder.find_in_scene(scene, size, flags))
        else {
            continue;
        };
        if u64::try_from(corners.len()).ok() != Some(size.area()) {
            log::warn!(
                "finder returned {} corners for {size}, expected {}",
                corners.len(),
                size.area()
            );
            continue;
        }

        let refined = refiner.refine_corners(image, &corners, refine);
        log::info!("found {size} chessboard after {} candidate(s)", idx + 1);
        return Ok(PatternDetection {
            size,
            corners: refined,
            image_size: ImageSize::new(image.width as u32, image.height as u32),
            candidates_tried: candidates.sizes[..=idx].to_vec(),
        });
    }

    log::info!(
        "no chessboard found ({} search, {} candidates)",
        candidates.mode,
        candidates.sizes.len()
    );
    Err(CalibError::PatternNotFound {
        mode: candidates.mode,
        tried: candidates.sizes.clone(),
    })
}
