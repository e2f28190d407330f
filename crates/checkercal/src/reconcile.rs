//! Normalization of caller-supplied board points into one set per view.

use checkercal_core::{
    BoardPoint, CalibError, CalibrationSession, ImagePointSet, ImageSize, ObjectPointSet,
};
use serde::{Deserialize, Serialize};

/// One element of a legacy object-point array: either a whole view or a
/// single point of a shared list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectPointEntry {
    View(Vec<BoardPoint>),
    Point(BoardPoint),
}

/// Object points as supplied by a front end.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectPointsInput {
    /// One list reused for every view.
    Shared(Vec<BoardPoint>),
    /// One list per view, positionally matched to the image point sets.
    PerView(Vec<Vec<BoardPoint>>),
    /// Layout inferred from the outer length: equal to the view count means
    /// per-view, anything else means shared.
    ///
    /// A shared list that happens to hold exactly one point per view is
    /// misread as per-view; such input is rejected as ambiguous.
    Legacy(Vec<ObjectPointEntry>),
}

/// Explicit layout selector used by the JSON request and the C ABI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectLayout {
    #[default]
    Auto,
    Shared,
    PerView,
}

fn to_set(points: &[BoardPoint]) -> ObjectPointSet {
    points.iter().map(BoardPoint::to_point3).collect()
}

fn resolve_legacy(
    entries: Vec<ObjectPointEntry>,
    views: usize,
) -> Result<Vec<ObjectPointSet>, CalibError> {
    if entries.len() == views {
        return entries
            .into_iter()
            .enumerate()
            .map(|(view, entry)| match entry {
                ObjectPointEntry::View(points) => Ok(to_set(&points)),
                ObjectPointEntry::Point(_) => Err(CalibError::InvalidInput(format!(
                    "object points hold {views} entries, one per view, but entry {view} is a \
                     single point; a shared list with exactly one point per view is ambiguous, \
                     pass the layout explicitly"
                ))),
            })
            .collect();
    }

    let mut shared = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        match entry {
            ObjectPointEntry::Point(p) => shared.push(p.to_point3()),
            ObjectPointEntry::View(_) => {
                return Err(CalibError::InvalidInput(format!(
                    "object point entry {idx} is a list, but the outer length does not match \
                     the {views} views"
                )))
            }
        }
    }
    Ok(vec![shared; views])
}

/// Pair every image point set with its object point set.
///
/// Fails with [`CalibError::PointCountMismatch`] when any view's counts
/// differ and with [`CalibError::InvalidInput`] for zero views or an
/// unusable layout.
pub fn reconcile(
    image_points: Vec<ImagePointSet>,
    object_points: ObjectPointsInput,
    image_size: ImageSize,
) -> Result<CalibrationSession, CalibError> {
    let views = image_points.len();
    if views == 0 {
        return Err(CalibError::InvalidInput(
            "at least one view of image points is required".to_string(),
        ));
    }

    let object_sets = match object_points {
        ObjectPointsInput::Shared(points) => vec![to_set(&points); views],
        ObjectPointsInput::PerView(sets) => {
            if sets.len() != views {
                return Err(CalibError::InvalidInput(format!(
                    "{} per-view object point sets for {views} views",
                    sets.len()
                )));
            }
            sets.iter().map(|s| to_set(s)).collect()
        }
        ObjectPointsInput::Legacy(entries) => resolve_legacy(entries, views)?,
    };

    log::debug!(
        "reconciled {views} views, {} total points",
        object_sets.iter().map(Vec::len).sum::<usize>()
    );
    CalibrationSession::new(image_points, object_sets, image_size)
}
