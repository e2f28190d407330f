//! Calibration inputs read from disk.
//!
//! Two formats are accepted. The whitespace-separated text format is
//!
//! ```text
//! width height
//! N
//! M            (per view)
//! x y          (M lines)
//! X Y Z        (M lines)
//! ```
//!
//! and the JSON request is
//! `{"image_size": {..}, "image_points": [[{x,y}]], "object_points": [..], "object_layout": ".."}`.

use crate::reconcile::{ObjectLayout, ObjectPointEntry, ObjectPointsInput};
use crate::report::PixelPoint;
use checkercal_core::{BoardPoint, CalibError, ImagePointSet, ImageSize};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum SessionIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("data file ended early: expected {expected}")]
    Truncated { expected: String },
    #[error("could not parse {what} from {token:?}")]
    BadNumber { what: String, token: String },
    #[error("{0}")]
    Layout(String),
}

impl From<SessionIoError> for CalibError {
    fn from(err: SessionIoError) -> Self {
        CalibError::InvalidInput(err.to_string())
    }
}

/// Calibration input before reconciliation.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionInput {
    pub image_size: ImageSize,
    pub image_points: Vec<ImagePointSet>,
    pub object_points: ObjectPointsInput,
}

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next<T: FromStr>(&mut self, what: impl Fn() -> String) -> Result<T, SessionIoError> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| SessionIoError::Truncated { expected: what() })?;
        token.parse().map_err(|_| SessionIoError::BadNumber {
            what: what(),
            token: token.to_string(),
        })
    }

    fn remaining(self) -> usize {
        self.inner.count()
    }
}

/// Parse the whitespace-separated text format.
pub fn parse_session_text(text: &str) -> Result<SessionInput, SessionIoError> {
    let mut tokens = Tokens::new(text);
    let width: u32 = tokens.next(|| "image width".to_string())?;
    let height: u32 = tokens.next(|| "image height".to_string())?;
    let views: usize = tokens.next(|| "view count".to_string())?;

    // Counts come from the file; storage grows with the points actually read.
    let mut image_points = Vec::new();
    let mut object_points = Vec::new();
    for view in 0..views {
        let count: usize = tokens.next(|| format!("point count of view {view}"))?;
        let mut image = Vec::new();
        for j in 0..count {
            let x: f64 = tokens.next(|| format!("image point {j}.x of view {view}"))?;
            let y: f64 = tokens.next(|| format!("image point {j}.y of view {view}"))?;
            image.push(Point2::new(x, y));
        }
        let mut object = Vec::new();
        for j in 0..count {
            let x: f64 = tokens.next(|| format!("object point {j}.x of view {view}"))?;
            let y: f64 = tokens.next(|| format!("object point {j}.y of view {view}"))?;
            let z: f64 = tokens.next(|| format!("object point {j}.z of view {view}"))?;
            object.push(BoardPoint::new(x, y, z));
        }
        image_points.push(image);
        object_points.push(object);
    }

    let trailing = tokens.remaining();
    if trailing > 0 {
        log::warn!("ignoring {trailing} trailing token(s) after {views} views");
    }

    Ok(SessionInput {
        image_size: ImageSize::new(width, height),
        image_points,
        object_points: ObjectPointsInput::PerView(object_points),
    })
}

/// JSON calibration request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRequest {
    pub image_size: ImageSize,
    pub image_points: Vec<Vec<PixelPoint>>,
    pub object_points: Vec<ObjectPointEntry>,
    #[serde(default)]
    pub object_layout: ObjectLayout,
}

impl CalibrationRequest {
    pub fn into_session_input(self) -> Result<SessionInput, SessionIoError> {
        let image_points = self
            .image_points
            .into_iter()
            .map(|view| view.into_iter().map(PixelPoint::to_point).collect())
            .collect();
        let object_points = match self.object_layout {
            ObjectLayout::Auto => ObjectPointsInput::Legacy(self.object_points),
            ObjectLayout::Shared => ObjectPointsInput::Shared(
                self.object_points
                    .into_iter()
                    .enumerate()
                    .map(|(i, entry)| match entry {
                        ObjectPointEntry::Point(p) => Ok(p),
                        ObjectPointEntry::View(_) => Err(SessionIoError::Layout(format!(
                            "object_layout is \"shared\" but entry {i} is a list"
                        ))),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            ObjectLayout::PerView => ObjectPointsInput::PerView(
                self.object_points
                    .into_iter()
                    .enumerate()
                    .map(|(i, entry)| match entry {
                        ObjectPointEntry::View(v) => Ok(v),
                        ObjectPointEntry::Point(_) => Err(SessionIoError::Layout(format!(
                            "object_layout is \"per_view\" but entry {i} is a single point"
                        ))),
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };
        Ok(SessionInput {
            image_size: self.image_size,
            image_points,
            object_points,
        })
    }
}

pub fn parse_session_json(text: &str) -> Result<SessionInput, SessionIoError> {
    let request: CalibrationRequest = serde_json::from_str(text)?;
    request.into_session_input()
}

impl SessionInput {
    pub fn load_text(path: impl AsRef<Path>) -> Result<Self, SessionIoError> {
        let raw = std::fs::read_to_string(path)?;
        parse_session_text(&raw)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SessionIoError> {
        let raw = std::fs::read_to_string(path)?;
        parse_session_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    const TWO_VIEWS: &str = "640 480\n2\n\
        2\n10 20\n30 40\n0 0 0\n1 0 0\n\
        1\n5.5 6.5\n0 1 0\n";

    #[test]
    fn parses_text_format() {
        let input = parse_session_text(TWO_VIEWS).unwrap();
        assert_eq!(ImageSize::new(640, 480), input.image_size);
        assert_eq!(2, input.image_points.len());
        assert_eq!(Point2::new(30.0, 40.0), input.image_points[0][1]);
        assert_eq!(Point2::new(5.5, 6.5), input.image_points[1][0]);
        let ObjectPointsInput::PerView(sets) = input.object_points else {
            panic!("text format is per view");
        };
        assert_eq!(Point3::new(1.0, 0.0, 0.0), sets[0][1].to_point3());
        assert_eq!(1, sets[1].len());
    }

    #[test]
    fn truncated_header_is_reported() {
        let err = parse_session_text("640").unwrap_err();
        assert!(matches!(err, SessionIoError::Truncated { ref expected } if expected == "image height"));
        let err = parse_session_text("").unwrap_err();
        assert!(matches!(err, SessionIoError::Truncated { .. }));
    }

    #[test]
    fn truncated_block_is_reported() {
        let err = parse_session_text("640 480\n1\n2\n10 20\n30 40\n0 0 0\n").unwrap_err();
        match err {
            SessionIoError::Truncated { expected } => {
                assert_eq!("object point 1.x of view 0", expected)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn huge_header_counts_fail_as_truncated() {
        let err = parse_session_text("640 480\n100000000000\n").unwrap_err();
        assert!(
            matches!(err, SessionIoError::Truncated { ref expected } if expected == "point count of view 0"),
            "{err}"
        );

        let err = parse_session_text("640 480\n1\n100000000000\n1 2\n").unwrap_err();
        assert!(
            matches!(err, SessionIoError::Truncated { ref expected } if expected == "image point 1.x of view 0"),
            "{err}"
        );
    }

    #[test]
    fn bad_number_names_the_field() {
        let err = parse_session_text("640 abc 1").unwrap_err();
        assert!(err.to_string().contains("image height"));
        assert!(err.to_string().contains("abc"));
        let calib: CalibError = err.into();
        assert!(matches!(calib, CalibError::InvalidInput(_)));
    }

    #[test]
    fn json_request_with_explicit_layouts() {
        let shared = r#"{
            "image_size": {"width": 100, "height": 80},
            "image_points": [[{"x": 1, "y": 2}], [{"x": 3, "y": 4}]],
            "object_points": [{"x": 0, "y": 0}, {"x": 1, "y": 0}],
            "object_layout": "shared"
        }"#;
        let input = parse_session_json(shared).unwrap();
        assert!(matches!(input.object_points, ObjectPointsInput::Shared(ref v) if v.len() == 2));

        let wrong = shared.replace("\"shared\"", "\"per_view\"");
        assert!(matches!(
            parse_session_json(&wrong),
            Err(SessionIoError::Layout(_))
        ));

        let auto = shared.replace(",\n            \"object_layout\": \"shared\"", "");
        let input = parse_session_json(&auto).unwrap();
        assert!(matches!(input.object_points, ObjectPointsInput::Legacy(_)));
    }
}
