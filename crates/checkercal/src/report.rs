//! JSON payloads shared by the CLI and the C ABI.

use checkercal_core::{CalibError, CalibrationResult, ErrorKind, PatternDetection};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Pixel coordinate as it appears in JSON, `{"x": .., "y": ..}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn to_point(self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

impl From<&Point2<f32>> for PixelPoint {
    fn from(p: &Point2<f32>) -> Self {
        Self {
            x: f64::from(p.x),
            y: f64::from(p.y),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub success: bool,
    pub rows: u32,
    pub cols: u32,
    pub width: u32,
    pub height: u32,
    pub corners: Vec<PixelPoint>,
    /// Candidates as `[rows, cols]`, in the order they were tried.
    pub candidates_tried: Vec<[u32; 2]>,
}

impl From<&PatternDetection> for DetectionReport {
    fn from(det: &PatternDetection) -> Self {
        Self {
            success: true,
            rows: det.size.rows,
            cols: det.size.cols,
            width: det.image_size.width,
            height: det.image_size.height,
            corners: det.corners.iter().map(PixelPoint::from).collect(),
            candidates_tried: det
                .candidates_tried
                .iter()
                .map(|s| [s.rows, s.cols])
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub success: bool,
    pub rms: f64,
    /// Row-major 3×3 intrinsic matrix.
    pub camera_matrix: [[f64; 3]; 3],
    pub dist_coeffs: Vec<f64>,
    pub rvecs: Vec<[f64; 3]>,
    pub tvecs: Vec<[f64; 3]>,
    /// Emitted as `perViewErrors`, the key existing consumers read.
    #[serde(rename = "perViewErrors", alias = "per_view_errors")]
    pub per_view_errors: Vec<f64>,
}

impl From<&CalibrationResult> for CalibrationReport {
    fn from(res: &CalibrationResult) -> Self {
        let k = &res.camera_matrix;
        let mut camera_matrix = [[0.0; 3]; 3];
        for (r, row) in camera_matrix.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = k[(r, c)];
            }
        }
        Self {
            success: true,
            rms: res.rms,
            camera_matrix,
            dist_coeffs: res.dist_coeffs.clone(),
            rvecs: res.rvecs.iter().map(|v| [v.x, v.y, v.z]).collect(),
            tvecs: res.tvecs.iter().map(|v| [v.x, v.y, v.z]).collect(),
            per_view_errors: res.per_view_errors.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub success: bool,
    pub error_kind: ErrorKind,
    pub error: String,
}

impl From<&CalibError> for FailureReport {
    fn from(err: &CalibError) -> Self {
        Self {
            success: false,
            error_kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// Serialize a report, falling back to a hand-built failure object if
/// serialization itself fails.
pub fn to_json<T: Serialize>(report: &T, pretty: bool) -> String {
    let res = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    };
    res.unwrap_or_else(|err| {
        format!(
            r#"{{"success":false,"error_kind":"InvalidInput","error":{:?}}}"#,
            err.to_string()
        )
    })
}

/// Render either outcome of a pipeline call.
pub fn outcome_json<T, R>(outcome: &Result<T, CalibError>, pretty: bool) -> String
where
    R: Serialize + for<'a> From<&'a T>,
{
    match outcome {
        Ok(value) => to_json(&R::from(value), pretty),
        Err(err) => to_json(&FailureReport::from(err), pretty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkercal_core::{ImageSize, PatternSize, SearchMode};
    use nalgebra::{Matrix3, Vector3};
    use serde_json::Value;

    #[test]
    fn detection_payload_shape() {
        let det = PatternDetection {
            size: PatternSize::new(2, 3),
            corners: vec![Point2::new(1.5f32, 2.0); 6],
            image_size: ImageSize::new(64, 48),
            candidates_tried: vec![PatternSize::new(3, 2), PatternSize::new(2, 3)],
        };
        let json: Value = serde_json::from_str(&to_json(&DetectionReport::from(&det), false)).unwrap();
        assert_eq!(Value::Bool(true), json["success"]);
        assert_eq!(2, json["rows"]);
        assert_eq!(3, json["cols"]);
        assert_eq!(64, json["width"]);
        assert_eq!(1.5, json["corners"][0]["x"]);
        assert_eq!(6, json["corners"].as_array().unwrap().len());
        assert_eq!(3, json["candidates_tried"][0][0]);
    }

    #[test]
    fn calibration_payload_is_row_major() {
        let mut k = Matrix3::identity();
        k[(0, 2)] = 320.0;
        k[(1, 2)] = 240.0;
        let res = CalibrationResult {
            camera_matrix: k,
            dist_coeffs: vec![0.1, 0.0, 0.0, 0.0, 0.0],
            rvecs: vec![Vector3::new(0.1, 0.2, 0.3)],
            tvecs: vec![Vector3::new(1.0, 2.0, 3.0)],
            rms: 0.5,
            per_view_errors: vec![0.5],
            view_point_counts: vec![4],
        };
        let json: Value =
            serde_json::from_str(&to_json(&CalibrationReport::from(&res), true)).unwrap();
        assert_eq!(320.0, json["camera_matrix"][0][2]);
        assert_eq!(240.0, json["camera_matrix"][1][2]);
        assert_eq!(0.3, json["rvecs"][0][2]);
        assert_eq!(0.5, json["perViewErrors"][0]);
        assert!(json.get("per_view_errors").is_none());
    }

    #[test]
    fn failure_payload_carries_kind() {
        let err = CalibError::PatternNotFound {
            mode: SearchMode::Auto,
            tried: vec![],
        };
        let out: Result<PatternDetection, _> = Err(err);
        let json: Value =
            serde_json::from_str(&outcome_json::<_, DetectionReport>(&out, false)).unwrap();
        assert_eq!(Value::Bool(false), json["success"]);
        assert_eq!("PatternNotFound", json["error_kind"]);
        assert!(json["error"].as_str().unwrap().contains("auto search"));
    }
}
