mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use serde_json::Value;
use std::io::Write;
use tempfile::NamedTempFile;

fn checkercal() -> Command {
    Command::cargo_bin("checkercal").unwrap()
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn data_file() -> NamedTempFile {
    let board = board(4, 5, 0.03);
    let views = project_views(&board, &poses());
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(session_text(&views, &board).as_bytes()).unwrap();
    file
}

#[test]
fn calibrate_text_file_succeeds() {
    let file = data_file();
    let output = checkercal()
        .arg("calibrate")
        .arg(file.path())
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(Value::Bool(true), json["success"]);
    assert!(json["rms"].as_f64().unwrap() < 1e-4);
    assert_eq!(3, json["perViewErrors"].as_array().unwrap().len());
    assert_eq!(3, json["rvecs"].as_array().unwrap().len());
    assert!((json["camera_matrix"][0][0].as_f64().unwrap() - 800.0).abs() < 0.1);
}

#[test]
fn calibrate_json_request_with_shared_layout() {
    let board = board(4, 5, 0.03);
    let views = project_views(&board, &poses());
    let request = serde_json::json!({
        "image_size": {"width": IMAGE_SIZE.width, "height": IMAGE_SIZE.height},
        "image_points": views
            .iter()
            .map(|v| v.iter().map(|p| serde_json::json!({"x": p.x, "y": p.y})).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
        "object_points": board,
        "object_layout": "shared",
    });
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(request.to_string().as_bytes()).unwrap();

    checkercal()
        .args(["calibrate", "--json", "--pretty"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"));
}

#[test]
fn missing_data_file_is_an_invocation_error() {
    let output = checkercal()
        .args(["calibrate", "/nonexistent/session.txt"])
        .assert()
        .code(1)
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(Value::Bool(false), json["success"]);
    assert_eq!("InvalidInput", json["error_kind"]);
}

#[test]
fn truncated_data_file_is_an_invocation_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "640 480\n2\n4\n1 2\n").unwrap();
    checkercal()
        .arg("calibrate")
        .arg(file.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("data file ended early"));
}

#[test]
fn absurd_view_count_is_an_invocation_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "640 480\n100000000000\n").unwrap();
    checkercal()
        .arg("calibrate")
        .arg(file.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("InvalidInput"))
        .stdout(predicate::str::contains("point count of view 0"));
}

#[test]
fn fronto_parallel_single_view_is_a_reported_failure() {
    let mut file = NamedTempFile::new().unwrap();
    // Image equals board: no perspective to initialize focal lengths from.
    write!(
        file,
        "640 480\n1\n4\n0 0\n1 0\n0 1\n1 1\n0 0 0\n1 0 0\n0 1 0\n1 1 0\n"
    )
    .unwrap();
    let output = checkercal()
        .args(["calibrate"])
        .arg(file.path())
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(Value::Bool(false), json["success"]);
    assert_eq!("CalibrationSolverError", json["error_kind"]);
}

#[test]
fn detect_without_board_reports_pattern_not_found() {
    let img = checkercal::core::GrayImage::new(160, 120, vec![200; 160 * 120]).unwrap();
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    save_png(&img, file.path());

    let output = checkercal()
        .arg("detect")
        .arg(file.path())
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(Value::Bool(false), json["success"]);
    assert_eq!("PatternNotFound", json["error_kind"]);
    assert!(json["error"].as_str().unwrap().contains("auto search"));
}

#[test]
fn detect_rendered_board_with_hint() {
    let (img, truth) = render_board(220, 160, 7, 5, 20.0, (40.0, 30.0));
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    save_png(&img, file.path());

    let output = checkercal()
        .arg("detect")
        .arg(file.path())
        .args(["5", "7"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(Value::Bool(true), json["success"]);
    assert_eq!(4, json["rows"]);
    assert_eq!(6, json["cols"]);
    assert_eq!(220, json["width"]);
    assert_eq!(160, json["height"]);
    let corners = json["corners"].as_array().unwrap();
    assert_eq!(truth.len(), corners.len());
    let x0 = corners[0]["x"].as_f64().unwrap() as f32;
    let y0 = corners[0]["y"].as_f64().unwrap() as f32;
    assert!((x0 - truth[0].x).abs() < 0.5 && (y0 - truth[0].y).abs() < 0.5);
}

#[test]
fn unreadable_image_exits_with_failure() {
    checkercal()
        .args(["detect", "/nonexistent/board.png"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ImageUnreadable"));
}

#[test]
fn bad_params_file_exits_with_failure() {
    let mut params = NamedTempFile::new().unwrap();
    write!(params, "{{ broken").unwrap();
    let file = data_file();
    checkercal()
        .arg("--params")
        .arg(params.path())
        .arg("calibrate")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("params file"));
}

#[test]
fn usage_errors_keep_clap_exit_code() {
    checkercal().arg("calibrate").assert().code(2);
}
