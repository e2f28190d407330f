use checkercal::core::Projector;
use checkercal::vision::PinholeProjector;
use checkercal_ffi::{
    checkercal_calibrate, checkercal_detect_corners, checkercal_string_free, checkercal_version,
    CHECKERCAL_LAYOUT_AUTO, CHECKERCAL_LAYOUT_SHARED,
};
use nalgebra::{Matrix3, Point3, Vector3};
use serde_json::Value;
use std::ffi::CStr;
use std::os::raw::c_char;

fn take_json(ptr: *mut c_char) -> Value {
    assert!(!ptr.is_null());
    let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
    unsafe { checkercal_string_free(ptr) };
    serde_json::from_str(&text).unwrap()
}

struct Synthetic {
    image_xy: Vec<f64>,
    image_counts: Vec<u32>,
    board_xy: Vec<f64>,
}

fn synthetic() -> Synthetic {
    let k = Matrix3::new(600.0, 0.0, 319.5, 0.0, 600.0, 239.5, 0.0, 0.0, 1.0);
    let board: Vec<Point3<f64>> = (0..4)
        .flat_map(|r| (0..5).map(move |c| Point3::new(c as f64 * 0.03, r as f64 * 0.03, 0.0)))
        .collect();
    let poses = [
        (Vector3::new(0.3, 0.1, 0.0), Vector3::new(-0.06, -0.04, 0.5)),
        (Vector3::new(-0.1, 0.35, 0.05), Vector3::new(-0.05, -0.05, 0.55)),
        (Vector3::new(0.2, -0.25, -0.1), Vector3::new(-0.07, -0.03, 0.6)),
    ];

    let mut image_xy = Vec::new();
    let mut image_counts = Vec::new();
    for (r, t) in &poses {
        let projected = PinholeProjector.project(&board, r, t, &k, &[]).unwrap();
        image_counts.push(projected.len() as u32);
        image_xy.extend(projected.iter().flat_map(|p| [p.x, p.y]));
    }
    let board_xy = board.iter().flat_map(|p| [p.x, p.y]).collect();
    Synthetic {
        image_xy,
        image_counts,
        board_xy,
    }
}

#[test]
fn calibration_round_trip_through_raw_pointers() {
    let s = synthetic();
    let object_counts = [20u32];
    let json = take_json(unsafe {
        checkercal_calibrate(
            s.image_xy.as_ptr(),
            s.image_counts.as_ptr(),
            s.image_counts.len() as u32,
            s.board_xy.as_ptr(),
            2,
            object_counts.as_ptr(),
            1,
            CHECKERCAL_LAYOUT_SHARED,
            640,
            480,
        )
    });
    assert_eq!(Value::Bool(true), json["success"], "{json}");
    assert!(json["rms"].as_f64().unwrap() < 1e-4);
    assert!((json["camera_matrix"][0][0].as_f64().unwrap() - 600.0).abs() < 0.1);
    assert_eq!(3, json["perViewErrors"].as_array().unwrap().len());
}

#[test]
fn auto_layout_replicates_a_single_set() {
    let s = synthetic();
    let object_counts = [20u32];
    let json = take_json(unsafe {
        checkercal_calibrate(
            s.image_xy.as_ptr(),
            s.image_counts.as_ptr(),
            3,
            s.board_xy.as_ptr(),
            2,
            object_counts.as_ptr(),
            1,
            CHECKERCAL_LAYOUT_AUTO,
            640,
            480,
        )
    });
    assert_eq!(Value::Bool(true), json["success"], "{json}");
}

#[test]
fn null_pointer_yields_invalid_input() {
    let counts = [4u32];
    let json = take_json(unsafe {
        checkercal_calibrate(
            std::ptr::null(),
            counts.as_ptr(),
            1,
            std::ptr::null(),
            3,
            counts.as_ptr(),
            1,
            CHECKERCAL_LAYOUT_AUTO,
            640,
            480,
        )
    });
    assert_eq!(Value::Bool(false), json["success"]);
    assert_eq!("InvalidInput", json["error_kind"]);
    assert!(json["error"].as_str().unwrap().contains("image_xy is null"));

    let json = take_json(unsafe { checkercal_detect_corners(std::ptr::null(), 8, 8, 1, 0, 0, 0) });
    assert_eq!("InvalidInput", json["error_kind"]);
}

#[test]
fn bad_channel_count_is_invalid_input() {
    let pixels = vec![0u8; 16 * 16 * 2];
    let json = take_json(unsafe { checkercal_detect_corners(pixels.as_ptr(), 16, 16, 2, 0, 0, 0) });
    assert_eq!("InvalidInput", json["error_kind"]);
}

#[test]
fn blank_rgba_frame_reports_pattern_not_found() {
    let (w, h) = (96u32, 64u32);
    let pixels = vec![180u8; (w * h * 4) as usize];
    let json = take_json(unsafe { checkercal_detect_corners(pixels.as_ptr(), w, h, 4, 0, 7, 9) });
    assert_eq!(Value::Bool(false), json["success"]);
    assert_eq!("PatternNotFound", json["error_kind"]);
    assert!(json["error"].as_str().unwrap().contains("hinted search"));
}

#[test]
fn extreme_hint_reports_pattern_not_found() {
    let pixels = vec![90u8; 64 * 48];
    let json = take_json(unsafe {
        checkercal_detect_corners(pixels.as_ptr(), 64, 48, 1, 0, i32::MAX, i32::MAX)
    });
    assert_eq!("PatternNotFound", json["error_kind"], "{json}");
}

#[test]
fn version_matches_crate() {
    let v = unsafe { CStr::from_ptr(checkercal_version()) };
    assert_eq!(env!("CARGO_PKG_VERSION"), v.to_str().unwrap());
}

#[test]
fn freeing_null_is_a_no_op() {
    unsafe { checkercal_string_free(std::ptr::null_mut()) };
}
