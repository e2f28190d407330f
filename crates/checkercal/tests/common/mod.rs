#![allow(dead_code)]

use checkercal::core::{BoardPoint, GrayImage, ImageSize, Projector};
use checkercal::vision::synthetic::BoardRender;
use checkercal::vision::PinholeProjector;
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use std::path::Path;

/// Axis-aligned board of `squares_x × squares_y` squares. Returns the image
/// and the inner corners row by row.
pub fn render_board(
    width: usize,
    height: usize,
    squares_x: usize,
    squares_y: usize,
    square: f32,
    origin: (f32, f32),
) -> (GrayImage, Vec<Point2<f32>>) {
    let board = BoardRender::new(width, height, (squares_x, squares_y), square, origin);
    (board.render(), board.inner_corners())
}

pub fn save_png(img: &GrayImage, path: &Path) {
    let buf = image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .unwrap();
    buf.save(path).unwrap();
}

pub fn max_error(found: &[Point2<f32>], truth: &[Point2<f32>]) -> f32 {
    assert_eq!(truth.len(), found.len());
    found
        .iter()
        .zip(truth)
        .map(|(a, b)| (a - b).norm())
        .fold(0.0, f32::max)
}

pub const IMAGE_SIZE: ImageSize = ImageSize::new(640, 480);

pub fn camera() -> Matrix3<f64> {
    // Principal point at the pixel-grid centre of a 640×480 sensor.
    Matrix3::new(800.0, 0.0, 319.5, 0.0, 780.0, 239.5, 0.0, 0.0, 1.0)
}

/// `cols × rows` planar board points with the given pitch, `z` omitted.
pub fn board(rows: usize, cols: usize, pitch: f64) -> Vec<BoardPoint> {
    let mut pts = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            pts.push(BoardPoint::planar(c as f64 * pitch, r as f64 * pitch));
        }
    }
    pts
}

pub fn poses() -> Vec<(Vector3<f64>, Vector3<f64>)> {
    vec![
        (Vector3::new(0.3, 0.1, 0.02), Vector3::new(-0.05, -0.03, 0.5)),
        (Vector3::new(-0.1, 0.35, 0.05), Vector3::new(-0.04, -0.02, 0.55)),
        (Vector3::new(0.2, -0.25, -0.1), Vector3::new(-0.06, -0.04, 0.6)),
    ]
}

/// Noise-free image points of `board` seen from each pose.
pub fn project_views(
    board: &[BoardPoint],
    poses: &[(Vector3<f64>, Vector3<f64>)],
) -> Vec<Vec<Point2<f64>>> {
    let pts: Vec<Point3<f64>> = board.iter().map(BoardPoint::to_point3).collect();
    poses
        .iter()
        .map(|(r, t)| {
            PinholeProjector
                .project(&pts, r, t, &camera(), &[])
                .unwrap()
        })
        .collect()
}

/// Text data file in the `width height / N / M / x y / X Y Z` format.
pub fn session_text(views: &[Vec<Point2<f64>>], board: &[BoardPoint]) -> String {
    let mut out = format!("{} {}\n{}\n", IMAGE_SIZE.width, IMAGE_SIZE.height, views.len());
    for view in views {
        out.push_str(&format!("{}\n", view.len()));
        for p in view {
            out.push_str(&format!("{:.12} {:.12}\n", p.x, p.y));
        }
        for p in board {
            let q = p.to_point3();
            out.push_str(&format!("{} {} {}\n", q.x, q.y, q.z));
        }
    }
    out
}
