//! Synthetic chessboard images for tests and demos.
//!
//! Rendering is deterministic: each pixel averages a 4×4 grid of samples,
//! so square edges carry the partial coverage a real sensor would record.

use checkercal_core::GrayImage;
use nalgebra::Point2;

const DARK: f32 = 30.0;
const LIGHT: f32 = 225.0;

/// A board of `squares_x × squares_y` squares on a light background.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardRender {
    pub width: usize,
    pub height: usize,
    pub squares_x: usize,
    pub squares_y: usize,
    /// Square side in pixels.
    pub square: f32,
    /// Image position of the board's outer top-left corner.
    pub origin: (f32, f32),
    /// Board rotation about `origin`, radians.
    pub angle: f32,
}

impl BoardRender {
    /// Axis-aligned board.
    pub fn new(
        width: usize,
        height: usize,
        squares: (usize, usize),
        square: f32,
        origin: (f32, f32),
    ) -> Self {
        Self {
            width,
            height,
            squares_x: squares.0,
            squares_y: squares.1,
            square,
            origin,
            angle: 0.0,
        }
    }

    pub fn rotated(self, angle: f32) -> Self {
        Self { angle, ..self }
    }

    /// Inner corners, `squares_x - 1` per row, top row first.
    pub fn inner_corners(&self) -> Vec<Point2<f32>> {
        let (s, c) = self.angle.sin_cos();
        let mut corners = Vec::new();
        for r in 1..self.squares_y {
            for col in 1..self.squares_x {
                let (bx, by) = (col as f32 * self.square, r as f32 * self.square);
                corners.push(Point2::new(
                    self.origin.0 + c * bx - s * by,
                    self.origin.1 + s * bx + c * by,
                ));
            }
        }
        corners
    }

    pub fn render(&self) -> GrayImage {
        let (s, c) = self.angle.sin_cos();
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0f32;
                for sy in 0..4 {
                    for sx in 0..4 {
                        let px = x as f32 - 0.375 + 0.25 * sx as f32 - self.origin.0;
                        let py = y as f32 - 0.375 + 0.25 * sy as f32 - self.origin.1;
                        // Inverse rotation into board units.
                        let bx = (c * px + s * py) / self.square;
                        let by = (-s * px + c * py) / self.square;
                        acc += if self.is_dark(bx, by) { DARK } else { LIGHT };
                    }
                }
                data.push((acc / 16.0).round() as u8);
            }
        }
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }

    fn is_dark(&self, bx: f32, by: f32) -> bool {
        let inside =
            bx >= 0.0 && by >= 0.0 && bx < self.squares_x as f32 && by < self.squares_y as f32;
        inside && (bx.floor() as i32 + by.floor() as i32) % 2 == 0
    }
}
