//! Chessboard finder: X-corners → grid graph → exact-size layout.

use crate::corners::{detect_xcorners, ChessCornerParams, XCorner};
use crate::filters::{flatten_illumination, normalize_contrast};
use crate::grid::{grid_layouts, GridGraphParams, GridLayout};
use checkercal_core::{FinderFlags, GrayImage, GrayImageView, PatternFinder, PatternSize};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessboardFinderParams {
    pub corners: ChessCornerParams,
    pub grid: GridGraphParams,
}

/// Corner analysis of one image, independent of the requested size.
#[derive(Clone, Debug, Default)]
pub struct ChessboardScene {
    corners: Vec<XCorner>,
    layouts: Vec<GridLayout>,
}

impl ChessboardScene {
    /// X-corners seen after preprocessing.
    pub fn corners(&self) -> &[XCorner] {
        &self.corners
    }

    /// Connected grid components, largest first.
    pub fn layouts(&self) -> &[GridLayout] {
        &self.layouts
    }
}

/// Finds a chessboard of an exact inner-corner size.
#[derive(Clone, Debug, Default)]
pub struct ChessboardFinder {
    pub params: ChessboardFinderParams,
}

impl ChessboardFinder {
    pub fn new(params: ChessboardFinderParams) -> Self {
        Self { params }
    }
}

impl PatternFinder for ChessboardFinder {
    type Scene = ChessboardScene;

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(w = image.width, h = image.height)))]
    fn prepare(&self, image: &GrayImageView<'_>, flags: &FinderFlags) -> ChessboardScene {
        let mut owned: Option<GrayImage> = None;
        if flags.normalize_image {
            owned = Some(normalize_contrast(image));
        }
        if flags.adaptive_threshold {
            let src = owned.as_ref().map(GrayImage::view).unwrap_or(*image);
            let radius = (image.width.min(image.height) / 8).clamp(8, 64);
            owned = Some(flatten_illumination(&src, radius));
        }
        let prepared = owned.as_ref().map(GrayImage::view).unwrap_or(*image);

        let corners = detect_xcorners(&prepared, &self.params.corners);
        let layouts = grid_layouts(&corners, &self.params.grid);
        debug!(
            "{} x-corners, {} grid components (largest {})",
            corners.len(),
            layouts.len(),
            layouts.first().map_or(0, |l| l.nodes.len())
        );
        ChessboardScene { corners, layouts }
    }

    fn find_in_scene(
        &self,
        scene: &ChessboardScene,
        size: PatternSize,
        flags: &FinderFlags,
    ) -> Option<Vec<Point2<f32>>> {
        if size.rows < 2 || size.cols < 2 {
            return None;
        }
        let needed = usize::try_from(size.area()).ok()?;
        if flags.fast_check && scene.corners.len() < needed {
            return None;
        }

        let (rows, cols) = (size.rows as usize, size.cols as usize);
        for layout in scene.layouts.iter().filter(|l| l.is_complete()) {
            if layout.width == cols && layout.height == rows {
                return Some(ordered(layout, &scene.corners, rows, cols, |r, c| (c, r)));
            }
            if layout.width == rows && layout.height == cols {
                // Board lies on its side: pattern rows run along u, and
                // columns climb against v so the ordering stays a rotation.
                let h = layout.height;
                return Some(ordered(layout, &scene.corners, rows, cols, |r, c| {
                    (r, h - 1 - c)
                }));
            }
        }
        None
    }
}

/// Emit corners in pattern row-major order; `cell(r, c)` maps a pattern
/// position to layout coordinates `(i, j)`.
fn ordered(
    layout: &GridLayout,
    corners: &[XCorner],
    rows: usize,
    cols: usize,
    cell: impl Fn(usize, usize) -> (usize, usize),
) -> Vec<Point2<f32>> {
    let mut at = vec![0usize; layout.width * layout.height];
    for &(idx, i, j) in &layout.nodes {
        at[j * layout.width + i] = idx;
    }
    let mut out = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let (i, j) = cell(r, c);
            out.push(corners[at[j * layout.width + i]].position);
        }
    }
    out
}
