//! Grid graph over X-corners.
//!
//! 1. Estimate the spacing scale from nearest-neighbor distances.
//! 2. Estimate two global grid axes (u, v) from the corner orientations.
//! 3. For each corner, keep at most one neighbor per direction (±u, ±v)
//!    whose edge sits at ~45° to both corners' diagonals.
//! 4. Keep only mutual links, split into connected components, and BFS each
//!    component into integer grid coordinates.

use crate::geom::{angle_to_unit, axis_vec_diff, is_orthogonal, median};
use crate::corners::XCorner;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    fn slot(self) -> usize {
        match self {
            NeighborDirection::Right => 0,
            NeighborDirection::Left => 1,
            NeighborDirection::Up => 2,
            NeighborDirection::Down => 3,
        }
    }

    fn opposite(self) -> Self {
        match self {
            NeighborDirection::Right => NeighborDirection::Left,
            NeighborDirection::Left => NeighborDirection::Right,
            NeighborDirection::Up => NeighborDirection::Down,
            NeighborDirection::Down => NeighborDirection::Up,
        }
    }

    fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
    /// Accepted edge lengths relative to the median nearest-neighbor distance.
    pub min_spacing_ratio: f32,
    pub max_spacing_ratio: f32,
    /// Absolute floor on edge length, in pixels.
    pub min_spacing_pix: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
            min_spacing_ratio: 0.4,
            max_spacing_ratio: 2.5,
            min_spacing_pix: 3.0,
        }
    }
}

/// Two image-space unit axes: `u` runs left to right, `v` top to bottom.
#[derive(Clone, Copy, Debug)]
pub struct GridAxes {
    pub u: Vector2<f32>,
    pub v: Vector2<f32>,
}

impl GridAxes {
    /// Derive axes from corner orientations.
    ///
    /// Adjacent corners have orthogonal diagonals, so orientations are
    /// averaged with a quadruple-angle trick (θ and θ + π/2 coincide). The grid
    /// lines run at 45° to the mean diagonal.
    pub fn from_corners(corners: &[XCorner]) -> Option<Self> {
        let mut sum = Vector2::<f32>::zeros();
        for c in corners {
            let w = c.response.max(0.0);
            let four = 4.0 * c.orientation;
            sum += w * Vector2::new(four.cos(), four.sin());
        }
        if sum.norm_squared() < 1e-12 {
            return None;
        }
        let diagonal = 0.25 * sum.y.atan2(sum.x);
        let a = diagonal + FRAC_PI_4;
        let b = diagonal - FRAC_PI_4;
        let axis = if a.cos().abs() >= b.cos().abs() { a } else { b };
        let mut u = angle_to_unit(axis);
        if u.x < 0.0 {
            u = -u;
        }
        let v = Vector2::new(-u.y, u.x);
        Some(Self { u, v })
    }

    fn classify(&self, edge: &Vector2<f32>) -> NeighborDirection {
        let pu = edge.dot(&self.u);
        let pv = edge.dot(&self.v);
        if pu.abs() >= pv.abs() {
            if pu >= 0.0 {
                NeighborDirection::Right
            } else {
                NeighborDirection::Left
            }
        } else if pv >= 0.0 {
            NeighborDirection::Down
        } else {
            NeighborDirection::Up
        }
    }
}

fn is_good_neighbor(
    corner: &XCorner,
    neighbor: &XCorner,
    neighbor_index: usize,
    spacing: (f32, f32),
    tolerance: f32,
    axes: &GridAxes,
) -> Option<NodeNeighbor> {
    // Bright diagonals of grid neighbors are orthogonal.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tolerance) {
        return None;
    }

    let edge = neighbor.position - corner.position;
    let distance = edge.norm();
    if distance < spacing.0 || distance > spacing.1 {
        return None;
    }

    // The edge runs at 45° to both diagonals.
    let edge_angle = edge.y.atan2(edge.x);
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_corner > tolerance || score_neighbor > tolerance {
        return None;
    }

    let score_orientation =
        (FRAC_PI_2 - axis_vec_diff(corner.orientation, neighbor.orientation)).abs();

    Some(NodeNeighbor {
        direction: axes.classify(&edge),
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbor per direction, choosing the lowest-score candidate.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> [Option<NodeNeighbor>; 4] {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = &mut best[candidate.direction.slot()];
        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.score < current.score
                    || (candidate.score == current.score && candidate.distance < current.distance)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }
    best
}

pub struct GridGraph {
    /// For each node, its accepted neighbors (mutual links only).
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[XCorner], params: &GridGraphParams) -> Option<Self> {
        if corners.len() < 2 {
            return None;
        }
        let axes = GridAxes::from_corners(corners)?;

        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();

        // Spacing scale from nearest-neighbor distances.
        let mut nn_dist: Vec<f32> = coords
            .iter()
            .enumerate()
            .filter_map(|(i, q)| {
                tree.nearest_n::<SquaredEuclidean>(q, 2)
                    .into_iter()
                    .find(|nn| nn.item as usize != i)
                    .map(|nn| nn.distance.sqrt())
            })
            .collect();
        let base = median(&mut nn_dist)?;
        let spacing = (
            (base * params.min_spacing_ratio).max(params.min_spacing_pix),
            base * params.max_spacing_ratio,
        );
        let tolerance = params.orientation_tolerance_deg.to_radians();

        let mut best: Vec<[Option<NodeNeighbor>; 4]> = Vec::with_capacity(corners.len());
        for (i, corner) in corners.iter().enumerate() {
            let query = [corner.position.x, corner.position.y];
            let candidates = tree
                .nearest_n::<SquaredEuclidean>(&query, params.k_neighbors + 1)
                .into_iter()
                .map(|nn| nn.item as usize)
                .filter(|&j| j != i)
                .filter_map(|j| {
                    is_good_neighbor(corner, &corners[j], j, spacing, tolerance, &axes)
                })
                .collect();
            best.push(select_neighbors(candidates));
        }

        let neighbors = (0..corners.len())
            .map(|i| {
                best[i]
                    .iter()
                    .flatten()
                    .filter(|n| {
                        best[n.index][n.direction.opposite().slot()]
                            .as_ref()
                            .is_some_and(|back| back.index == i)
                    })
                    .cloned()
                    .collect()
            })
            .collect();

        Some(Self { neighbors })
    }
}

pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut visited = vec![false; graph.neighbors.len()];
    let mut components = Vec::new();

    for start in 0..graph.neighbors.len() {
        if visited[start] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);

            for neighbor in &graph.neighbors[node] {
                if !visited[neighbor.index] {
                    stack.push(neighbor.index);
                }
            }
        }

        components.push(component);
    }

    components
}

/// A connected component laid out on integer grid coordinates, with the
/// minimum coordinate at `(0, 0)`.
#[derive(Clone, Debug)]
pub struct GridLayout {
    pub width: usize,
    pub height: usize,
    /// `(corner index, i, j)` with `i` along u and `j` along v.
    pub nodes: Vec<(usize, usize, usize)>,
}

impl GridLayout {
    /// Every cell of the `width × height` rectangle holds exactly one corner.
    pub fn is_complete(&self) -> bool {
        self.width * self.height == self.nodes.len()
    }
}

/// BFS a component into grid coordinates. Returns `None` when links
/// disagree (a node reached at two different coordinates, or two nodes on
/// one coordinate).
pub fn assign_grid_coordinates(graph: &GridGraph, component: &[usize]) -> Option<GridLayout> {
    let start = *component.first()?;
    let mut coord_of: HashMap<usize, (i32, i32)> = HashMap::new();
    let mut queue = VecDeque::new();
    coord_of.insert(start, (0, 0));
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        let (i, j) = coord_of[&node];
        for neighbor in &graph.neighbors[node] {
            let (di, dj) = neighbor.direction.step();
            let expected = (i + di, j + dj);
            match coord_of.get(&neighbor.index) {
                Some(&seen) if seen != expected => return None,
                Some(_) => {}
                None => {
                    coord_of.insert(neighbor.index, expected);
                    queue.push_back(neighbor.index);
                }
            }
        }
    }

    let min_i = coord_of.values().map(|c| c.0).min()?;
    let min_j = coord_of.values().map(|c| c.1).min()?;
    let max_i = coord_of.values().map(|c| c.0).max()?;
    let max_j = coord_of.values().map(|c| c.1).max()?;
    let width = (max_i - min_i + 1) as usize;
    let height = (max_j - min_j + 1) as usize;

    let mut occupied = vec![false; width * height];
    let mut nodes = Vec::with_capacity(coord_of.len());
    for (&idx, &(i, j)) in &coord_of {
        let (gi, gj) = ((i - min_i) as usize, (j - min_j) as usize);
        let cell = gj * width + gi;
        if occupied[cell] {
            return None;
        }
        occupied[cell] = true;
        nodes.push((idx, gi, gj));
    }
    nodes.sort_by_key(|&(_, i, j)| (j, i));

    Some(GridLayout {
        width,
        height,
        nodes,
    })
}

/// All consistent layouts in the corner cloud, largest first.
pub fn grid_layouts(corners: &[XCorner], params: &GridGraphParams) -> Vec<GridLayout> {
    let Some(graph) = GridGraph::new(corners, params) else {
        return Vec::new();
    };
    let mut layouts: Vec<GridLayout> = connected_components(&graph)
        .iter()
        .filter(|c| c.len() >= 2)
        .filter_map(|c| assign_grid_coordinates(&graph, c))
        .collect();
    layouts.sort_by(|a, b| b.nodes.len().cmp(&a.nodes.len()));
    layouts
}
