//! Sculpt surface adapters.
//!
//! Chain construction, growth and deformation are written once against the
//! [`SculptSurface`] and [`FaceSets`] traits. Each storage layout provides
//! one adapter:
//!
//! - [`IndexedMesh`] - polygon mesh with per-face visibility and face sets
//! - [`SubdivGrids`] - multiresolution grids stitched at their boundaries
//! - [`DynamicMesh`] - triangle mesh with stable vertex slots
//!
//! Vertex indices form a dense index space `0..vertex_count()`; scalar fields
//! such as segment weights are indexed by it. Slots that hold no vertex are
//! simply never visible.

mod dynamic;
mod grids;
mod mesh;

pub use dynamic::DynamicMesh;
pub use grids::SubdivGrids;
pub use mesh::IndexedMesh;

use glam::Vec3;
use rayon::prelude::*;

use crate::fake_neighbors::FakeNeighbors;
use crate::spatial::{BatchConfig, VertexOctree};
use crate::types::SurfaceKind;

/// Face set id meaning "no face set".
pub const FACE_SET_NONE: i32 = 0;

/// Face set assigned to faces when none is given.
pub const FACE_SET_DEFAULT: i32 = 1;

/// Errors raised while building or editing a surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Face {face} references vertex {vertex}, but the surface has {vertex_count} vertices")]
    VertexOutOfRange {
        face: usize,
        vertex: usize,
        vertex_count: usize,
    },
    #[error("Face {face} has {corners} corners, at least 3 are required")]
    DegenerateFace { face: usize, corners: usize },
    #[error("{attribute} has {actual} values, expected {expected}")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Grid {grid} has {actual} positions, expected {expected} for grid size {grid_size}")]
    GridSize {
        grid: usize,
        grid_size: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Grid size must be at least 2, got {0}")]
    InvalidGridSize(usize),
}

/// An independently processable subset of a surface's vertices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    vertices: Vec<usize>,
}

impl Batch {
    pub fn new(vertices: Vec<usize>) -> Self {
        Self { vertices }
    }

    /// Vertex indices owned by this batch.
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub(crate) fn push(&mut self, vertex: usize) {
        self.vertices.push(vertex);
    }
}

/// An adjacent vertex.
///
/// `is_duplicate` marks a coincident copy of the same point (grid
/// boundaries) rather than a distinct neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub vertex: usize,
    pub is_duplicate: bool,
}

impl Neighbor {
    pub fn new(vertex: usize) -> Self {
        Self {
            vertex,
            is_duplicate: false,
        }
    }

    pub fn duplicate(vertex: usize) -> Self {
        Self {
            vertex,
            is_duplicate: true,
        }
    }
}

/// Per-vertex access to a sculptable surface.
///
/// Batches partition the visible vertices: every vertex appears in at most
/// one batch, so batch results can be written back without overlap.
pub trait SculptSurface: Sync {
    /// Storage layout of this surface.
    fn kind(&self) -> SurfaceKind;

    /// Size of the vertex index space.
    fn vertex_count(&self) -> usize;

    /// Processable batches.
    fn batches(&self) -> &[Batch];

    /// Current position of a vertex.
    fn position(&self, vertex: usize) -> Vec3;

    /// Whether the vertex exists and is not hidden.
    fn is_visible(&self, vertex: usize) -> bool;

    /// Mask value in `[0, 1]`; 1 fully protects the vertex.
    fn mask(&self, vertex: usize) -> f32;

    /// Topological neighbors of `vertex`, appended to `out`.
    fn neighbors(&self, vertex: usize, out: &mut Vec<Neighbor>);

    /// Overwrite a vertex position.
    fn set_position(&mut self, vertex: usize, position: Vec3);

    /// Snapshot of every position in the index space.
    fn positions(&self) -> Vec<Vec3> {
        (0..self.vertex_count()).map(|v| self.position(v)).collect()
    }
}

/// Semantic partition (face set) queries.
pub trait FaceSets {
    /// Face set of a vertex; the highest id among its faces.
    fn vert_face_set(&self, vertex: usize) -> i32;

    /// Whether any face around the vertex belongs to `face_set`.
    fn vert_has_face_set(&self, vertex: usize, face_set: i32) -> bool;

    /// Whether all faces around the vertex share one face set.
    fn vert_has_unique_face_set(&self, vertex: usize) -> bool;

    /// Face set under the stroke's active vertex.
    fn active_face_set(&self, active_vertex: usize) -> i32 {
        self.vert_face_set(active_vertex)
    }
}

/// Collect the neighbors of `vertex`, including its fake neighbor bridge.
pub fn collect_neighbors<S: SculptSurface + ?Sized>(
    surface: &S,
    fake_neighbors: Option<&FakeNeighbors>,
    vertex: usize,
    out: &mut Vec<Neighbor>,
) {
    out.clear();
    surface.neighbors(vertex, out);
    if let Some(bridge) = fake_neighbors.and_then(|fake| fake.get(vertex)) {
        if !out.iter().any(|n| n.vertex == bridge) {
            out.push(Neighbor::new(bridge));
        }
    }
}

/// Closest visible vertex to `location`, optionally limited to `max_distance`.
///
/// Ties resolve to the lowest vertex index so the result does not depend on
/// batch scheduling.
pub fn nearest_vertex<S: SculptSurface + ?Sized>(
    surface: &S,
    location: Vec3,
    max_distance: Option<f32>,
) -> Option<usize> {
    let limit_sq = max_distance.map(|d| d * d).unwrap_or(f32::INFINITY);

    surface
        .batches()
        .par_iter()
        .filter_map(|batch| {
            batch
                .vertices()
                .iter()
                .copied()
                .filter(|&v| surface.is_visible(v))
                .map(|v| (surface.position(v).distance_squared(location), v))
                .filter(|&(dist_sq, _)| dist_sq <= limit_sq)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, v)| v)
}

/// Partition vertices into batches using the octree leaves.
pub fn build_batches(vertices: impl Iterator<Item = (usize, Vec3)>, config: &BatchConfig) -> Vec<Batch> {
    VertexOctree::from_vertices(vertices, config.clone())
        .leaf_batches()
        .into_iter()
        .map(Batch::new)
        .collect()
}

fn check_length<T>(attribute: &'static str, values: &[T], expected: usize) -> Result<(), SurfaceError> {
    if values.len() != expected {
        return Err(SurfaceError::AttributeLength {
            attribute,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

fn push_unique(out: &mut Vec<Neighbor>, neighbor: Neighbor) {
    if !out.iter().any(|n| n.vertex == neighbor.vertex) {
        out.push(neighbor);
    }
}
