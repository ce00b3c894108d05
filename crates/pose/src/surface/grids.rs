//! Multiresolution subdivision grid adapter.
//!
//! Each base face owns a square grid of `grid_size * grid_size` vertices.
//! Grids meet at their boundaries, where every point is stored once per grid
//! touching it. Those coincident copies are reported as duplicate neighbors
//! so traversals treat them as one point.

use std::collections::HashMap;

use glam::Vec3;

use super::{
    check_length, push_unique, Batch, FaceSets, Neighbor, SculptSurface, SurfaceError,
    FACE_SET_DEFAULT,
};
use crate::spatial::{BatchConfig, VertexOctree};
use crate::types::SurfaceKind;

/// Stitched subdivision grids.
#[derive(Debug, Clone)]
pub struct SubdivGrids {
    grid_size: usize,
    positions: Vec<Vec3>,
    hidden: Vec<bool>,
    masks: Vec<f32>,
    /// One face set per grid
    grid_face_sets: Vec<i32>,
    /// Coincident copies of boundary vertices
    duplicates: HashMap<usize, Vec<usize>>,
    batches: Vec<Batch>,
}

impl SubdivGrids {
    /// Build grids with the default batch configuration.
    pub fn new(grid_size: usize, grids: Vec<Vec<Vec3>>) -> Result<Self, SurfaceError> {
        Self::with_batch_config(grid_size, grids, &BatchConfig::default())
    }

    /// Build grids, grouping whole grids into batches sized by `config`.
    pub fn with_batch_config(
        grid_size: usize,
        grids: Vec<Vec<Vec3>>,
        config: &BatchConfig,
    ) -> Result<Self, SurfaceError> {
        if grid_size < 2 {
            return Err(SurfaceError::InvalidGridSize(grid_size));
        }
        let grid_area = grid_size * grid_size;

        let mut positions = Vec::with_capacity(grids.len() * grid_area);
        for (grid, grid_positions) in grids.iter().enumerate() {
            if grid_positions.len() != grid_area {
                return Err(SurfaceError::GridSize {
                    grid,
                    grid_size,
                    expected: grid_area,
                    actual: grid_positions.len(),
                });
            }
            positions.extend_from_slice(grid_positions);
        }

        let duplicates = stitch_boundaries(&positions, grid_size);
        let batches = grid_batches(&positions, grids.len(), grid_size, config);

        Ok(Self {
            grid_size,
            hidden: vec![false; positions.len()],
            masks: vec![0.0; positions.len()],
            grid_face_sets: vec![FACE_SET_DEFAULT; grids.len()],
            positions,
            duplicates,
            batches,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn grid_count(&self) -> usize {
        self.grid_face_sets.len()
    }

    /// Vertex index of grid element `(x, y)`.
    pub fn vertex_index(&self, grid: usize, x: usize, y: usize) -> usize {
        grid * self.grid_area() + y * self.grid_size + x
    }

    /// Coincident copies of `vertex` in other grids.
    pub fn duplicates(&self, vertex: usize) -> &[usize] {
        self.duplicates.get(&vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_hidden(&mut self, vertex: usize, hidden: bool) {
        self.hidden[vertex] = hidden;
    }

    pub fn set_masks(&mut self, masks: Vec<f32>) -> Result<(), SurfaceError> {
        check_length("masks", &masks, self.positions.len())?;
        self.masks = masks;
        Ok(())
    }

    /// Replace the face sets, one id per grid.
    pub fn set_grid_face_sets(&mut self, face_sets: Vec<i32>) -> Result<(), SurfaceError> {
        check_length("grid_face_sets", &face_sets, self.grid_count())?;
        self.grid_face_sets = face_sets;
        Ok(())
    }

    fn grid_area(&self) -> usize {
        self.grid_size * self.grid_size
    }

    fn grid_of(&self, vertex: usize) -> usize {
        vertex / self.grid_area()
    }

    fn push_grid_neighbors(&self, vertex: usize, out: &mut Vec<Neighbor>) {
        let local = vertex % self.grid_area();
        let (x, y) = (local % self.grid_size, local / self.grid_size);
        let last = self.grid_size - 1;
        if x > 0 {
            push_unique(out, Neighbor::new(vertex - 1));
        }
        if x < last {
            push_unique(out, Neighbor::new(vertex + 1));
        }
        if y > 0 {
            push_unique(out, Neighbor::new(vertex - self.grid_size));
        }
        if y < last {
            push_unique(out, Neighbor::new(vertex + self.grid_size));
        }
    }

    /// Face sets of the grids sharing this point.
    fn point_face_sets(&self, vertex: usize) -> impl Iterator<Item = i32> + '_ {
        std::iter::once(vertex)
            .chain(self.duplicates(vertex).iter().copied())
            .map(|v| self.grid_face_sets[self.grid_of(v)])
    }
}

impl SculptSurface for SubdivGrids {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Grids
    }

    fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn batches(&self) -> &[Batch] {
        &self.batches
    }

    fn position(&self, vertex: usize) -> Vec3 {
        self.positions[vertex]
    }

    fn is_visible(&self, vertex: usize) -> bool {
        !self.hidden[vertex]
    }

    fn mask(&self, vertex: usize) -> f32 {
        self.masks[vertex]
    }

    fn neighbors(&self, vertex: usize, out: &mut Vec<Neighbor>) {
        self.push_grid_neighbors(vertex, out);
        for &duplicate in self.duplicates(vertex) {
            push_unique(out, Neighbor::duplicate(duplicate));
        }
        for &duplicate in self.duplicates(vertex) {
            self.push_grid_neighbors(duplicate, out);
        }
    }

    fn set_position(&mut self, vertex: usize, position: Vec3) {
        self.positions[vertex] = position;
    }

    fn positions(&self) -> Vec<Vec3> {
        self.positions.clone()
    }
}

impl FaceSets for SubdivGrids {
    fn vert_face_set(&self, vertex: usize) -> i32 {
        self.point_face_sets(vertex).max().unwrap_or(FACE_SET_DEFAULT)
    }

    fn vert_has_face_set(&self, vertex: usize, face_set: i32) -> bool {
        self.point_face_sets(vertex).any(|id| id == face_set)
    }

    fn vert_has_unique_face_set(&self, vertex: usize) -> bool {
        let own = self.grid_face_sets[self.grid_of(vertex)];
        self.point_face_sets(vertex).all(|id| id == own)
    }
}

/// Exact position key; `-0.0` and `0.0` compare equal.
fn position_key(position: Vec3) -> [u32; 3] {
    let canonical = |v: f32| if v == 0.0 { 0.0f32 } else { v };
    [
        canonical(position.x).to_bits(),
        canonical(position.y).to_bits(),
        canonical(position.z).to_bits(),
    ]
}

fn stitch_boundaries(positions: &[Vec3], grid_size: usize) -> HashMap<usize, Vec<usize>> {
    let grid_area = grid_size * grid_size;
    let last = grid_size - 1;

    let mut by_position: HashMap<[u32; 3], Vec<usize>> = HashMap::new();
    for (vertex, &position) in positions.iter().enumerate() {
        let local = vertex % grid_area;
        let (x, y) = (local % grid_size, local / grid_size);
        if x == 0 || y == 0 || x == last || y == last {
            by_position.entry(position_key(position)).or_default().push(vertex);
        }
    }

    let mut duplicates = HashMap::new();
    for copies in by_position.into_values().filter(|copies| copies.len() > 1) {
        for &vertex in &copies {
            let others: Vec<usize> = copies
                .iter()
                .copied()
                .filter(|&other| other / grid_area != vertex / grid_area)
                .collect();
            if !others.is_empty() {
                duplicates.insert(vertex, others);
            }
        }
    }
    duplicates
}

/// Group whole grids into batches using an octree over grid centroids.
fn grid_batches(
    positions: &[Vec3],
    grid_count: usize,
    grid_size: usize,
    config: &BatchConfig,
) -> Vec<Batch> {
    let grid_area = grid_size * grid_size;
    let centroids = (0..grid_count).map(|grid| {
        let range = grid * grid_area..(grid + 1) * grid_area;
        let sum: Vec3 = positions[range].iter().copied().sum();
        (grid, sum / grid_area as f32)
    });

    let grid_config = BatchConfig {
        max_vertices_per_batch: (config.max_vertices_per_batch / grid_area).max(1),
        ..config.clone()
    };

    VertexOctree::from_vertices(centroids, grid_config)
        .leaf_batches()
        .into_iter()
        .map(|grids| {
            let mut batch = Batch::default();
            for grid in grids {
                for vertex in grid * grid_area..(grid + 1) * grid_area {
                    batch.push(vertex);
                }
            }
            batch
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two 3x3 grids side by side on the XY plane, sharing the column x = 2.
    fn two_grids() -> SubdivGrids {
        let grid = |x_offset: f32| {
            (0..3)
                .flat_map(|y| (0..3).map(move |x| Vec3::new(x as f32 + x_offset, y as f32, 0.0)))
                .collect::<Vec<_>>()
        };
        SubdivGrids::new(3, vec![grid(0.0), grid(2.0)]).unwrap()
    }

    #[test]
    fn test_rejects_bad_grid_sizes() {
        assert!(matches!(
            SubdivGrids::new(1, vec![vec![Vec3::ZERO]]),
            Err(SurfaceError::InvalidGridSize(1))
        ));
        assert!(matches!(
            SubdivGrids::new(2, vec![vec![Vec3::ZERO; 3]]),
            Err(SurfaceError::GridSize { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_boundary_duplicates_are_stitched() {
        let grids = two_grids();
        // Right column of grid 0 coincides with the left column of grid 1.
        let right = grids.vertex_index(0, 2, 1);
        let left = grids.vertex_index(1, 0, 1);
        assert_eq!(grids.duplicates(right), &[left]);
        assert_eq!(grids.duplicates(left), &[right]);
        assert!(grids.duplicates(grids.vertex_index(0, 0, 1)).is_empty());
    }

    #[test]
    fn test_neighbors_cross_grid_boundary() {
        let grids = two_grids();
        let right = grids.vertex_index(0, 2, 1);
        let left = grids.vertex_index(1, 0, 1);

        let mut out = Vec::new();
        grids.neighbors(right, &mut out);

        assert!(out.contains(&Neighbor::duplicate(left)));
        assert!(out.contains(&Neighbor::new(grids.vertex_index(0, 1, 1))));
        // The duplicate's interior neighbor is reachable in one step.
        assert!(out.contains(&Neighbor::new(grids.vertex_index(1, 1, 1))));
    }

    #[test]
    fn test_face_sets_combine_across_duplicates() {
        let mut grids = two_grids();
        grids.set_grid_face_sets(vec![3, 7]).unwrap();

        let shared = grids.vertex_index(0, 2, 0);
        assert_eq!(grids.vert_face_set(shared), 7);
        assert!(grids.vert_has_face_set(shared, 3));
        assert!(!grids.vert_has_unique_face_set(shared));

        let interior = grids.vertex_index(0, 1, 1);
        assert_eq!(grids.vert_face_set(interior), 3);
        assert!(grids.vert_has_unique_face_set(interior));
    }

    #[test]
    fn test_batches_hold_whole_grids() {
        let grids = two_grids();
        let mut all: Vec<usize> = grids
            .batches()
            .iter()
            .flat_map(|batch| batch.vertices().to_vec())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..18).collect::<Vec<_>>());
        assert!(grids.batches().iter().all(|batch| batch.len() % 9 == 0));
    }
}
