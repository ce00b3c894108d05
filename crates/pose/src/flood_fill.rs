//! Breadth-first traversal over vertex adjacency.

use std::collections::VecDeque;

use crate::fake_neighbors::FakeNeighbors;
use crate::surface::{collect_neighbors, nearest_vertex, SculptSurface};
use crate::symmetry::{symmetry_flip, symmetry_passes, SymmetryFlags};

/// Breadth-first flood fill.
///
/// Every vertex is visited at most once. The visitor receives the vertex the
/// fill came from, the newly reached vertex and whether the edge joins two
/// coincident copies of one point; returning `true` continues the fill
/// through the reached vertex.
#[derive(Debug, Clone)]
pub struct FloodFill {
    queue: VecDeque<usize>,
    visited: Vec<bool>,
}

impl FloodFill {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: vec![false; vertex_count],
        }
    }

    /// Seed the fill with one vertex.
    ///
    /// The seed stays unvisited, so the visitor still sees it when the fill
    /// reaches it again through a neighbor.
    pub fn add_initial(&mut self, vertex: usize) {
        self.queue.push_back(vertex);
    }

    /// Seed the fill with a vertex the visitor never sees.
    pub fn add_and_skip_initial(&mut self, vertex: usize) {
        self.visited[vertex] = true;
        self.queue.push_back(vertex);
    }

    /// Seed the fill with `vertex` and its mirrored counterparts.
    ///
    /// For each enabled mirror pass the vertex closest to the mirrored
    /// position within `radius` is added. A radius of zero seeds only the
    /// unmirrored vertex. Returns the seeded vertices.
    pub fn add_initial_with_symmetry<S: SculptSurface + ?Sized>(
        &mut self,
        surface: &S,
        symm: SymmetryFlags,
        vertex: usize,
        radius: f32,
    ) -> Vec<usize> {
        let mut seeds = Vec::new();
        let position = surface.position(vertex);

        for pass in symmetry_passes(symm) {
            let seed = if pass.is_empty() {
                Some(vertex)
            } else if radius > 0.0 {
                let max_distance = radius.is_finite().then_some(radius);
                nearest_vertex(surface, symmetry_flip(position, pass), max_distance)
            } else {
                None
            };

            if let Some(seed) = seed {
                if !seeds.contains(&seed) {
                    self.add_initial(seed);
                    seeds.push(seed);
                }
            }
        }
        seeds
    }

    /// Whether the fill has reached `vertex`.
    pub fn is_visited(&self, vertex: usize) -> bool {
        self.visited.get(vertex).copied().unwrap_or(false)
    }

    /// Run the fill to completion. Hidden vertices are never reached.
    pub fn execute<S, F>(&mut self, surface: &S, fake_neighbors: Option<&FakeNeighbors>, mut visit: F)
    where
        S: SculptSurface + ?Sized,
        F: FnMut(usize, usize, bool) -> bool,
    {
        let mut neighbors = Vec::new();
        while let Some(from) = self.queue.pop_front() {
            collect_neighbors(surface, fake_neighbors, from, &mut neighbors);
            for neighbor in &neighbors {
                let to = neighbor.vertex;
                if self.visited[to] || !surface.is_visible(to) {
                    continue;
                }
                self.visited[to] = true;

                if visit(from, to, neighbor.is_duplicate) {
                    self.queue.push_back(to);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_meshes;

    #[test]
    fn test_fill_reaches_whole_component() {
        let mesh = test_meshes::plane(4, 4, 1.0);
        let mut fill = FloodFill::new(mesh.vertex_count());
        fill.add_initial(0);

        // The seed is reached again through its neighbors.
        let mut reached = Vec::new();
        fill.execute(&mesh, None, |_, to, _| {
            reached.push(to);
            true
        });

        reached.sort_unstable();
        assert_eq!(reached, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_visitor_stops_expansion() {
        let mesh = test_meshes::line(5, 1.0);
        let mut fill = FloodFill::new(mesh.vertex_count());
        fill.add_initial(0);

        // Visit vertex 1 but do not continue past it.
        let mut reached = Vec::new();
        fill.execute(&mesh, None, |_, to, _| {
            reached.push(to);
            to < 1
        });
        assert_eq!(reached, vec![1]);
        assert!(!fill.is_visited(3));
    }

    #[test]
    fn test_skipped_seed_is_not_visited() {
        let mesh = test_meshes::line(3, 1.0);
        let mut fill = FloodFill::new(mesh.vertex_count());
        fill.add_and_skip_initial(0);

        let mut reached = Vec::new();
        fill.execute(&mesh, None, |_, to, _| {
            reached.push(to);
            true
        });
        assert_eq!(reached, vec![1, 2]);
    }

    #[test]
    fn test_fill_skips_hidden_vertices() {
        let mut mesh = test_meshes::line(5, 1.0);
        mesh.set_vertex_hidden(2, true);
        let mut fill = FloodFill::new(mesh.vertex_count());
        fill.add_initial(0);
        fill.execute(&mesh, None, |_, _, _| true);

        assert!(fill.is_visited(1));
        assert!(!fill.is_visited(2));
        assert!(!fill.is_visited(4));
    }

    #[test]
    fn test_fill_follows_fake_neighbors() {
        let mesh = test_meshes::two_islands();
        let fake = FakeNeighbors::build(&mesh, 2.0);

        let mut fill = FloodFill::new(mesh.vertex_count());
        fill.add_initial(0);
        fill.execute(&mesh, None, |_, _, _| true);
        assert!(!fill.is_visited(4));

        let mut fill = FloodFill::new(mesh.vertex_count());
        fill.add_initial(0);
        fill.execute(&mesh, Some(&fake), |_, _, _| true);
        assert!(fill.is_visited(4));
    }

    #[test]
    fn test_symmetric_seeds() {
        // Plane centered on the origin so mirrored vertices exist.
        let mesh = test_meshes::centered_plane(4, 4, 1.0);
        let active = 0;
        let mirrored = 3;

        let mut fill = FloodFill::new(mesh.vertex_count());
        let seeds = fill.add_initial_with_symmetry(&mesh, SymmetryFlags::X, active, 0.5);
        assert_eq!(seeds, vec![active, mirrored]);

        let mut fill = FloodFill::new(mesh.vertex_count());
        let seeds = fill.add_initial_with_symmetry(&mesh, SymmetryFlags::X, active, 0.0);
        assert_eq!(seeds, vec![active]);
    }
}
