//! Bridges between disconnected surface islands.
//!
//! When the brush does not restrict itself to connected geometry, every
//! vertex may be paired with the closest vertex of another island. Flood
//! fills and factor growth follow the bridge like an ordinary edge.

use std::collections::VecDeque;

use tracing::debug;

use crate::spatial::{BatchConfig, VertexOctree};
use crate::surface::{Neighbor, SculptSurface};

/// Symmetric vertex pairing across islands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeNeighbors {
    links: Vec<Option<usize>>,
}

impl FakeNeighbors {
    /// Pair vertices of different islands closer than `max_distance`.
    ///
    /// Vertices are processed in index order. Each takes the nearest
    /// still-unpaired vertex of another island, so every vertex ends up with
    /// at most one bridge and bridges are symmetric.
    pub fn build<S: SculptSurface + ?Sized>(surface: &S, max_distance: f32) -> Self {
        let vertex_count = surface.vertex_count();
        let islands = island_ids(surface);
        let mut links = vec![None; vertex_count];

        let octree = VertexOctree::from_vertices(
            (0..vertex_count)
                .filter(|&v| surface.is_visible(v))
                .map(|v| (v, surface.position(v))),
            BatchConfig::default(),
        );

        for vertex in 0..vertex_count {
            if links[vertex].is_some() || !surface.is_visible(vertex) {
                continue;
            }
            let position = surface.position(vertex);

            let nearest = octree
                .query_sphere(position, max_distance)
                .into_iter()
                .filter(|&candidate| {
                    islands[candidate] != islands[vertex] && links[candidate].is_none()
                })
                .map(|candidate| (surface.position(candidate).distance_squared(position), candidate))
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            if let Some((_, candidate)) = nearest {
                links[vertex] = Some(candidate);
                links[candidate] = Some(vertex);
            }
        }

        let bridged = links.iter().filter(|link| link.is_some()).count() / 2;
        debug!("Fake neighbors: {} bridges for {} vertices", bridged, vertex_count);

        Self { links }
    }

    /// Bridge partner of `vertex`, if any.
    pub fn get(&self, vertex: usize) -> Option<usize> {
        self.links.get(vertex).copied().flatten()
    }

    /// Number of bridged pairs.
    pub fn pair_count(&self) -> usize {
        self.links.iter().filter(|link| link.is_some()).count() / 2
    }
}

/// Connected component id per vertex; hidden vertices get their own ids.
fn island_ids<S: SculptSurface + ?Sized>(surface: &S) -> Vec<usize> {
    let vertex_count = surface.vertex_count();
    let mut ids = vec![usize::MAX; vertex_count];
    let mut queue = VecDeque::new();
    let mut neighbors: Vec<Neighbor> = Vec::new();
    let mut next_id = 0;

    for start in 0..vertex_count {
        if ids[start] != usize::MAX {
            continue;
        }
        ids[start] = next_id;
        if surface.is_visible(start) {
            queue.push_back(start);
        }

        while let Some(vertex) = queue.pop_front() {
            neighbors.clear();
            surface.neighbors(vertex, &mut neighbors);
            for neighbor in &neighbors {
                let to = neighbor.vertex;
                if ids[to] == usize::MAX && surface.is_visible(to) {
                    ids[to] = next_id;
                    queue.push_back(to);
                }
            }
        }
        next_id += 1;
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_meshes;

    #[test]
    fn test_bridges_connect_islands_only() {
        let mesh = test_meshes::two_islands();
        let fake = FakeNeighbors::build(&mesh, 2.0);

        assert!(fake.pair_count() > 0);
        for vertex in 0..mesh.vertex_count() {
            if let Some(other) = fake.get(vertex) {
                assert_eq!(fake.get(other), Some(vertex));
                // Island A is vertices 0..4, island B is 4..8.
                assert_ne!(vertex < 4, other < 4);
            }
        }
    }

    #[test]
    fn test_bridges_respect_max_distance() {
        let mesh = test_meshes::two_islands();
        let fake = FakeNeighbors::build(&mesh, 0.1);
        assert_eq!(fake.pair_count(), 0);
        assert_eq!(fake.get(0), None);
    }

    #[test]
    fn test_connected_mesh_has_no_bridges() {
        let mesh = test_meshes::plane(4, 4, 0.1);
        let fake = FakeNeighbors::build(&mesh, 10.0);
        assert_eq!(fake.pair_count(), 0);
    }
}
