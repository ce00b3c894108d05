//! Scalar field smoothing.

use rayon::prelude::*;

use crate::surface::{Neighbor, SculptSurface};

/// Blur a per-vertex scalar field by neighbor averaging.
///
/// Every iteration reads the previous iteration's values, so the result does
/// not depend on batch order. Hidden vertices and vertices without visible
/// neighbors keep their value.
pub fn smooth_weights<S: SculptSurface + ?Sized>(surface: &S, weights: &mut [f32], iterations: usize) {
    for _ in 0..iterations {
        let snapshot: &[f32] = weights;
        let updates: Vec<Vec<(usize, f32)>> = surface
            .batches()
            .par_iter()
            .map_init(Vec::<Neighbor>::new, |neighbors, batch| {
                batch
                    .vertices()
                    .iter()
                    .copied()
                    .filter(|&v| surface.is_visible(v))
                    .filter_map(|v| {
                        neighbors.clear();
                        surface.neighbors(v, neighbors);
                        let (sum, count) = neighbors
                            .iter()
                            .filter(|n| surface.is_visible(n.vertex))
                            .fold((0.0, 0usize), |(sum, count), n| (sum + snapshot[n.vertex], count + 1));
                        (count > 0).then(|| (v, sum / count as f32))
                    })
                    .collect()
            })
            .collect();

        for (vertex, value) in updates.into_iter().flatten() {
            weights[vertex] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_meshes;

    #[test]
    fn test_zero_iterations_is_identity() {
        let mesh = test_meshes::line(5, 1.0);
        let mut weights = vec![1.0, 1.0, 0.0, 0.0, 0.0];
        smooth_weights(&mesh, &mut weights, 0);
        assert_eq!(weights, vec![1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_smoothing_softens_step() {
        let mesh = test_meshes::line(5, 1.0);
        let mut weights = vec![1.0, 1.0, 0.0, 0.0, 0.0];
        smooth_weights(&mesh, &mut weights, 1);

        // Averages of the previous values: (v1), (v0 + v2) / 2, ...
        assert_eq!(weights, vec![1.0, 0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_constant_field_is_stable() {
        let mesh = test_meshes::plane(4, 4, 1.0);
        let mut weights = vec![0.25; 16];
        smooth_weights(&mesh, &mut weights, 3);
        assert!(weights.iter().all(|&w| (w - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_hidden_vertices_keep_values() {
        let mut mesh = test_meshes::line(5, 1.0);
        mesh.set_vertex_hidden(1, true);
        let mut weights = vec![1.0, 1.0, 0.0, 0.0, 0.0];
        smooth_weights(&mesh, &mut weights, 1);

        assert_eq!(weights[1], 1.0);
        // Vertex 0 only neighbors the hidden vertex.
        assert_eq!(weights[0], 1.0);
        assert_eq!(weights[2], 0.0);
    }
}
