//! Ring-by-ring growth of the pose factor field.
//!
//! Each ring raises every visible vertex to the largest factor among its
//! neighbors, reading only the previous ring's values. The centroid of the
//! newly grown vertices on the stroke's side of the mirror planes drives the
//! stop criterion.

use std::ops::Add;

use glam::Vec3;
use rayon::prelude::*;
use tracing::trace;

use crate::fake_neighbors::FakeNeighbors;
use crate::surface::{collect_neighbors, Batch, Neighbor, SculptSurface};
use crate::symmetry::{is_in_pivot_symmetry, SymmetryFlags};

/// When growth stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrowMode {
    /// Grow while the ring centroid keeps approaching the target; used to
    /// compensate the pose origin offset.
    Origin,
    /// Grow while the ring centroid stays closer than `max_len` to the
    /// target; used to find the next segment origin.
    Distance { max_len: f32 },
}

/// Result of a growth run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowOutcome {
    /// Reported origin
    pub origin: Vec3,
    /// Accepted rings
    pub rings: usize,
}

/// Centroid accumulator, joined by summation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CentroidSum {
    sum: Vec3,
    count: usize,
}

impl Add for CentroidSum {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }
}

impl CentroidSum {
    fn centroid(&self) -> Option<Vec3> {
        (self.count > 0).then(|| self.sum / self.count as f32)
    }
}

#[derive(Debug, Default)]
struct RingBatch {
    writes: Vec<(usize, f32)>,
    centroid: CentroidSum,
}

/// Grow `factor` outward from its current support.
///
/// Growth that overshoots is rolled back to the last accepted ring. A ring
/// with no eligible grown vertex ends growth and reports `target` unchanged.
pub fn grow_pose_factor<S: SculptSurface + ?Sized>(
    surface: &S,
    fake_neighbors: Option<&FakeNeighbors>,
    symm: SymmetryFlags,
    target: Vec3,
    mode: GrowMode,
    factor: &mut [f32],
) -> GrowOutcome {
    let mut prev = factor.to_vec();
    let mut prev_len = f32::MAX;
    let mut prev_centroid = None;
    let mut rings = 0;

    loop {
        prev.copy_from_slice(factor);

        let batches: Vec<RingBatch> = surface
            .batches()
            .par_iter()
            .map_init(Vec::new, |neighbors, batch| {
                grow_batch(surface, fake_neighbors, symm, target, &prev, batch, neighbors)
            })
            .collect();

        let mut centroid = CentroidSum::default();
        for batch in batches {
            for (vertex, value) in batch.writes {
                factor[vertex] = value;
            }
            centroid = centroid + batch.centroid;
        }

        let Some(centroid) = centroid.centroid() else {
            trace!("Pose factor growth exhausted after {} rings", rings);
            return GrowOutcome { origin: target, rings };
        };

        let len = centroid.distance(target);
        let keep_growing = match mode {
            GrowMode::Origin => len < prev_len,
            GrowMode::Distance { max_len } => len < max_len,
        };
        trace!("Grow ring {}: centroid {:?}, distance {}", rings + 1, centroid, len);

        if keep_growing {
            prev_len = len;
            prev_centroid = Some(centroid);
            rings += 1;
            continue;
        }

        factor.copy_from_slice(&prev);
        let origin = match mode {
            GrowMode::Origin => prev_centroid.unwrap_or(target),
            // A first ring already past the length still has to give the
            // segment a non-zero extent.
            GrowMode::Distance { .. } => prev_centroid.unwrap_or(centroid),
        };
        return GrowOutcome { origin, rings };
    }
}

fn grow_batch<S: SculptSurface + ?Sized>(
    surface: &S,
    fake_neighbors: Option<&FakeNeighbors>,
    symm: SymmetryFlags,
    target: Vec3,
    prev: &[f32],
    batch: &Batch,
    neighbors: &mut Vec<Neighbor>,
) -> RingBatch {
    let mut result = RingBatch::default();

    for &vertex in batch.vertices() {
        if !surface.is_visible(vertex) {
            continue;
        }
        collect_neighbors(surface, fake_neighbors, vertex, neighbors);
        let max = neighbors
            .iter()
            .map(|n| prev[n.vertex])
            .fold(0.0f32, f32::max);

        if max > prev[vertex] {
            result.writes.push((vertex, max));
            let position = surface.position(vertex);
            if is_in_pivot_symmetry(position, target, symm) {
                result.centroid.sum += position;
                result.centroid.count += 1;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_meshes;

    #[test]
    fn test_distance_mode_stops_before_max_length() {
        let mesh = test_meshes::line(5, 1.0);
        let mut factor = vec![1.0, 0.0, 0.0, 0.0, 0.0];

        let outcome = grow_pose_factor(
            &mesh,
            None,
            SymmetryFlags::empty(),
            Vec3::ZERO,
            GrowMode::Distance { max_len: 2.0 },
            &mut factor,
        );

        // Ring two reaches distance 2 and is rolled back.
        assert_eq!(outcome.origin, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(outcome.rings, 1);
        assert_eq!(factor, vec![1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_distance_mode_first_ring_overshoot() {
        let mesh = test_meshes::line(5, 1.0);
        let mut factor = vec![1.0, 0.0, 0.0, 0.0, 0.0];

        let outcome = grow_pose_factor(
            &mesh,
            None,
            SymmetryFlags::empty(),
            Vec3::ZERO,
            GrowMode::Distance { max_len: 0.5 },
            &mut factor,
        );

        assert_eq!(outcome.origin, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(outcome.rings, 0);
        assert_eq!(factor, vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_exhausted_growth_reports_target() {
        let mesh = test_meshes::line(3, 1.0);
        let mut factor = vec![1.0, 0.0, 0.0];
        let target = Vec3::new(-5.0, 0.0, 0.0);

        let outcome = grow_pose_factor(
            &mesh,
            None,
            SymmetryFlags::empty(),
            target,
            GrowMode::Distance { max_len: 100.0 },
            &mut factor,
        );

        assert_eq!(outcome.origin, target);
        assert_eq!(outcome.rings, 2);
        assert_eq!(factor, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_origin_mode_stops_at_closest_approach() {
        let mesh = test_meshes::line(5, 1.0);
        let mut factor = vec![1.0, 0.0, 0.0, 0.0, 0.0];
        let origin = Vec3::new(2.0, 0.0, 0.0);

        let outcome = grow_pose_factor(
            &mesh,
            None,
            SymmetryFlags::empty(),
            origin,
            GrowMode::Origin,
            &mut factor,
        );

        // Centroids 1, 2, 3: the third ring moves away again.
        assert_eq!(outcome.origin, origin);
        assert_eq!(outcome.rings, 2);
        assert_eq!(factor, vec![1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_growth_follows_fake_neighbors() {
        let mesh = test_meshes::two_islands();
        let fake = FakeNeighbors::build(&mesh, 2.0);
        let mut factor = vec![0.0; mesh.vertex_count()];
        factor[0] = 1.0;

        grow_pose_factor(
            &mesh,
            Some(&fake),
            SymmetryFlags::empty(),
            Vec3::ZERO,
            GrowMode::Distance { max_len: 100.0 },
            &mut factor,
        );
        assert!(factor.iter().all(|&f| f == 1.0));
    }

    #[test]
    fn test_centroid_sum_join_is_commutative() {
        let a = CentroidSum {
            sum: Vec3::new(1.0, 2.0, 3.0),
            count: 2,
        };
        let b = CentroidSum {
            sum: Vec3::new(-1.0, 0.5, 0.0),
            count: 1,
        };
        assert_eq!(a + b, b + a);
        assert_eq!((a + b).centroid(), Some(Vec3::new(0.0, 2.5, 3.0) / 3.0));
        assert_eq!(CentroidSum::default().centroid(), None);
    }
}
