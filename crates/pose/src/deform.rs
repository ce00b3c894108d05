//! Weighted application of segment transforms to surface vertices.

use glam::Vec3;
use rayon::prelude::*;
use tracing::trace;

use crate::automask::AutomaskFactors;
use crate::chain::IkChain;
use crate::surface::{Batch, SculptSurface};
use crate::symmetry::SymmetryArea;

/// Cloth simulation deformation target.
///
/// The simulation pulls its particles toward these positions instead of the
/// brush moving the surface directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClothDeformationTarget {
    pub deformation_positions: Vec<Vec3>,
}

impl ClothDeformationTarget {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            deformation_positions: vec![Vec3::ZERO; vertex_count],
        }
    }

    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        Self {
            deformation_positions: positions,
        }
    }

    pub fn len(&self) -> usize {
        self.deformation_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deformation_positions.is_empty()
    }
}

/// Where deformed positions are written.
#[derive(Debug)]
pub enum DeformOutput<'a> {
    /// Live surface positions.
    Geometry,
    /// Cloth target buffer; the surface is left untouched.
    Cloth(&'a mut ClothDeformationTarget),
}

/// Summary of one deformation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeformStats {
    /// Batches processed.
    pub batches: usize,
    /// Vertices written.
    pub vertices: usize,
    /// Largest displacement from the original position.
    pub max_displacement: f32,
}

/// Per-task scratch storage reused across batches.
#[derive(Debug, Default)]
struct DeformScratch {
    factors: Vec<f32>,
    translations: Vec<Vec3>,
}

/// Deform every batched vertex by the chain's composed transforms.
///
/// Each vertex starts from its pre-stroke position in `orig_positions`. Its
/// displacement is the weighted sum of every segment's displacement, scaled
/// by `(1 - mask) * automask`, or zero for hidden vertices. The written
/// position is the original position plus that displacement, so vertices
/// without net influence return exactly to where the stroke found them.
/// Hidden vertices are written too, which keeps them at rest in a cloth
/// target.
pub fn apply_pose_deform<S, A>(
    surface: &mut S,
    chain: &IkChain,
    orig_positions: &[Vec3],
    automask: &A,
    output: DeformOutput<'_>,
) -> DeformStats
where
    S: SculptSurface + ?Sized,
    A: AutomaskFactors + ?Sized,
{
    let results: Vec<Vec<(usize, Vec3)>> = {
        let surface: &S = surface;
        surface
            .batches()
            .par_iter()
            .map_init(DeformScratch::default, |scratch, batch| {
                deform_batch(surface, chain, orig_positions, automask, batch, scratch)
            })
            .collect()
    };

    let mut stats = DeformStats {
        batches: results.len(),
        ..Default::default()
    };

    let writes = results.into_iter().flatten();
    match output {
        DeformOutput::Geometry => {
            for (vertex, position) in writes {
                stats.record(position.distance(orig_positions[vertex]));
                surface.set_position(vertex, position);
            }
        }
        DeformOutput::Cloth(target) => {
            for (vertex, position) in writes {
                stats.record(position.distance(orig_positions[vertex]));
                target.deformation_positions[vertex] = position;
            }
        }
    }

    trace!(
        "apply_pose_deform: {} vertices in {} batches, max displacement {}",
        stats.vertices,
        stats.batches,
        stats.max_displacement
    );
    stats
}

impl DeformStats {
    fn record(&mut self, displacement: f32) {
        self.vertices += 1;
        self.max_displacement = self.max_displacement.max(displacement);
    }
}

fn deform_batch<S, A>(
    surface: &S,
    chain: &IkChain,
    orig_positions: &[Vec3],
    automask: &A,
    batch: &Batch,
    scratch: &mut DeformScratch,
) -> Vec<(usize, Vec3)>
where
    S: SculptSurface + ?Sized,
    A: AutomaskFactors + ?Sized,
{
    let verts = batch.vertices();

    scratch.factors.clear();
    scratch.factors.extend(verts.iter().map(|&v| {
        let visibility = if surface.is_visible(v) {
            1.0 - surface.mask(v)
        } else {
            0.0
        };
        visibility * automask.factor(v)
    }));

    scratch.translations.clear();
    scratch.translations.resize(verts.len(), Vec3::ZERO);

    for segment in &chain.segments {
        for (i, &v) in verts.iter().enumerate() {
            let weight = segment.weights[v];
            if weight == 0.0 {
                continue;
            }
            let orig = orig_positions[v];
            let area = SymmetryArea::of(orig);
            let moved = segment.transforms()[area.index()].apply(orig);
            scratch.translations[i] += (moved - orig) * weight;
        }
    }

    verts
        .iter()
        .zip(scratch.factors.iter().zip(&scratch.translations))
        .map(|(&v, (&factor, &translation))| (v, orig_positions[v] + translation * factor))
        .collect()
}
