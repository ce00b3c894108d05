//! Per-frame segment transform composition.
//!
//! Every segment gets one transform triple per symmetry area. A vertex in
//! area `a` is deformed by `pivot * trans * pivot_inv`, which applies the
//! segment's rotation and scale about its current origin, in its local frame.

use glam::{Mat4, Vec3};
use tracing::trace;

use crate::chain::IkChain;
use crate::symmetry::{flip_by_area, flip_quat_by_area, SymmetryArea, SymmetryFlags, SYMMETRY_AREAS};
use crate::types::PoseDeformType;

/// Transforms of one segment for one symmetry area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTransform {
    /// Rotation, scale and origin translation in pivot space.
    pub trans_mat: Mat4,
    /// Pivot space to world: the current origin plus the local basis.
    pub pivot_mat: Mat4,
    /// Exact inverse of `pivot_mat`.
    pub pivot_mat_inv: Mat4,
}

impl Default for SegmentTransform {
    fn default() -> Self {
        Self {
            trans_mat: Mat4::IDENTITY,
            pivot_mat: Mat4::IDENTITY,
            pivot_mat_inv: Mat4::IDENTITY,
        }
    }
}

impl SegmentTransform {
    /// Deform a point with this transform.
    pub fn apply(&self, point: Vec3) -> Vec3 {
        let local = self.pivot_mat_inv.transform_point3(point);
        let moved = self.trans_mat.transform_point3(local);
        self.pivot_mat.transform_point3(moved)
    }
}

/// Rebuild every segment's per-area transforms from its solved state.
///
/// `grab_location` is the stroke's original grab point; it decides which
/// side of each mirror plane is the unflipped one.
pub fn compose_transforms(
    chain: &mut IkChain,
    deform_type: PoseDeformType,
    symm: SymmetryFlags,
    grab_location: Vec3,
) {
    trace!("compose_transforms: {} segments", chain.segments.len());

    for area_index in 0..SYMMETRY_AREAS {
        let area = SymmetryArea::from_index(area_index);

        for segment in &mut chain.segments {
            let symm_rot = flip_quat_by_area(segment.rotation, symm, area, grab_location);
            let symm_orig = flip_by_area(segment.orig, symm, area, grab_location);
            let symm_initial_orig = flip_by_area(segment.initial_orig, symm, area, grab_location);

            let (rotation, pivot_local) = match deform_type {
                PoseDeformType::SquashStretch => {
                    let symm_head = flip_by_area(segment.head, symm, area, grab_location);
                    (Mat4::IDENTITY, align_pivot_local_space(symm_head - symm_orig))
                }
                _ => (Mat4::from_quat(symm_rot), Mat4::IDENTITY),
            };

            let trans_mat = rotation
                * Mat4::from_scale(segment.scale)
                * Mat4::from_translation(symm_orig - symm_initial_orig);
            let pivot_mat = Mat4::from_translation(symm_orig) * pivot_local;

            segment.transforms[area_index] = SegmentTransform {
                trans_mat,
                pivot_mat,
                pivot_mat_inv: pivot_mat.inverse(),
            };
        }
    }
}

/// Local basis whose Z axis follows the segment direction.
fn align_pivot_local_space(direction: Vec3) -> Mat4 {
    let Some(z) = direction.try_normalize() else {
        return Mat4::IDENTITY;
    };
    let (x, y) = z.any_orthonormal_pair();
    Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), Vec3::ZERO.extend(1.0))
}
