//! Mirror symmetry helpers.
//!
//! The pose brush applies every enabled mirror axis in a single pass. Each
//! vertex belongs to one of eight symmetry areas (the octant sign pattern of
//! its position) and every segment carries one transform per area.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Number of distinct symmetry areas (all sign combinations of X, Y and Z).
pub const SYMMETRY_AREAS: usize = 8;

bitflags! {
    /// Enabled mirror axes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SymmetryFlags: u8 {
        const X = 0b001;
        const Y = 0b010;
        const Z = 0b100;
    }
}

const AXES: [SymmetryFlags; 3] = [SymmetryFlags::X, SymmetryFlags::Y, SymmetryFlags::Z];

/// Octant a position falls into, one bit per negative coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SymmetryArea(SymmetryFlags);

impl SymmetryArea {
    /// Area of a position.
    pub fn of(position: Vec3) -> Self {
        let mut area = SymmetryFlags::empty();
        for (axis, flag) in AXES.into_iter().enumerate() {
            if position[axis] < 0.0 {
                area |= flag;
            }
        }
        Self(area)
    }

    /// Area from its index (`0..SYMMETRY_AREAS`).
    pub fn from_index(index: usize) -> Self {
        Self(SymmetryFlags::from_bits_truncate(index as u8))
    }

    /// Index into per-area arrays.
    pub fn index(&self) -> usize {
        self.0.bits() as usize
    }

    /// Mirrored axes of this area.
    pub fn flags(&self) -> SymmetryFlags {
        self.0
    }
}

/// Mirror `v` across every axis in `flags`.
pub fn symmetry_flip(v: Vec3, flags: SymmetryFlags) -> Vec3 {
    let mut flipped = v;
    for (axis, flag) in AXES.into_iter().enumerate() {
        if flags.contains(flag) {
            flipped[axis] = -flipped[axis];
        }
    }
    flipped
}

/// Mirror a rotation across every axis in `flags`.
///
/// Reflecting through the plane orthogonal to an axis keeps that axis'
/// quaternion component and negates the other two.
pub fn symmetry_flip_quat(q: Quat, flags: SymmetryFlags) -> Quat {
    let mut flipped = q;
    if flags.contains(SymmetryFlags::X) {
        flipped = Quat::from_xyzw(flipped.x, -flipped.y, -flipped.z, flipped.w);
    }
    if flags.contains(SymmetryFlags::Y) {
        flipped = Quat::from_xyzw(-flipped.x, flipped.y, -flipped.z, flipped.w);
    }
    if flags.contains(SymmetryFlags::Z) {
        flipped = Quat::from_xyzw(-flipped.x, -flipped.y, flipped.z, flipped.w);
    }
    flipped
}

/// Move a position into `area`, relative to the side of `pivot` the stroke
/// started on.
pub fn flip_by_area(v: Vec3, symm: SymmetryFlags, area: SymmetryArea, pivot: Vec3) -> Vec3 {
    let mut result = v;
    for (axis, flag) in AXES.into_iter().enumerate() {
        if !symm.contains(flag) {
            continue;
        }
        if area.flags().contains(flag) {
            result = symmetry_flip(result, flag);
        }
        if pivot[axis] < 0.0 {
            result = symmetry_flip(result, flag);
        }
    }
    result
}

/// Rotation counterpart of [`flip_by_area`].
pub fn flip_quat_by_area(q: Quat, symm: SymmetryFlags, area: SymmetryArea, pivot: Vec3) -> Quat {
    let mut result = q;
    for (axis, flag) in AXES.into_iter().enumerate() {
        if !symm.contains(flag) {
            continue;
        }
        if area.flags().contains(flag) {
            result = symmetry_flip_quat(result, flag);
        }
        if pivot[axis] < 0.0 {
            result = symmetry_flip_quat(result, flag);
        }
    }
    result
}

/// Whether `vertex` lies in the same mirror wedge as `pivot`.
///
/// Vertices on the far side of any enabled mirror plane are excluded, so
/// centroids computed over a symmetric surface stay on the stroke's side.
pub fn is_in_pivot_symmetry(vertex: Vec3, pivot: Vec3, symm: SymmetryFlags) -> bool {
    for (axis, flag) in AXES.into_iter().enumerate() {
        if !symm.contains(flag) {
            continue;
        }
        if pivot[axis] == 0.0 && vertex[axis] > 0.0 {
            return false;
        }
        if vertex[axis] * pivot[axis] < 0.0 {
            return false;
        }
    }
    true
}

/// Whether mirror pass `pass` must run for `symm`.
///
/// Pass 0 is the unmirrored stroke. Combined passes are skipped when one of
/// their axes is disabled.
pub fn is_pass_valid(pass: u8, symm: SymmetryFlags) -> bool {
    pass == 0 || (symm.bits() & pass) == pass
}

/// Mirror passes enabled by `symm`, starting with the unmirrored pass.
pub fn symmetry_passes(symm: SymmetryFlags) -> impl Iterator<Item = SymmetryFlags> {
    (0..=symm.bits())
        .filter(move |&pass| is_pass_valid(pass, symm))
        .map(SymmetryFlags::from_bits_truncate)
}

/// Whether `vertex` is within `radius` of `center` or any of its mirrored copies.
pub fn is_inside_radius_symmetric(vertex: Vec3, center: Vec3, radius: f32, symm: SymmetryFlags) -> bool {
    symmetry_passes(symm).any(|pass| symmetry_flip(center, pass).distance(vertex) < radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_of_position() {
        assert_eq!(SymmetryArea::of(Vec3::new(1.0, 1.0, 1.0)).index(), 0);
        assert_eq!(SymmetryArea::of(Vec3::new(-1.0, 1.0, 1.0)).index(), 1);
        assert_eq!(SymmetryArea::of(Vec3::new(-1.0, -1.0, -1.0)).index(), 7);
        assert_eq!(SymmetryArea::from_index(5).index(), 5);
    }

    #[test]
    fn test_flip_by_area_respects_enabled_axes() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let area = SymmetryArea::from_index(0b011);

        let flipped = flip_by_area(v, SymmetryFlags::X, area, Vec3::ONE);
        assert_eq!(flipped, Vec3::new(-1.0, 2.0, 3.0));

        let flipped = flip_by_area(v, SymmetryFlags::X | SymmetryFlags::Y, area, Vec3::ONE);
        assert_eq!(flipped, Vec3::new(-1.0, -2.0, 3.0));

        // Starting on the negative side cancels the area flip.
        let flipped = flip_by_area(v, SymmetryFlags::X, area, Vec3::new(-1.0, 1.0, 1.0));
        assert_eq!(flipped, v);
    }

    #[test]
    fn test_flip_quat_mirrors_rotation() {
        let q = Quat::from_rotation_y(0.7);
        let mirrored = symmetry_flip_quat(q, SymmetryFlags::X);

        let p = Vec3::new(0.3, 0.5, 0.9);
        let expected = symmetry_flip(q * symmetry_flip(p, SymmetryFlags::X), SymmetryFlags::X);
        assert!((mirrored * p - expected).length() < 1e-5);
    }

    #[test]
    fn test_pivot_symmetry_wedge() {
        let symm = SymmetryFlags::X;
        assert!(is_in_pivot_symmetry(Vec3::new(0.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), symm));
        assert!(!is_in_pivot_symmetry(Vec3::new(-0.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), symm));
        // Without symmetry everything is eligible.
        assert!(is_in_pivot_symmetry(
            Vec3::new(-0.5, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            SymmetryFlags::empty()
        ));
    }

    #[test]
    fn test_symmetry_passes() {
        let passes: Vec<u8> = symmetry_passes(SymmetryFlags::X | SymmetryFlags::Z)
            .map(|p| p.bits())
            .collect();
        assert_eq!(passes, vec![0, 1, 4, 5]);

        let passes: Vec<u8> = symmetry_passes(SymmetryFlags::empty()).map(|p| p.bits()).collect();
        assert_eq!(passes, vec![0]);
    }

    #[test]
    fn test_inside_radius_symmetric() {
        let center = Vec3::new(1.0, 0.0, 0.0);
        let mirrored = Vec3::new(-1.0, 0.0, 0.0);
        assert!(!is_inside_radius_symmetric(mirrored, center, 0.5, SymmetryFlags::empty()));
        assert!(is_inside_radius_symmetric(mirrored, center, 0.5, SymmetryFlags::X));
    }
}
