//! IK chain segments and their solvers.
//!
//! A chain is an ordered list of rigid segments. Segment 0 ends at the stroke
//! anchor and every further segment ends where the previous one starts, so
//! solving from the head of the chain drags the whole chain toward a target.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::brush::FalloffCurve;
use crate::composer::SegmentTransform;
use crate::symmetry::SYMMETRY_AREAS;

/// Smallest divisor magnitude, relative to the segment length, used when
/// deriving a scale from the grab delta.
const SCALE_DIVISOR_FLOOR: f32 = 1e-3;

/// One rigid link of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSegment {
    /// Current base position.
    pub orig: Vec3,
    /// Current tip position.
    pub head: Vec3,
    /// Base position when the chain was built.
    pub initial_orig: Vec3,
    /// Tip position when the chain was built.
    pub initial_head: Vec3,
    /// Rotation from the initial to the current orientation.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
    /// Influence per vertex, indexed by vertex.
    pub weights: Vec<f32>,
    length: f32,
    pub(crate) transforms: [SegmentTransform; SYMMETRY_AREAS],
}

impl Default for ChainSegment {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

impl ChainSegment {
    /// A segment at rest between `orig` and `head`.
    pub fn new(orig: Vec3, head: Vec3) -> Self {
        Self {
            orig,
            head,
            initial_orig: orig,
            initial_head: head,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            weights: Vec::new(),
            length: orig.distance(head),
            transforms: [SegmentTransform::default(); SYMMETRY_AREAS],
        }
    }

    /// Rest length, fixed when the chain is built.
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Composed transforms, one per symmetry area.
    pub fn transforms(&self) -> &[SegmentTransform; SYMMETRY_AREAS] {
        &self.transforms
    }

    /// Normalized rest direction, origin to head.
    pub fn initial_direction(&self) -> Option<Vec3> {
        (self.initial_head - self.initial_orig).try_normalize()
    }
}

/// Ordered chain of segments driven by one stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct IkChain {
    pub segments: Vec<ChainSegment>,
    /// Offset from the stroke anchor to the chain's semantic head, added to
    /// rotation targets.
    pub grab_delta_offset: Vec3,
}

impl IkChain {
    /// A chain of `segment_count` collapsed segments with zero weights.
    pub fn new(segment_count: usize, vertex_count: usize) -> Self {
        let segments = (0..segment_count)
            .map(|_| ChainSegment {
                weights: vec![0.0; vertex_count],
                ..Default::default()
            })
            .collect();
        Self {
            segments,
            grab_delta_offset: Vec3::ZERO,
        }
    }

    /// Link the segments into a chain hanging from `initial_location`.
    ///
    /// Segment 0's head is the anchor; every later head is the previous
    /// segment's origin. This is the only place rest lengths are set.
    pub(crate) fn init_origin_heads(&mut self, initial_location: Vec3) {
        let mut head = initial_location;
        for segment in &mut self.segments {
            let orig = segment.orig;
            let weights = std::mem::take(&mut segment.weights);
            *segment = ChainSegment {
                weights,
                ..ChainSegment::new(orig, head)
            };
            head = orig;
        }
    }

    /// Point each segment at the running target, head first.
    ///
    /// Each segment keeps its length: it is rotated toward the target and then
    /// translated so its head lands on it. Its new origin becomes the next
    /// segment's target. With `use_anchor`, the whole chain is shifted back so
    /// the last origin stays where it started.
    pub fn solve_ik(&mut self, target: Vec3, use_anchor: bool) {
        let mut target = target;

        for segment in &mut self.segments {
            let Some(initial_dir) = segment.initial_direction() else {
                segment.rotation = Quat::IDENTITY;
                segment.orig = target;
                segment.head = target;
                continue;
            };

            let current_dir = (target - segment.orig)
                .try_normalize()
                .unwrap_or(segment.rotation * initial_dir);
            segment.rotation = Quat::from_rotation_arc(initial_dir, current_dir);

            let head = segment.orig + current_dir * segment.length;
            let offset = target - head;
            segment.orig += offset;
            segment.head = head + offset;

            target = segment.orig;
        }

        if use_anchor {
            if let Some(last) = self.segments.last() {
                let anchor_diff = last.initial_orig - last.orig;
                for segment in &mut self.segments {
                    segment.orig += anchor_diff;
                    segment.head += anchor_diff;
                }
            }
        }
    }

    /// Twist every segment around its rest axis.
    ///
    /// The roll is distributed along the chain with `falloff`.
    pub fn solve_roll(&mut self, roll: f32, falloff: FalloffCurve) {
        let count = self.segments.len();
        for (index, segment) in self.segments.iter_mut().enumerate() {
            let Some(axis) = segment.initial_direction() else {
                segment.rotation = Quat::IDENTITY;
                continue;
            };
            let current_roll = roll * falloff.segment_strength(index, count);
            let initial_rotation = Quat::from_axis_angle(axis, 0.0);
            let current_rotation = Quat::from_axis_angle(axis, current_roll);
            segment.rotation = current_rotation.inverse() * initial_rotation;
        }
    }

    /// Move every segment by `delta` from its rest pose, without rotation.
    pub fn solve_translate(&mut self, delta: Vec3) {
        for segment in &mut self.segments {
            segment.head = segment.initial_head + delta;
            segment.orig = segment.initial_orig + delta;
            segment.rotation = Quat::IDENTITY;
        }
    }

    /// Assign `scale` to every segment.
    pub fn solve_scale(&mut self, scale: Vec3) {
        for segment in &mut self.segments {
            segment.scale = scale;
        }
    }

    /// Scale factor that moves segment 0's head onto `target` along its axis.
    ///
    /// Computes `length / (length - d)`, `d` being the signed distance of the
    /// target to the plane through the rest head, normal to the rest axis.
    /// The divisor keeps a minimum magnitude of `length * 1e-3` so a target on
    /// the origin's plane yields a large finite scale.
    pub fn scale_from_grab_delta(&self, target: Vec3) -> f32 {
        let Some(segment) = self.segments.first() else {
            return 1.0;
        };
        let Some(direction) = segment.initial_direction() else {
            return 1.0;
        };
        let length = segment.length;
        if length <= 0.0 {
            return 1.0;
        }

        let distance = (target - segment.initial_head).dot(direction);
        let divisor = length - distance;
        let floor = (length * SCALE_DIVISOR_FLOOR).max(f32::EPSILON);
        if divisor.abs() < floor {
            debug!("scale_from_grab_delta: divisor {} clamped to {}", divisor, floor);
            return length / floor.copysign(divisor);
        }
        length / divisor
    }

    /// Rest pose summary for drawing.
    pub fn preview(&self) -> ChainPreview {
        ChainPreview {
            initial_head_coords: self.segments.iter().map(|s| s.initial_head).collect(),
            initial_orig_coords: self.segments.iter().map(|s| s.initial_orig).collect(),
        }
    }
}

/// Serializable rest pose of a chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainPreview {
    pub initial_head_coords: Vec<Vec3>,
    pub initial_orig_coords: Vec<Vec3>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chain hanging from `anchor` through the given origins.
    fn chain_through(anchor: Vec3, origins: &[Vec3]) -> IkChain {
        let mut chain = IkChain::new(origins.len(), 0);
        for (segment, &orig) in chain.segments.iter_mut().zip(origins) {
            segment.orig = orig;
        }
        chain.init_origin_heads(anchor);
        chain
    }

    fn three_segment_chain() -> IkChain {
        chain_through(
            Vec3::new(0.0, 0.0, 3.0),
            &[
                Vec3::new(0.0, 0.0, 2.0),
                Vec3::new(0.0, 0.5, 1.0),
                Vec3::new(0.0, 0.0, 0.0),
            ],
        )
    }

    #[test]
    fn test_init_origin_heads_links_segments() {
        let chain = three_segment_chain();
        assert_eq!(chain.segments[0].head, Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(chain.segments[1].head, chain.segments[0].orig);
        assert_eq!(chain.segments[2].head, chain.segments[1].orig);
        assert!((chain.segments[1].length() - 1.25f32.sqrt()).abs() < 1e-6);
        assert!(chain.segments.iter().all(|s| s.scale == Vec3::ONE));
    }

    #[test]
    fn test_single_segment_rotate() {
        let mut chain = chain_through(Vec3::new(0.0, 0.0, 1.0), &[Vec3::ZERO]);
        let target = Vec3::new(1.0, 0.0, 0.0);
        chain.solve_ik(target, false);

        let segment = &chain.segments[0];
        assert!((segment.head.distance(segment.orig) - 1.0).abs() < 1e-5);
        assert!((segment.orig - (target - segment.head)).length() < 1e-5);

        let rotated = segment.rotation * Vec3::Z;
        assert!((rotated - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_rotate_preserves_lengths() {
        let mut chain = three_segment_chain();
        let lengths: Vec<f32> = chain.segments.iter().map(|s| s.length()).collect();

        for target in [
            Vec3::new(2.0, 1.0, 3.0),
            Vec3::new(-4.0, 0.0, 0.5),
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(0.1, -0.3, 7.0),
        ] {
            for anchored in [false, true] {
                chain.solve_ik(target, anchored);
                for (segment, length) in chain.segments.iter().zip(&lengths) {
                    assert!((segment.head.distance(segment.orig) - length).abs() < 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_anchor_pins_last_origin() {
        let mut chain = three_segment_chain();
        chain.solve_ik(Vec3::new(3.0, -2.0, 1.0), true);

        let last = chain.segments.last().unwrap();
        assert!((last.orig - last.initial_orig).length() < 1e-5);
    }

    #[test]
    fn test_unanchored_chain_reaches_target() {
        let mut chain = three_segment_chain();
        let target = Vec3::new(3.0, -2.0, 1.0);
        chain.solve_ik(target, false);
        assert!((chain.segments[0].head - target).length() < 1e-5);
    }

    #[test]
    fn test_degenerate_segment_passes_target_through() {
        let mut chain = chain_through(Vec3::ZERO, &[Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0)]);
        let target = Vec3::new(0.0, 1.0, 0.0);
        chain.solve_ik(target, false);

        assert_eq!(chain.segments[0].rotation, Quat::IDENTITY);
        assert_eq!(chain.segments[0].orig, target);
        assert!((chain.segments[1].head - target).length() < 1e-5);
        assert!(chain.segments.iter().all(|s| s.rotation.is_finite()));
    }

    #[test]
    fn test_translate_with_zero_delta_is_rest_pose() {
        let mut chain = three_segment_chain();
        chain.solve_ik(Vec3::new(1.0, 1.0, 1.0), false);
        chain.solve_translate(Vec3::ZERO);

        for segment in &chain.segments {
            assert_eq!(segment.orig, segment.initial_orig);
            assert_eq!(segment.head, segment.initial_head);
            assert_eq!(segment.rotation, Quat::IDENTITY);
        }
    }

    #[test]
    fn test_roll_follows_falloff() {
        let mut chain = three_segment_chain();
        chain.solve_roll(0.9, FalloffCurve::Linear);

        let angles: Vec<f32> = chain
            .segments
            .iter()
            .map(|s| s.rotation.to_axis_angle().1)
            .collect();
        assert!((angles[0] - 0.9).abs() < 1e-4);
        assert!((angles[1] - 0.6).abs() < 1e-4);
        assert!((angles[2] - 0.3).abs() < 1e-4);

        // The twist axis is the segment's rest axis.
        let axis = chain.segments[0].rotation.to_axis_angle().0;
        let rest = chain.segments[0].initial_direction().unwrap();
        assert!(axis.cross(rest).length() < 1e-4);
    }

    #[test]
    fn test_scale_solve_is_verbatim() {
        let mut chain = three_segment_chain();
        let scale = Vec3::new(0.5, 2.0, 1.5);
        chain.solve_scale(scale);
        assert!(chain.segments.iter().all(|s| s.scale == scale));
        assert!(chain.segments.iter().all(|s| s.orig == s.initial_orig));
    }

    #[test]
    fn test_squash_stretch_scale_from_axis_grab() {
        // Segment from (0,0,0) to (0,0,2), anchored at its head.
        let chain = chain_through(Vec3::new(0.0, 0.0, 2.0), &[Vec3::ZERO]);
        let length = chain.segments[0].length();
        let axis = chain.segments[0].initial_direction().unwrap();

        for d in [0.5, -1.0, 1.5] {
            let target = chain.segments[0].initial_head + axis * d;
            let s = chain.scale_from_grab_delta(target);
            assert!((s - length / (length - d)).abs() < 1e-5);

            let squash = Vec3::new((1.0 / s).sqrt(), (1.0 / s).sqrt(), s);
            assert!((squash.x - (1.0 / squash.z).sqrt()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_scale_divisor_is_floored() {
        let chain = chain_through(Vec3::new(0.0, 0.0, 2.0), &[Vec3::ZERO]);
        let target = chain.segments[0].initial_head + Vec3::Z * 2.0;

        let s = chain.scale_from_grab_delta(target);
        assert!(s.is_finite());
        assert!((s - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_preview_lists_rest_pose() {
        let chain = three_segment_chain();
        let preview = chain.preview();
        assert_eq!(preview.initial_head_coords.len(), 3);
        assert_eq!(preview.initial_orig_coords[2], Vec3::ZERO);

        let json = serde_json::to_string(&preview).unwrap();
        let back: ChainPreview = serde_json::from_str(&json).unwrap();
        assert_eq!(back, preview);
    }
}
