//! Pose brush configuration and falloff evaluation.
//!
//! [`PoseBrushConfig`] carries every brush setting the chain builder, the
//! solvers and the deformation pass read. Presets mirror the common pose
//! brush setups.

use serde::{Deserialize, Serialize};

#[cfg(feature = "bevy")]
use bevy::prelude::Resource;

use crate::types::{DeformTarget, PoseDeformType, PoseOriginType};

/// Falloff curve for brush influence.
///
/// Determines how strength decreases from center to edge. The pose brush
/// also evaluates it along the chain to distribute twist between segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FalloffCurve {
    /// Linear falloff: strength = 1 - distance/radius
    #[default]
    Linear = 0,
    /// Smooth falloff: hermite interpolation
    Smooth = 1,
    /// Sharp falloff: quadratic decay
    Sharp = 2,
    /// Constant: full strength within radius
    Constant = 3,
    /// Sphere: spherical falloff (sqrt-based)
    Sphere = 4,
}

impl FalloffCurve {
    /// Calculate falloff strength at a given normalized distance (0.0 = center, 1.0 = edge).
    pub fn evaluate(&self, normalized_distance: f32) -> f32 {
        let d = normalized_distance.clamp(0.0, 1.0);
        match self {
            FalloffCurve::Linear => 1.0 - d,
            FalloffCurve::Smooth => {
                // Hermite smoothstep of t = 1 - d: 3t² - 2t³
                let t = 1.0 - d;
                t * t * (3.0 - 2.0 * t)
            }
            FalloffCurve::Sharp => {
                let t = 1.0 - d;
                t * t
            }
            FalloffCurve::Constant => 1.0,
            FalloffCurve::Sphere => (1.0 - d * d).max(0.0).sqrt(),
        }
    }

    /// Strength for segment `index` of a chain with `count` segments.
    ///
    /// The first segment gets full strength; indices past the end get none.
    pub fn segment_strength(&self, index: usize, count: usize) -> f32 {
        if index >= count {
            return 0.0;
        }
        self.evaluate(index as f32 / count as f32)
    }
}

/// Pose brush settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "bevy", derive(Resource))]
#[serde(default)]
pub struct PoseBrushConfig {
    /// Display name
    pub name: String,
    /// How the grab delta deforms the chain
    pub deform_type: PoseDeformType,
    /// How segment origins are found
    pub origin_type: PoseOriginType,
    /// Requested number of IK segments (default: 1)
    pub ik_segments: usize,
    /// Origin offset as a fraction of the brush radius (default: 0.0)
    pub pose_offset: f32,
    /// Neighbor-averaging passes applied to segment weights (default: 4)
    pub smooth_iterations: usize,
    /// Keep the last segment's origin pinned while solving (default: false)
    pub use_ik_anchored: bool,
    /// Only follow mesh connectivity; when false, disconnected islands are
    /// bridged with fake neighbors (default: true)
    pub use_connected_only: bool,
    /// Skip the rotation solve in scale mode (default: false)
    pub lock_rotation: bool,
    /// Maximum bridge length between disconnected islands (default: 0.1)
    pub disconnected_distance_max: f32,
    /// Where the deformation is written (default: geometry)
    pub deform_target: DeformTarget,
    /// Curve used to distribute twist along the chain
    pub falloff: FalloffCurve,
}

impl Default for PoseBrushConfig {
    fn default() -> Self {
        Self {
            name: "Pose".to_string(),
            deform_type: PoseDeformType::RotateTwist,
            origin_type: PoseOriginType::Topology,
            ik_segments: 1,
            pose_offset: 0.0,
            smooth_iterations: 4,
            use_ik_anchored: false,
            use_connected_only: true,
            lock_rotation: false,
            disconnected_distance_max: 0.1,
            deform_target: DeformTarget::Geometry,
            falloff: FalloffCurve::Smooth,
        }
    }
}

impl PoseBrushConfig {
    /// Create a multi-segment rotate/twist preset.
    pub fn rotate(segments: usize) -> Self {
        Self {
            name: "Pose Rotate".to_string(),
            ik_segments: segments.max(1),
            ..Default::default()
        }
    }

    /// Create a scale/translate preset.
    pub fn scale_translate() -> Self {
        Self {
            name: "Pose Scale".to_string(),
            deform_type: PoseDeformType::ScaleTranslate,
            ..Default::default()
        }
    }

    /// Create a squash/stretch preset.
    pub fn squash_stretch() -> Self {
        Self {
            name: "Pose Squash".to_string(),
            deform_type: PoseDeformType::SquashStretch,
            ..Default::default()
        }
    }

    /// Create a face set driven preset.
    pub fn face_sets(segments: usize) -> Self {
        Self {
            name: "Pose Face Sets".to_string(),
            origin_type: PoseOriginType::FaceSets,
            ik_segments: segments.max(1),
            smooth_iterations: 0,
            ..Default::default()
        }
    }

    /// Create a face set forward kinematics preset.
    pub fn face_sets_fk() -> Self {
        Self {
            name: "Pose Face Sets FK".to_string(),
            origin_type: PoseOriginType::FaceSetsFk,
            ..Default::default()
        }
    }

    /// Number of segments the chain will actually have.
    ///
    /// Scaling several segments at once is not supported: the solver can't
    /// accommodate length changes along the chain.
    pub fn effective_segments(&self) -> usize {
        if self.deform_type.is_scaling() {
            return 1;
        }
        self.ik_segments.max(1)
    }
}
