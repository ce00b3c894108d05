//! Core pose brush types.
//!
//! Enumerations shared between chain construction, the solvers and the
//! deformation pass. They are plain `Copy` values so brush configurations can
//! be serialized and compared cheaply.

use serde::{Deserialize, Serialize};

/// How the chain reacts to the grab delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PoseDeformType {
    /// Rotate the chain toward the grab target; twist around the segment
    /// axis when the stroke is inverted.
    #[default]
    RotateTwist = 0,
    /// Uniformly scale the chain; translate it when the stroke is inverted.
    ScaleTranslate = 1,
    /// Scale along the segment axis while preserving volume.
    SquashStretch = 2,
}

impl PoseDeformType {
    /// Whether this mode scales segments (and therefore supports a single
    /// segment only).
    pub fn is_scaling(&self) -> bool {
        matches!(self, Self::ScaleTranslate | Self::SquashStretch)
    }
}

/// Strategy used to place segment origins when the chain is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PoseOriginType {
    /// Grow the influence field over the topology, one segment per step.
    #[default]
    Topology = 0,
    /// One segment per traversed face set.
    FaceSets = 1,
    /// Single segment pivoting on the face set boundary next to the active
    /// face set (forward kinematics).
    FaceSetsFk = 2,
}

/// Where the deformation result is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeformTarget {
    /// Write directly into the surface positions.
    #[default]
    Geometry = 0,
    /// Write into the cloth simulation deformation target.
    ClothSim = 1,
}

/// Storage layout behind a sculpt surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceKind {
    /// Indexed polygon mesh.
    Mesh,
    /// Multiresolution subdivision grids.
    Grids,
    /// Dynamic topology mesh with stable vertex slots.
    Dynamic,
}
