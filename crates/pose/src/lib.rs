//! Pose brush for Pentimento sculpting.
//!
//! The pose brush bends, twists and scales a whole region of a surface as if
//! it were driven by a chain of bones. This crate provides:
//! - IK chain construction from topology or face sets
//! - Chain solving for rotation, twist, translation and scale
//! - Weighted, symmetry-aware deformation of surface vertices
//!
//! # Architecture
//!
//! A stroke builds its chain once and then deforms every frame from the
//! positions captured at stroke start.
//!
//! ## Key Components
//!
//! - **Surface**: Adapter traits over indexed meshes, subdivision grids and
//!   dynamic meshes
//! - **Builder**: Chain construction (topology, face sets, face sets FK)
//! - **Grower**: Ring-by-ring growth of the pose factor field
//! - **Chain**: Segment storage and the IK, roll, translate and scale solvers
//! - **Composer**: Per-symmetry-area segment transforms
//! - **Deform**: Parallel weighted deformation
//! - **Pipeline**: Stroke lifecycle (begin, update, end)

pub mod automask;
pub mod brush;
pub mod builder;
pub mod chain;
pub mod composer;
pub mod deform;
pub mod fake_neighbors;
pub mod flood_fill;
pub mod grower;
pub mod pipeline;
pub mod smooth;
pub mod spatial;
pub mod surface;
pub mod symmetry;
pub mod types;

pub use automask::{AutomaskFactors, NoAutomasking};
pub use brush::{FalloffCurve, PoseBrushConfig};
pub use builder::{build_chain_preview, build_ik_chain, calc_pose_data, init_pose_brush, StrokeAnchor};
pub use chain::{ChainPreview, ChainSegment, IkChain};
pub use composer::{compose_transforms, SegmentTransform};
pub use deform::{apply_pose_deform, ClothDeformationTarget, DeformOutput, DeformStats};
pub use fake_neighbors::FakeNeighbors;
pub use flood_fill::FloodFill;
pub use grower::{grow_pose_factor, GrowMode, GrowOutcome};
pub use pipeline::{PoseError, PoseStroke, StrokeInput};
pub use smooth::smooth_weights;
pub use spatial::BatchConfig;
pub use surface::{
    Batch, DynamicMesh, FaceSets, IndexedMesh, Neighbor, SculptSurface, SubdivGrids,
    SurfaceError, FACE_SET_DEFAULT, FACE_SET_NONE,
};
pub use symmetry::SymmetryFlags;
pub use types::{DeformTarget, PoseDeformType, PoseOriginType, SurfaceKind};
