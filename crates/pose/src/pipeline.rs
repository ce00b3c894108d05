//! Pose stroke orchestration.
//!
//! A stroke builds the chain once in [`PoseStroke::begin`], then every
//! [`PoseStroke::update`] runs:
//! 1. Deform mode dispatch: solve the chain for the grab delta or twist
//! 2. Transform composition per segment and symmetry area
//! 3. Weighted deformation of the surface or the cloth target
//!
//! Each update deforms from the positions captured at stroke start, so
//! replaying the same input always yields the same result.

use glam::{Vec2, Vec3};
use tracing::{debug, trace};

use crate::automask::AutomaskFactors;
use crate::brush::PoseBrushConfig;
use crate::builder::{init_pose_brush, StrokeAnchor};
use crate::chain::IkChain;
use crate::composer::compose_transforms;
use crate::deform::{apply_pose_deform, ClothDeformationTarget, DeformOutput, DeformStats};
use crate::surface::{FaceSets, SculptSurface};
use crate::types::{DeformTarget, PoseDeformType};

/// Mouse travel to twist angle, in radians per pixel at full strength.
const TWIST_RADIANS_PER_PIXEL: f32 = 0.02;

/// Errors raised by a pose stroke.
#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Active vertex {index} is out of range for a surface with {count} vertices")]
    InvalidVertex { index: usize, count: usize },
    #[error("Surface has no vertices")]
    EmptySurface,
    #[error("Surface vertex count changed during the stroke: expected {expected}, got {actual}")]
    VertexCountChanged { expected: usize, actual: usize },
    #[error("Brush deforms the cloth target, but none was provided")]
    MissingClothTarget,
    #[error("Cloth target has {actual} positions, expected {expected}")]
    ClothTargetSize { expected: usize, actual: usize },
}

/// Input for one stroke update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeInput {
    /// Displacement of the cursor from the stroke anchor, in object space.
    pub grab_delta: Vec3,
    /// Cursor position in screen pixels.
    pub mouse: Vec2,
    /// Use the alternate behavior of the deform mode (twist or translate).
    pub invert: bool,
    /// Brush strength.
    pub strength: f32,
}

impl StrokeInput {
    pub fn new(grab_delta: Vec3, mouse: Vec2) -> Self {
        Self {
            grab_delta,
            mouse,
            invert: false,
            strength: 1.0,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

/// An active pose stroke.
#[derive(Debug)]
pub struct PoseStroke {
    config: PoseBrushConfig,
    anchor: StrokeAnchor,
    chain: IkChain,
    initial_mouse: Vec2,
    orig_positions: Vec<Vec3>,
}

impl PoseStroke {
    /// Begin a stroke at `anchor`.
    ///
    /// Builds the chain, smooths its weights and snapshots the surface
    /// positions every update deforms from.
    pub fn begin<S>(
        surface: &S,
        config: PoseBrushConfig,
        anchor: StrokeAnchor,
        initial_mouse: Vec2,
    ) -> Result<Self, PoseError>
    where
        S: SculptSurface + FaceSets + ?Sized,
    {
        let count = surface.vertex_count();
        if count == 0 {
            return Err(PoseError::EmptySurface);
        }
        if anchor.active_vertex >= count {
            return Err(PoseError::InvalidVertex {
                index: anchor.active_vertex,
                count,
            });
        }

        debug!(
            "PoseStroke::begin: START vertex={} location={:?} radius={}",
            anchor.active_vertex, anchor.location, anchor.radius
        );
        let chain = init_pose_brush(surface, &config, &anchor);
        debug!("PoseStroke::begin: chain ready with {} segments", chain.segments.len());

        Ok(Self {
            config,
            anchor,
            chain,
            initial_mouse,
            orig_positions: surface.positions(),
        })
    }

    /// Solve the chain for `input` and deform.
    ///
    /// `cloth` is required when the brush writes to the cloth target and is
    /// ignored otherwise.
    pub fn update<S, A>(
        &mut self,
        surface: &mut S,
        input: &StrokeInput,
        automask: &A,
        cloth: Option<&mut ClothDeformationTarget>,
    ) -> Result<DeformStats, PoseError>
    where
        S: SculptSurface + ?Sized,
        A: AutomaskFactors + ?Sized,
    {
        let expected = self.orig_positions.len();
        let actual = surface.vertex_count();
        if actual != expected {
            return Err(PoseError::VertexCountChanged { expected, actual });
        }

        let output = match self.config.deform_target {
            DeformTarget::Geometry => DeformOutput::Geometry,
            DeformTarget::ClothSim => {
                let cloth = cloth.ok_or(PoseError::MissingClothTarget)?;
                if cloth.len() != expected {
                    return Err(PoseError::ClothTargetSize {
                        expected,
                        actual: cloth.len(),
                    });
                }
                DeformOutput::Cloth(cloth)
            }
        };

        trace!("PoseStroke::update: grab_delta={:?} invert={}", input.grab_delta, input.invert);
        self.solve(input);
        compose_transforms(
            &mut self.chain,
            self.config.deform_type,
            self.anchor.symm,
            self.anchor.location,
        );

        Ok(apply_pose_deform(
            surface,
            &self.chain,
            &self.orig_positions,
            automask,
            output,
        ))
    }

    fn solve(&mut self, input: &StrokeInput) {
        let location = self.anchor.location;
        let anchored = self.config.use_ik_anchored;
        let chain = &mut self.chain;

        match (self.config.deform_type, input.invert) {
            (PoseDeformType::RotateTwist, false) => {
                let target = location + input.grab_delta + chain.grab_delta_offset;
                chain.solve_ik(target, anchored);
            }
            (PoseDeformType::RotateTwist, true) => {
                let roll =
                    (self.initial_mouse.x - input.mouse.x) * input.strength * TWIST_RADIANS_PER_PIXEL;
                chain.solve_roll(roll, self.config.falloff);
            }
            (PoseDeformType::ScaleTranslate, true) => {
                chain.solve_translate(input.grab_delta);
            }
            (PoseDeformType::ScaleTranslate, false) => {
                let target = location + input.grab_delta;
                if !self.config.lock_rotation {
                    chain.solve_ik(target, anchored);
                }
                let scale = chain.scale_from_grab_delta(target);
                chain.solve_scale(Vec3::splat(scale));
            }
            (PoseDeformType::SquashStretch, _) => {
                // The segment stays at rest; only its scale follows the grab.
                let target = location + input.grab_delta;
                let stretch = chain.scale_from_grab_delta(target);
                let squash = (1.0 / stretch.abs()).sqrt();
                chain.solve_scale(Vec3::new(squash, squash, stretch));
            }
        }
    }

    /// Write the pre-stroke positions back to the surface.
    pub fn cancel<S: SculptSurface + ?Sized>(self, surface: &mut S) -> Result<(), PoseError> {
        let expected = self.orig_positions.len();
        let actual = surface.vertex_count();
        if actual != expected {
            return Err(PoseError::VertexCountChanged { expected, actual });
        }
        for (vertex, &position) in self.orig_positions.iter().enumerate() {
            surface.set_position(vertex, position);
        }
        Ok(())
    }

    /// End the stroke and hand back its chain.
    pub fn end(self) -> IkChain {
        debug!("PoseStroke::end: {} segments", self.chain.segments.len());
        self.chain
    }

    pub fn chain(&self) -> &IkChain {
        &self.chain
    }

    pub fn config(&self) -> &PoseBrushConfig {
        &self.config
    }

    pub fn anchor(&self) -> &StrokeAnchor {
        &self.anchor
    }

    /// Positions captured when the stroke began.
    pub fn orig_positions(&self) -> &[Vec3] {
        &self.orig_positions
    }
}
