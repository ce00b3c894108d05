//! IK chain construction.
//!
//! The chain is built once when a stroke starts. Three strategies place the
//! segment origins and weights:
//!
//! - Topology: grow the pose factor ring by ring, one segment per step
//! - Face sets: one segment per face set crossed from the active vertex
//! - Face sets FK: a single segment pivoting on the boundary between the
//!   active face set and its neighbor
//!
//! All of them link the segments into a chain hanging from the stroke anchor
//! at the end. Weight smoothing runs only after that.

use std::collections::HashSet;

use glam::Vec3;
use tracing::{debug, warn};

use crate::brush::PoseBrushConfig;
use crate::chain::{ChainPreview, IkChain};
use crate::fake_neighbors::FakeNeighbors;
use crate::flood_fill::FloodFill;
use crate::grower::{grow_pose_factor, GrowMode};
use crate::smooth::smooth_weights;
use crate::surface::{collect_neighbors, nearest_vertex, FaceSets, Neighbor, SculptSurface, FACE_SET_NONE};
use crate::symmetry::{is_in_pivot_symmetry, is_inside_radius_symmetric, SymmetryFlags};
use crate::types::PoseOriginType;

/// Where and how large the stroke starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeAnchor {
    /// Vertex under the cursor.
    pub active_vertex: usize,
    /// Stroke location on the surface.
    pub location: Vec3,
    /// Brush radius in object space.
    pub radius: f32,
    /// Enabled mirror axes.
    pub symm: SymmetryFlags,
}

/// Running centroid.
#[derive(Debug, Clone, Copy, Default)]
struct Centroid {
    sum: Vec3,
    count: usize,
}

impl Centroid {
    fn add(&mut self, position: Vec3) {
        self.sum += position;
        self.count += 1;
    }

    fn get(&self) -> Option<Vec3> {
        (self.count > 0).then(|| self.sum / self.count as f32)
    }
}

/// Pose origin and factor for the region around the active vertex.
///
/// Floods from the active vertex through everything within `radius` of the
/// stroke location (or a mirrored copy of it). The origin is the centroid of
/// the first vertices outside the radius, falling back to the vertex farthest
/// from the location. It is then pushed outward by `pose_offset * radius`.
///
/// When `factor` is given every reached vertex gets factor 1, and a non-zero
/// offset grows the factor until it is centered on the shifted origin.
pub fn calc_pose_data<S: SculptSurface + ?Sized>(
    surface: &S,
    fake_neighbors: Option<&FakeNeighbors>,
    anchor: &StrokeAnchor,
    pose_offset: f32,
    mut factor: Option<&mut [f32]>,
) -> Vec3 {
    let location = anchor.location;
    let radius = anchor.radius;
    let symm = anchor.symm;

    let mut fill = FloodFill::new(surface.vertex_count());
    let seed_radius = if factor.is_some() { radius } else { 0.0 };
    let seeds = fill.add_initial_with_symmetry(surface, symm, anchor.active_vertex, seed_radius);
    if let Some(factor) = factor.as_deref_mut() {
        for &seed in &seeds {
            factor[seed] = 1.0;
        }
    }

    let mut boundary = Centroid::default();
    let mut fallback = location;
    fill.execute(surface, fake_neighbors, |_, to, is_duplicate| {
        let position = surface.position(to);
        if let Some(factor) = factor.as_deref_mut() {
            factor[to] = 1.0;
        }
        if location.distance_squared(fallback) < location.distance_squared(position) {
            fallback = position;
        }

        if is_inside_radius_symmetric(position, location, radius, symm) {
            return true;
        }
        if is_in_pivot_symmetry(position, location, symm) && !is_duplicate {
            boundary.add(position);
        }
        false
    });

    let mut origin = boundary.get().unwrap_or_else(|| {
        debug!("calc_pose_data: no vertex outside the radius, using farthest vertex");
        fallback
    });
    origin += (origin - location).normalize_or_zero() * radius * pose_offset;

    if pose_offset != 0.0 {
        if let Some(factor) = factor {
            grow_pose_factor(surface, fake_neighbors, symm, origin, GrowMode::Origin, factor);
        }
    }
    origin
}

/// Build the chain for `config` without smoothing its weights.
///
/// Fake neighbors are built for the duration of the build when the brush is
/// not limited to connected geometry.
pub fn build_ik_chain<S>(surface: &S, config: &PoseBrushConfig, anchor: &StrokeAnchor) -> IkChain
where
    S: SculptSurface + FaceSets + ?Sized,
{
    let fake_neighbors = (!config.use_connected_only)
        .then(|| FakeNeighbors::build(surface, config.disconnected_distance_max));
    let fake_neighbors = fake_neighbors.as_ref();

    let chain = match config.origin_type {
        PoseOriginType::Topology => build_topology_chain(surface, fake_neighbors, config, anchor),
        PoseOriginType::FaceSets => build_face_sets_chain(surface, fake_neighbors, config, anchor),
        PoseOriginType::FaceSetsFk => build_face_sets_fk_chain(surface, fake_neighbors, anchor),
    };

    debug!(
        "build_ik_chain: {:?} chain with {} segments, lengths {:?}",
        config.origin_type,
        chain.segments.len(),
        chain.segments.iter().map(|s| s.length()).collect::<Vec<_>>()
    );
    chain
}

/// Build the chain and smooth its segment weights.
pub fn init_pose_brush<S>(surface: &S, config: &PoseBrushConfig, anchor: &StrokeAnchor) -> IkChain
where
    S: SculptSurface + FaceSets + ?Sized,
{
    let mut chain = build_ik_chain(surface, config, anchor);
    for segment in &mut chain.segments {
        smooth_weights(surface, &mut segment.weights, config.smooth_iterations);
    }
    chain
}

/// Rest pose of the chain a stroke at `anchor` would build.
pub fn build_chain_preview<S>(surface: &S, config: &PoseBrushConfig, anchor: &StrokeAnchor) -> ChainPreview
where
    S: SculptSurface + FaceSets + ?Sized,
{
    build_ik_chain(surface, config, anchor).preview()
}

fn build_topology_chain<S: SculptSurface + ?Sized>(
    surface: &S,
    fake_neighbors: Option<&FakeNeighbors>,
    config: &PoseBrushConfig,
    anchor: &StrokeAnchor,
) -> IkChain {
    let vertex_count = surface.vertex_count();
    let segment_count = config.effective_segments();
    let segment_len = anchor.radius * (1.0 + config.pose_offset);
    let mut chain = IkChain::new(segment_count, vertex_count);

    // Cumulative factor and its state before the current segment.
    let mut grow = vec![0.0; vertex_count];
    if let Some(nearest) = nearest_vertex(surface, anchor.location, None) {
        grow[nearest] = 1.0;
    }

    let mut target = calc_pose_data(surface, fake_neighbors, anchor, config.pose_offset, Some(&mut grow));
    chain.segments[0].orig = target;
    chain.segments[0].weights.copy_from_slice(&grow);
    let mut grow_prev = grow.clone();

    for segment in chain.segments.iter_mut().skip(1) {
        let outcome = grow_pose_factor(
            surface,
            fake_neighbors,
            anchor.symm,
            target,
            GrowMode::Distance { max_len: segment_len },
            &mut grow,
        );
        segment.orig = outcome.origin;
        target = outcome.origin;

        for ((weight, &current), prev) in segment.weights.iter_mut().zip(&grow).zip(&mut grow_prev) {
            *weight = current - *prev;
            *prev = current;
        }
    }

    chain.init_origin_heads(anchor.location);
    chain
}

/// Flood state for one face set segment.
struct FaceSetsStep<'a, S: ?Sized> {
    surface: &'a S,
    fake_neighbors: Option<&'a FakeNeighbors>,
    initial_position: Vec3,
    radius: f32,
    symm: SymmetryFlags,
    is_first_iteration: bool,
    visited_face_sets: &'a mut HashSet<i32>,
    is_weighted: &'a mut [bool],
    current_face_set: &'a mut i32,
    weights: &'a mut [f32],
    boundary: Centroid,
    fallback: Centroid,
    next: Option<(i32, usize)>,
    neighbors: Vec<Neighbor>,
}

impl<S: SculptSurface + FaceSets + ?Sized> FaceSetsStep<'_, S> {
    fn visit(&mut self, vertex: usize, is_duplicate: bool) -> bool {
        let surface = self.surface;
        let position = surface.position(vertex);
        let symmetry_check =
            is_in_pivot_symmetry(position, self.initial_position, self.symm) && !is_duplicate;

        // Until a face set is picked, expand by topology; the first vertex
        // outside the radius decides the face set.
        if *self.current_face_set == FACE_SET_NONE {
            self.weights[vertex] = 1.0;
            self.is_weighted[vertex] = true;

            if is_inside_radius_symmetric(position, self.initial_position, self.radius, self.symm) {
                self.visited_face_sets.insert(surface.vert_face_set(vertex));
            } else if symmetry_check {
                *self.current_face_set = surface.vert_face_set(vertex);
                self.visited_face_sets.insert(*self.current_face_set);
            }
            return true;
        }

        // The first segment may still be finishing face sets crossed while
        // looking for the current one.
        let is_vertex_valid = if self.is_first_iteration {
            self.visited_face_sets
                .iter()
                .any(|&face_set| surface.vert_has_face_set(vertex, face_set))
        } else {
            surface.vert_has_face_set(vertex, *self.current_face_set)
        };
        if !is_vertex_valid {
            return false;
        }

        let mut visit_next = false;
        if !self.is_weighted[vertex] {
            self.weights[vertex] = 1.0;
            self.is_weighted[vertex] = true;
            visit_next = true;
        }

        if symmetry_check {
            self.fallback.add(position);
        }
        if !symmetry_check || surface.vert_has_unique_face_set(vertex) {
            return visit_next;
        }

        // Boundary vertex: one of its neighbors leads into an unvisited face set.
        collect_neighbors(surface, self.fake_neighbors, vertex, &mut self.neighbors);
        let mut count_as_boundary = false;
        for neighbor in &self.neighbors {
            let candidate = surface.vert_face_set(neighbor.vertex);
            if surface.vert_has_unique_face_set(neighbor.vertex)
                && !self.visited_face_sets.contains(&candidate)
            {
                if self.next.is_none() {
                    self.next = Some((candidate, neighbor.vertex));
                }
                count_as_boundary = true;
            }
        }
        if count_as_boundary {
            self.boundary.add(position);
        }
        visit_next
    }
}

fn build_face_sets_chain<S>(
    surface: &S,
    fake_neighbors: Option<&FakeNeighbors>,
    config: &PoseBrushConfig,
    anchor: &StrokeAnchor,
) -> IkChain
where
    S: SculptSurface + FaceSets + ?Sized,
{
    let vertex_count = surface.vertex_count();
    let segment_count = config.effective_segments();
    let mut chain = IkChain::new(segment_count, vertex_count);

    let mut visited_face_sets = HashSet::new();
    // Each vertex is weighted by one face set only.
    let mut is_weighted = vec![false; vertex_count];
    let mut current_face_set = FACE_SET_NONE;
    let mut current_vertex = Some(anchor.active_vertex);
    let mut previous_origin = anchor.location;

    for (index, segment) in chain.segments.iter_mut().enumerate() {
        let Some(vertex) = current_vertex else {
            segment.orig = previous_origin;
            continue;
        };

        let mut fill = FloodFill::new(vertex_count);
        fill.add_initial_with_symmetry(surface, anchor.symm, vertex, f32::INFINITY);
        visited_face_sets.insert(current_face_set);

        let mut step = FaceSetsStep {
            surface,
            fake_neighbors,
            initial_position: surface.position(vertex),
            radius: anchor.radius,
            symm: anchor.symm,
            is_first_iteration: index == 0,
            visited_face_sets: &mut visited_face_sets,
            is_weighted: &mut is_weighted,
            current_face_set: &mut current_face_set,
            weights: &mut segment.weights,
            boundary: Centroid::default(),
            fallback: Centroid::default(),
            next: None,
            neighbors: Vec::new(),
        };
        fill.execute(surface, fake_neighbors, |_, to, is_duplicate| step.visit(to, is_duplicate));

        let (boundary, fallback, next) = (step.boundary, step.fallback, step.next);
        segment.orig = boundary
            .get()
            .or_else(|| fallback.get())
            .unwrap_or(previous_origin);
        previous_origin = segment.orig;

        match next {
            Some((face_set, next_vertex)) => {
                current_face_set = face_set;
                current_vertex = Some(next_vertex);
            }
            None => {
                if index + 1 < segment_count {
                    warn!(
                        "Face set chain ended after {} of {} segments",
                        index + 1,
                        segment_count
                    );
                }
                current_vertex = None;
            }
        }
    }

    chain.init_origin_heads(surface.position(anchor.active_vertex));
    chain
}

fn build_face_sets_fk_chain<S>(
    surface: &S,
    fake_neighbors: Option<&FakeNeighbors>,
    anchor: &StrokeAnchor,
) -> IkChain
where
    S: SculptSurface + FaceSets + ?Sized,
{
    let vertex_count = surface.vertex_count();
    let active = anchor.active_vertex;
    let mut chain = IkChain::new(1, vertex_count);

    let active_face_set = surface.active_face_set(active);

    // Breadth-first depth per reached vertex; zero means unreached.
    let mut depth = vec![0usize; vertex_count];
    depth[active] = 1;

    let mut visited_face_sets = HashSet::new();
    let mut masked_face_set = FACE_SET_NONE;
    let mut masked_depth = 0;
    let mut target_face_set = FACE_SET_NONE;
    {
        let mut fill = FloodFill::new(vertex_count);
        fill.add_initial(active);
        fill.execute(surface, fake_neighbors, |from, to, is_duplicate| {
            depth[to] = if is_duplicate { depth[from] } else { depth[from] + 1 };

            let to_face_set = surface.vert_face_set(to);
            if !visited_face_sets.contains(&to_face_set)
                && surface.vert_has_unique_face_set(to)
                && !surface.vert_has_unique_face_set(from)
                && surface.vert_has_face_set(from, to_face_set)
            {
                visited_face_sets.insert(to_face_set);
                // Ties keep the first face set found.
                if depth[to] > masked_depth {
                    masked_face_set = to_face_set;
                    masked_depth = depth[to];
                }
                if target_face_set == FACE_SET_NONE {
                    target_face_set = to_face_set;
                }
            }

            surface.vert_has_face_set(to, active_face_set)
        });
    }

    let centroid_between = |face_set: i32| {
        let mut centroid = Centroid::default();
        for vertex in (0..vertex_count).filter(|&v| depth[v] != 0) {
            if surface.vert_has_face_set(vertex, active_face_set)
                && surface.vert_has_face_set(vertex, face_set)
            {
                centroid.add(surface.position(vertex));
            }
        }
        centroid.get()
    };

    let origin = centroid_between(masked_face_set).unwrap_or_else(|| {
        debug!("build_face_sets_fk_chain: no masked face set boundary, pivoting on the anchor");
        anchor.location
    });

    let head = if target_face_set != masked_face_set {
        centroid_between(target_face_set)
    } else {
        None
    };
    let head = match head {
        Some(head) => {
            chain.grab_delta_offset = head - anchor.location;
            head
        }
        None => anchor.location,
    };

    // Weights cover the brush radius and stop at the masked face set.
    let weights = &mut chain.segments[0].weights;
    let mut fill = FloodFill::new(vertex_count);
    for seed in fill.add_initial_with_symmetry(surface, anchor.symm, active, anchor.radius) {
        weights[seed] = 1.0;
    }
    fill.execute(surface, fake_neighbors, |_, to, _| {
        weights[to] = 1.0;
        !surface.vert_has_face_set(to, masked_face_set)
    });

    chain.segments[0].orig = origin;
    chain.init_origin_heads(head);
    chain
}
