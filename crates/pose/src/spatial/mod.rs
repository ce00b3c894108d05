//! Spatial partitioning of surface vertices.
//!
//! The octree serves two purposes for the pose brush:
//! - Its leaves become the surface batches processed in parallel
//! - Sphere queries find bridge candidates between disconnected islands

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Configuration for batch partitioning.
///
/// Values are configurable and should not be treated as magic numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum depth of the octree (default: 8).
    pub max_depth: u32,
    /// Maximum vertices per batch before splitting (default: 256).
    pub max_vertices_per_batch: usize,
    /// Minimum node size, prevents infinite subdivision (default: 0.0001).
    pub min_node_size: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_vertices_per_batch: 256,
            min_node_size: 0.0001,
        }
    }
}

/// Octree over vertex positions, built in one pass.
///
/// Leaves hold at most `max_vertices_per_batch` vertices unless the depth or
/// node size limit is reached first.
#[derive(Debug)]
pub struct VertexOctree {
    points: Vec<(usize, Vec3)>,
    root: OctreeNode,
}

#[derive(Debug)]
struct OctreeNode {
    bounds: Aabb,
    /// Range into the octree's point list, reordered so every node owns a
    /// contiguous slice.
    range: std::ops::Range<usize>,
    children: Vec<OctreeNode>,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box enclosing `points`, or a zero box at the origin when empty.
    pub fn enclosing(points: impl Iterator<Item = Vec3>) -> Self {
        points
            .fold(None, |bounds: Option<Aabb>, p| match bounds {
                Some(b) => Some(Aabb::new(b.min.min(p), b.max.max(p))),
                None => Some(Aabb::new(p, p)),
            })
            .unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// Child box `octant`, bit 0 selecting the upper X half, bit 1 Y, bit 2 Z.
    fn octant(&self, octant: usize) -> Aabb {
        let center = self.center();
        let mut min = self.min;
        let mut max = center;
        for axis in 0..3 {
            if octant & (1 << axis) != 0 {
                min[axis] = center[axis];
                max[axis] = self.max[axis];
            }
        }
        Aabb::new(min, max)
    }
}

fn octant_of(center: Vec3, point: Vec3) -> usize {
    (0..3)
        .filter(|&axis| point[axis] >= center[axis])
        .fold(0, |octant, axis| octant | (1 << axis))
}

impl VertexOctree {
    /// Build an octree from vertex positions.
    pub fn from_vertices(vertices: impl Iterator<Item = (usize, Vec3)>, config: BatchConfig) -> Self {
        let mut points: Vec<(usize, Vec3)> = vertices.collect();
        let mut bounds = Aabb::enclosing(points.iter().map(|&(_, p)| p));

        // Pad so points on the boundary fall strictly inside.
        let padding = bounds.size() * 0.01 + Vec3::splat(0.001);
        bounds.min -= padding;
        bounds.max += padding;

        let len = points.len();
        let root = Self::build_node(&mut points, 0..len, bounds, 0, &config);
        Self { points, root }
    }

    fn build_node(
        points: &mut [(usize, Vec3)],
        range: std::ops::Range<usize>,
        bounds: Aabb,
        depth: u32,
        config: &BatchConfig,
    ) -> OctreeNode {
        let splittable = range.len() > config.max_vertices_per_batch
            && depth < config.max_depth
            && bounds.size().min_element() > config.min_node_size * 2.0;
        if !splittable {
            return OctreeNode {
                bounds,
                range,
                children: Vec::new(),
            };
        }

        let center = bounds.center();
        let slice = &mut points[range.clone()];
        slice.sort_by_key(|&(vertex, p)| (octant_of(center, p), vertex));
        let mut counts = [0usize; 8];
        for &(_, p) in slice.iter() {
            counts[octant_of(center, p)] += 1;
        }

        let mut children = Vec::new();
        let mut start = range.start;
        for (octant, count) in counts.into_iter().enumerate() {
            if count > 0 {
                let end = start + count;
                children.push(Self::build_node(points, start..end, bounds.octant(octant), depth + 1, config));
                start = end;
            }
        }
        OctreeNode {
            bounds,
            range,
            children,
        }
    }

    /// Query all vertices within a sphere.
    pub fn query_sphere(&self, center: Vec3, radius: f32) -> Vec<usize> {
        let mut results = Vec::new();
        self.query_sphere_node(&self.root, center, radius, &mut results);
        results
    }

    fn query_sphere_node(&self, node: &OctreeNode, center: Vec3, radius: f32, results: &mut Vec<usize>) {
        if !node.bounds.intersects_sphere(center, radius) {
            return;
        }
        if node.children.is_empty() {
            let radius_sq = radius * radius;
            results.extend(
                self.points[node.range.clone()]
                    .iter()
                    .filter(|(_, p)| p.distance_squared(center) <= radius_sq)
                    .map(|&(vertex, _)| vertex),
            );
            return;
        }
        for child in &node.children {
            self.query_sphere_node(child, center, radius, results);
        }
    }

    /// Vertex lists of all non-empty leaves, in depth-first order.
    pub fn leaf_batches(&self) -> Vec<Vec<usize>> {
        let mut batches = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.children.is_empty() {
                if !node.range.is_empty() {
                    batches.push(self.points[node.range.clone()].iter().map(|&(v, _)| v).collect());
                }
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        batches
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
