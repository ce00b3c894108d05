//! Dynamic topology mesh adapter.
//!
//! Vertices and triangles live in slots that keep their index when other
//! elements are removed. An empty slot is reported as a hidden vertex.

use glam::Vec3;

use super::{
    build_batches, push_unique, Batch, FaceSets, Neighbor, SculptSurface, SurfaceError,
    FACE_SET_DEFAULT, FACE_SET_NONE,
};
use crate::spatial::BatchConfig;
use crate::types::SurfaceKind;

#[derive(Debug, Clone)]
struct DynVert {
    position: Vec3,
    mask: f32,
    hidden: bool,
    faces: Vec<usize>,
}

#[derive(Debug, Clone)]
struct DynFace {
    verts: [usize; 3],
    face_set: i32,
}

/// Triangle mesh with stable vertex slots.
#[derive(Debug, Clone)]
pub struct DynamicMesh {
    verts: Vec<Option<DynVert>>,
    faces: Vec<Option<DynFace>>,
    batches: Vec<Batch>,
    batch_config: BatchConfig,
}

impl Default for DynamicMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicMesh {
    pub fn new() -> Self {
        Self::with_batch_config(BatchConfig::default())
    }

    pub fn with_batch_config(batch_config: BatchConfig) -> Self {
        Self {
            verts: Vec::new(),
            faces: Vec::new(),
            batches: Vec::new(),
            batch_config,
        }
    }

    /// Build a mesh from positions and triangles, then partition it.
    pub fn from_triangles(positions: &[Vec3], triangles: &[[usize; 3]]) -> Result<Self, SurfaceError> {
        let mut mesh = Self::new();
        for &position in positions {
            mesh.add_vertex(position);
        }
        for &triangle in triangles {
            mesh.add_triangle(triangle, FACE_SET_DEFAULT)?;
        }
        mesh.rebuild_batches();
        Ok(mesh)
    }

    /// Append a vertex. It joins the last batch until [`Self::rebuild_batches`].
    pub fn add_vertex(&mut self, position: Vec3) -> usize {
        let vertex = self.verts.len();
        self.verts.push(Some(DynVert {
            position,
            mask: 0.0,
            hidden: false,
            faces: Vec::new(),
        }));

        let max = self.batch_config.max_vertices_per_batch;
        match self.batches.last_mut() {
            Some(batch) if batch.len() < max => batch.push(vertex),
            _ => self.batches.push(Batch::new(vec![vertex])),
        }
        vertex
    }

    /// Add a triangle between existing vertices.
    pub fn add_triangle(&mut self, verts: [usize; 3], face_set: i32) -> Result<usize, SurfaceError> {
        let face = self.faces.len();
        for vertex in verts {
            if !matches!(self.verts.get(vertex), Some(Some(_))) {
                return Err(SurfaceError::VertexOutOfRange {
                    face,
                    vertex,
                    vertex_count: self.verts.len(),
                });
            }
        }
        if verts[0] == verts[1] || verts[1] == verts[2] || verts[0] == verts[2] {
            return Err(SurfaceError::DegenerateFace { face, corners: 3 });
        }

        for vertex in verts {
            if let Some(Some(vert)) = self.verts.get_mut(vertex) {
                vert.faces.push(face);
            }
        }
        self.faces.push(Some(DynFace { verts, face_set }));
        Ok(face)
    }

    /// Remove a triangle, leaving its slot empty.
    pub fn remove_face(&mut self, face: usize) {
        let Some(removed) = self.faces.get_mut(face).and_then(Option::take) else {
            return;
        };
        for vertex in removed.verts {
            if let Some(Some(vert)) = self.verts.get_mut(vertex) {
                vert.faces.retain(|&f| f != face);
            }
        }
    }

    /// Remove a vertex and every triangle using it.
    pub fn remove_vertex(&mut self, vertex: usize) {
        let faces = match self.verts.get(vertex) {
            Some(Some(vert)) => vert.faces.clone(),
            _ => return,
        };
        for face in faces {
            self.remove_face(face);
        }
        self.verts[vertex] = None;
    }

    /// Re-partition the live vertices.
    pub fn rebuild_batches(&mut self) {
        let live = self
            .verts
            .iter()
            .enumerate()
            .filter_map(|(v, vert)| vert.as_ref().map(|vert| (v, vert.position)));
        self.batches = build_batches(live, &self.batch_config);
    }

    pub fn set_mask(&mut self, vertex: usize, mask: f32) {
        if let Some(Some(vert)) = self.verts.get_mut(vertex) {
            vert.mask = mask;
        }
    }

    pub fn set_hidden(&mut self, vertex: usize, hidden: bool) {
        if let Some(Some(vert)) = self.verts.get_mut(vertex) {
            vert.hidden = hidden;
        }
    }

    pub fn set_face_set(&mut self, face: usize, face_set: i32) {
        if let Some(Some(f)) = self.faces.get_mut(face) {
            f.face_set = face_set;
        }
    }

    fn vert(&self, vertex: usize) -> Option<&DynVert> {
        self.verts.get(vertex).and_then(Option::as_ref)
    }

    fn vert_face_sets(&self, vertex: usize) -> impl Iterator<Item = i32> + '_ {
        self.vert(vertex)
            .into_iter()
            .flat_map(|vert| vert.faces.iter())
            .filter_map(|&face| self.faces[face].as_ref())
            .map(|face| face.face_set)
    }
}

impl SculptSurface for DynamicMesh {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Dynamic
    }

    fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    fn batches(&self) -> &[Batch] {
        &self.batches
    }

    fn position(&self, vertex: usize) -> Vec3 {
        self.vert(vertex).map(|vert| vert.position).unwrap_or(Vec3::ZERO)
    }

    fn is_visible(&self, vertex: usize) -> bool {
        self.vert(vertex).is_some_and(|vert| !vert.hidden)
    }

    fn mask(&self, vertex: usize) -> f32 {
        self.vert(vertex).map(|vert| vert.mask).unwrap_or(0.0)
    }

    fn neighbors(&self, vertex: usize, out: &mut Vec<Neighbor>) {
        let Some(vert) = self.vert(vertex) else {
            return;
        };
        for face in vert.faces.iter().filter_map(|&face| self.faces[face].as_ref()) {
            for other in face.verts {
                if other != vertex {
                    push_unique(out, Neighbor::new(other));
                }
            }
        }
    }

    fn set_position(&mut self, vertex: usize, position: Vec3) {
        if let Some(Some(vert)) = self.verts.get_mut(vertex) {
            vert.position = position;
        }
    }
}

impl FaceSets for DynamicMesh {
    fn vert_face_set(&self, vertex: usize) -> i32 {
        self.vert_face_sets(vertex).max().unwrap_or(FACE_SET_NONE)
    }

    fn vert_has_face_set(&self, vertex: usize, face_set: i32) -> bool {
        self.vert_face_sets(vertex).any(|id| id == face_set)
    }

    fn vert_has_unique_face_set(&self, vertex: usize) -> bool {
        let mut face_sets = self.vert_face_sets(vertex);
        let Some(first) = face_sets.next() else {
            return true;
        };
        face_sets.all(|id| id == first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> DynamicMesh {
        DynamicMesh::from_triangles(
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_triangle_neighbors() {
        let mesh = quad();
        let mut out = Vec::new();
        mesh.neighbors(0, &mut out);
        let mut verts: Vec<usize> = out.iter().map(|n| n.vertex).collect();
        verts.sort_unstable();
        assert_eq!(verts, vec![1, 2, 3]);
    }

    #[test]
    fn test_add_triangle_validation() {
        let mut mesh = quad();
        assert!(matches!(
            mesh.add_triangle([0, 1, 9], FACE_SET_DEFAULT),
            Err(SurfaceError::VertexOutOfRange { vertex: 9, .. })
        ));
        assert!(matches!(
            mesh.add_triangle([0, 0, 1], FACE_SET_DEFAULT),
            Err(SurfaceError::DegenerateFace { .. })
        ));
    }

    #[test]
    fn test_removed_vertex_keeps_slot() {
        let mut mesh = quad();
        mesh.remove_vertex(3);

        assert_eq!(mesh.vertex_count(), 4);
        assert!(!mesh.is_visible(3));
        assert!(mesh.is_visible(2));

        let mut out = Vec::new();
        mesh.neighbors(0, &mut out);
        assert!(!out.iter().any(|n| n.vertex == 3));
    }

    #[test]
    fn test_added_vertex_joins_a_batch() {
        let mut mesh = quad();
        let vertex = mesh.add_vertex(Vec3::new(2.0, 0.0, 0.0));
        assert!(mesh.batches().iter().any(|b| b.vertices().contains(&vertex)));

        mesh.rebuild_batches();
        let total: usize = mesh.batches().iter().map(Batch::len).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_face_sets_on_triangles() {
        let mut mesh = quad();
        mesh.set_face_set(1, 4);

        assert_eq!(mesh.vert_face_set(0), 4);
        assert!(!mesh.vert_has_unique_face_set(0));
        assert!(mesh.vert_has_unique_face_set(1));
        assert!(mesh.vert_has_face_set(3, 4));
        assert!(!mesh.vert_has_face_set(1, 4));
    }
}
