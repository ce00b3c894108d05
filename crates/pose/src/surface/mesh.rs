//! Indexed polygon mesh adapter.

use glam::Vec3;

use super::{
    build_batches, check_length, push_unique, Batch, FaceSets, Neighbor, SculptSurface,
    SurfaceError, FACE_SET_DEFAULT, FACE_SET_NONE,
};
use crate::spatial::BatchConfig;
use crate::types::SurfaceKind;

/// Polygon mesh stored as face offsets into a flat corner array.
#[derive(Debug, Clone)]
pub struct IndexedMesh {
    positions: Vec<Vec3>,
    /// Face `f` owns corners `face_offsets[f]..face_offsets[f + 1]`
    face_offsets: Vec<usize>,
    corner_verts: Vec<usize>,
    vert_to_face: Vec<Vec<usize>>,
    hide_vert: Vec<bool>,
    hide_poly: Vec<bool>,
    masks: Vec<f32>,
    face_sets: Vec<i32>,
    batches: Vec<Batch>,
}

impl IndexedMesh {
    /// Build a mesh with the default batch configuration.
    pub fn new<I, F>(positions: Vec<Vec3>, faces: I) -> Result<Self, SurfaceError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[usize]>,
    {
        Self::with_batch_config(positions, faces, &BatchConfig::default())
    }

    /// Build a mesh, partitioning vertices with `config`.
    pub fn with_batch_config<I, F>(
        positions: Vec<Vec3>,
        faces: I,
        config: &BatchConfig,
    ) -> Result<Self, SurfaceError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[usize]>,
    {
        let vertex_count = positions.len();
        let mut face_offsets = vec![0];
        let mut corner_verts = Vec::new();
        let mut vert_to_face = vec![Vec::new(); vertex_count];

        for (face, verts) in faces.into_iter().enumerate() {
            let verts = verts.as_ref();
            if verts.len() < 3 {
                return Err(SurfaceError::DegenerateFace {
                    face,
                    corners: verts.len(),
                });
            }
            for &vertex in verts {
                if vertex >= vertex_count {
                    return Err(SurfaceError::VertexOutOfRange {
                        face,
                        vertex,
                        vertex_count,
                    });
                }
                if vert_to_face[vertex].last() != Some(&face) {
                    vert_to_face[vertex].push(face);
                }
            }
            corner_verts.extend_from_slice(verts);
            face_offsets.push(corner_verts.len());
        }

        let face_count = face_offsets.len() - 1;
        let batches = build_batches(positions.iter().copied().enumerate(), config);

        Ok(Self {
            hide_vert: vec![false; vertex_count],
            hide_poly: vec![false; face_count],
            masks: vec![0.0; vertex_count],
            face_sets: vec![FACE_SET_DEFAULT; face_count],
            positions,
            face_offsets,
            corner_verts,
            vert_to_face,
            batches,
        })
    }

    pub fn face_count(&self) -> usize {
        self.face_offsets.len() - 1
    }

    /// Vertices of a face in winding order.
    pub fn face_verts(&self, face: usize) -> &[usize] {
        &self.corner_verts[self.face_offsets[face]..self.face_offsets[face + 1]]
    }

    /// Faces using a vertex.
    pub fn vert_faces(&self, vertex: usize) -> &[usize] {
        &self.vert_to_face[vertex]
    }

    /// Replace all face sets, one id per face.
    pub fn set_face_sets(&mut self, face_sets: Vec<i32>) -> Result<(), SurfaceError> {
        check_length("face_sets", &face_sets, self.face_count())?;
        self.face_sets = face_sets;
        Ok(())
    }

    /// Replace the vertex mask, one value per vertex.
    pub fn set_masks(&mut self, masks: Vec<f32>) -> Result<(), SurfaceError> {
        check_length("masks", &masks, self.positions.len())?;
        self.masks = masks;
        Ok(())
    }

    pub fn set_vertex_hidden(&mut self, vertex: usize, hidden: bool) {
        self.hide_vert[vertex] = hidden;
    }

    /// Hidden faces no longer connect their vertices.
    pub fn set_face_hidden(&mut self, face: usize, hidden: bool) {
        self.hide_poly[face] = hidden;
    }
}

impl SculptSurface for IndexedMesh {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Mesh
    }

    fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn batches(&self) -> &[Batch] {
        &self.batches
    }

    fn position(&self, vertex: usize) -> Vec3 {
        self.positions[vertex]
    }

    fn is_visible(&self, vertex: usize) -> bool {
        !self.hide_vert[vertex]
    }

    fn mask(&self, vertex: usize) -> f32 {
        self.masks[vertex]
    }

    fn neighbors(&self, vertex: usize, out: &mut Vec<Neighbor>) {
        for &face in &self.vert_to_face[vertex] {
            if self.hide_poly[face] {
                continue;
            }
            let verts = self.face_verts(face);
            let Some(corner) = verts.iter().position(|&v| v == vertex) else {
                continue;
            };
            let prev = verts[(corner + verts.len() - 1) % verts.len()];
            let next = verts[(corner + 1) % verts.len()];
            push_unique(out, Neighbor::new(prev));
            push_unique(out, Neighbor::new(next));
        }
    }

    fn set_position(&mut self, vertex: usize, position: Vec3) {
        self.positions[vertex] = position;
    }

    fn positions(&self) -> Vec<Vec3> {
        self.positions.clone()
    }
}

impl FaceSets for IndexedMesh {
    fn vert_face_set(&self, vertex: usize) -> i32 {
        self.vert_to_face[vertex]
            .iter()
            .map(|&face| self.face_sets[face])
            .max()
            .unwrap_or(FACE_SET_NONE)
    }

    fn vert_has_face_set(&self, vertex: usize, face_set: i32) -> bool {
        self.vert_to_face[vertex]
            .iter()
            .any(|&face| self.face_sets[face] == face_set)
    }

    fn vert_has_unique_face_set(&self, vertex: usize) -> bool {
        let mut faces = self.vert_to_face[vertex].iter();
        let Some(&first) = faces.next() else {
            return true;
        };
        faces.all(|&face| self.face_sets[face] == self.face_sets[first])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_meshes;

    #[test]
    fn test_rejects_out_of_range_vertex() {
        let result = IndexedMesh::new(vec![Vec3::ZERO; 3], [[0, 1, 5]]);
        assert!(matches!(
            result,
            Err(SurfaceError::VertexOutOfRange { vertex: 5, .. })
        ));
    }

    #[test]
    fn test_rejects_degenerate_face() {
        let result = IndexedMesh::new(vec![Vec3::ZERO; 3], [vec![0, 1]]);
        assert!(matches!(result, Err(SurfaceError::DegenerateFace { corners: 2, .. })));
    }

    #[test]
    fn test_quad_neighbors() {
        let mesh = test_meshes::plane(3, 3, 1.0);
        let mut out = Vec::new();
        // Center vertex of a 3x3 quad grid touches its 4 edge neighbors.
        mesh.neighbors(4, &mut out);
        let mut verts: Vec<usize> = out.iter().map(|n| n.vertex).collect();
        verts.sort_unstable();
        assert_eq!(verts, vec![1, 3, 5, 7]);
        assert!(out.iter().all(|n| !n.is_duplicate));
    }

    #[test]
    fn test_hidden_face_breaks_adjacency() {
        let mut mesh = test_meshes::plane(2, 2, 1.0);
        mesh.set_face_hidden(0, true);
        let mut out = Vec::new();
        mesh.neighbors(0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_face_set_queries() {
        let mut mesh = test_meshes::plane(3, 2, 1.0);
        // Two quads side by side sharing vertices 1 and 4.
        mesh.set_face_sets(vec![1, 2]).unwrap();

        assert_eq!(mesh.vert_face_set(0), 1);
        assert_eq!(mesh.vert_face_set(1), 2);
        assert!(mesh.vert_has_face_set(1, 1));
        assert!(mesh.vert_has_face_set(1, 2));
        assert!(!mesh.vert_has_unique_face_set(1));
        assert!(mesh.vert_has_unique_face_set(0));
        assert!(mesh.set_face_sets(vec![1]).is_err());
    }

    #[test]
    fn test_batches_partition_vertices() {
        let mesh = IndexedMesh::with_batch_config(
            test_meshes::plane(6, 6, 1.0).positions(),
            test_meshes::plane_faces(6, 6),
            &BatchConfig {
                max_vertices_per_batch: 4,
                ..Default::default()
            },
        )
        .unwrap();

        let mut all: Vec<usize> = mesh.batches().iter().flat_map(|b| b.vertices().to_vec()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..36).collect::<Vec<_>>());
        assert!(mesh.batches().len() > 1);
    }
}
