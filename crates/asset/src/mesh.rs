//! CPU-side mesh representation used by loaders.

use corelib::{Aabb, CoreResult, Vec3};

/// Vertex with position and normal, in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    /// Vertex at `position` with a zero normal, filled in later by
    /// [`MeshData::compute_vertex_normals`].
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bounding box over all vertex positions.
    pub fn bounds(&self) -> CoreResult<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| Vec3::from(v.position)))
    }

    /// Recompute per-vertex normals from the triangles that reference each
    /// vertex, weighted by triangle area. Vertices not shared between
    /// triangles end up with their facet normal. Vertices with no usable
    /// contribution fall back to +Z.
    pub fn compute_vertex_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(va), Some(vb), Some(vc)) =
                (self.vertices.get(a), self.vertices.get(b), self.vertices.get(c))
            else {
                continue;
            };
            let pa = Vec3::from(va.position);
            let pb = Vec3::from(vb.position);
            let pc = Vec3::from(vc.position);
            // Unnormalized cross product: length is twice the area.
            let face = (pb - pa).cross(pc - pa);
            acc[a] += face;
            acc[b] += face;
            acc[c] += face;
        }

        for (vertex, n) in self.vertices.iter_mut().zip(acc) {
            vertex.normal = n.normalize_or(Vec3::Z).to_array();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_triangle_gets_facet_normal() {
        let mut mesh = MeshData::new(
            vec![
                MeshVertex::at([0.0, 0.0, 0.0]),
                MeshVertex::at([1.0, 0.0, 0.0]),
                MeshVertex::at([0.0, 1.0, 0.0]),
            ],
            vec![0, 1, 2],
        );
        mesh.compute_vertex_normals();
        for v in &mesh.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn shared_vertex_averages_neighbours() {
        // Two unit right triangles folded 90 degrees along the X axis.
        let mut mesh = MeshData::new(
            vec![
                MeshVertex::at([0.0, 0.0, 0.0]),
                MeshVertex::at([1.0, 0.0, 0.0]),
                MeshVertex::at([0.0, 1.0, 0.0]),
                MeshVertex::at([0.0, 0.0, -1.0]),
            ],
            vec![0, 1, 2, 0, 3, 1],
        );
        mesh.compute_vertex_normals();
        let n0 = Vec3::from(mesh.vertices[0].normal);
        let expected = Vec3::new(0.0, -1.0, 1.0).normalize();
        assert!(n0.abs_diff_eq(expected, 1e-6));
        assert_eq!(mesh.vertices[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn degenerate_triangle_falls_back_to_up() {
        let mut mesh = MeshData::new(
            vec![
                MeshVertex::at([1.0, 1.0, 1.0]),
                MeshVertex::at([1.0, 1.0, 1.0]),
                MeshVertex::at([1.0, 1.0, 1.0]),
            ],
            vec![0, 1, 2],
        );
        mesh.compute_vertex_normals();
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn bounds_cover_positions() {
        let mesh = MeshData::new(
            vec![
                MeshVertex::at([-1.0, -1.0, 0.0]),
                MeshVertex::at([1.0, 1.0, 2.0]),
                MeshVertex::at([0.0, 0.5, 1.0]),
            ],
            vec![0, 1, 2],
        );
        let b = mesh.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 1.0, 2.0));
    }
}
