//! Mesh data, asset contract validation and GPU upload

use std::sync::Arc;

/// Interleaved position + normal vertex (24 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Contiguous index range drawn as one triangle list
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Submesh {
    pub index_offset: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("mesh has no vertices")]
    EmptyVertices,

    #[error("mesh has no indices")]
    EmptyIndices,

    #[error("submesh {submesh} index count {count} is not a multiple of 3")]
    NotTriangles { submesh: usize, count: u32 },

    #[error("submesh {submesh} range {offset}..{end} exceeds index buffer of {len}")]
    SubmeshOutOfRange { submesh: usize, offset: u32, end: u64, len: usize },

    #[error("index {position} references vertex {value} but mesh has {vertex_count} vertices")]
    IndexOutOfBounds { position: usize, value: u32, vertex_count: usize },
}

/// Validated CPU-side mesh
///
/// Immutable once built. Every submesh is a triangle list inside the shared
/// index buffer and every index references an existing vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    submeshes: Vec<Submesh>,
}

impl MeshData {
    /// Validate and wrap mesh data. An empty `submeshes` list means one
    /// submesh covering the whole index buffer.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, submeshes: Vec<Submesh>) -> Result<Self, MeshError> {
        if vertices.is_empty() {
            return Err(MeshError::EmptyVertices);
        }
        if indices.is_empty() {
            return Err(MeshError::EmptyIndices);
        }

        let submeshes = if submeshes.is_empty() {
            vec![Submesh { index_offset: 0, index_count: indices.len() as u32 }]
        } else {
            submeshes
        };

        for (i, sub) in submeshes.iter().enumerate() {
            if sub.index_count % 3 != 0 {
                return Err(MeshError::NotTriangles { submesh: i, count: sub.index_count });
            }
            let end = sub.index_offset as u64 + sub.index_count as u64;
            if end > indices.len() as u64 {
                return Err(MeshError::SubmeshOutOfRange {
                    submesh: i,
                    offset: sub.index_offset,
                    end,
                    len: indices.len(),
                });
            }
        }

        if let Some((position, &value)) = indices
            .iter()
            .enumerate()
            .find(|(_, &v)| v as usize >= vertices.len())
        {
            return Err(MeshError::IndexOutOfBounds { position, value, vertex_count: vertices.len() });
        }

        Ok(Self { vertices, indices, submeshes })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    /// Iterate the triangles of every submesh as vertex triples
    pub fn triangles(&self) -> impl Iterator<Item = [&Vertex; 3]> + '_ {
        self.submeshes.iter().flat_map(move |sub| {
            let start = sub.index_offset as usize;
            let end = start + sub.index_count as usize;
            self.indices[start..end].chunks_exact(3).map(move |tri| {
                [
                    &self.vertices[tri[0] as usize],
                    &self.vertices[tri[1] as usize],
                    &self.vertices[tri[2] as usize],
                ]
            })
        })
    }

    /// Axis-aligned box centered at `center`, CCW winding viewed from outside
    pub fn cube(center: [f32; 3], half_size: f32) -> Self {
        Self::cuboid(center, [half_size; 3])
    }

    /// Box with independent half-extents per axis
    pub fn cuboid(center: [f32; 3], half_extents: [f32; 3]) -> Self {
        let [cx, cy, cz] = center;
        let [hx, hy, hz] = half_extents;

        // (normal, 4 corners CCW viewed from outside)
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[cx-hx,cy-hy,cz+hz],[cx+hx,cy-hy,cz+hz],[cx+hx,cy+hy,cz+hz],[cx-hx,cy+hy,cz+hz]]),
            ([0.0, 0.0,-1.0], [[cx+hx,cy-hy,cz-hz],[cx-hx,cy-hy,cz-hz],[cx-hx,cy+hy,cz-hz],[cx+hx,cy+hy,cz-hz]]),
            ([1.0, 0.0, 0.0], [[cx+hx,cy-hy,cz+hz],[cx+hx,cy-hy,cz-hz],[cx+hx,cy+hy,cz-hz],[cx+hx,cy+hy,cz+hz]]),
            ([-1.0,0.0, 0.0], [[cx-hx,cy-hy,cz-hz],[cx-hx,cy-hy,cz+hz],[cx-hx,cy+hy,cz+hz],[cx-hx,cy+hy,cz-hz]]),
            ([0.0, 1.0, 0.0], [[cx-hx,cy+hy,cz+hz],[cx+hx,cy+hy,cz+hz],[cx+hx,cy+hy,cz-hz],[cx-hx,cy+hy,cz-hz]]),
            ([0.0,-1.0, 0.0], [[cx-hx,cy-hy,cz-hz],[cx+hx,cy-hy,cz-hz],[cx+hx,cy-hy,cz+hz],[cx-hx,cy-hy,cz+hz]]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, corners)) in faces.iter().enumerate() {
            let base = (face * 4) as u32;
            vertices.extend(corners.iter().map(|&p| Vertex::new(p, *normal)));
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::from_builtin(vertices, indices)
    }

    /// Flat XZ plane facing +Y
    pub fn plane(center: [f32; 3], half_extent: f32) -> Self {
        let [cx, cy, cz] = center;
        let h = half_extent;
        let n = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex::new([cx - h, cy, cz + h], n),
            Vertex::new([cx + h, cy, cz + h], n),
            Vertex::new([cx + h, cy, cz - h], n),
            Vertex::new([cx - h, cy, cz - h], n),
        ];
        Self::from_builtin(vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// Flat XY quad facing +Z
    pub fn quad(center: [f32; 3], half_width: f32, half_height: f32) -> Self {
        let [cx, cy, cz] = center;
        let n = [0.0, 0.0, 1.0];
        let vertices = vec![
            Vertex::new([cx - half_width, cy - half_height, cz], n),
            Vertex::new([cx + half_width, cy - half_height, cz], n),
            Vertex::new([cx + half_width, cy + half_height, cz], n),
            Vertex::new([cx - half_width, cy + half_height, cz], n),
        ];
        Self::from_builtin(vertices, vec![0, 1, 2, 0, 2, 3])
    }

    // Built-in primitives satisfy the contract by construction
    fn from_builtin(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let submeshes = vec![Submesh { index_offset: 0, index_count: indices.len() as u32 }];
        Self { vertices, indices, submeshes }
    }
}

/// GPU-resident mesh (owns wgpu vertex + index buffers)
#[derive(Clone, Debug)]
pub struct GpuMesh {
    pub vertex_buffer: Arc<wgpu::Buffer>,
    pub index_buffer: Arc<wgpu::Buffer>,
    pub submeshes: Arc<[Submesh]>,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &MeshData) -> Self {
        use wgpu::util::DeviceExt;
        let vertex_buffer = Arc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        let index_buffer = Arc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        }));
        Self {
            vertex_buffer,
            index_buffer,
            submeshes: mesh.submeshes().into(),
        }
    }

    /// Bind buffers and issue one indexed draw per submesh
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for sub in self.submeshes.iter() {
            pass.draw_indexed(sub.index_offset..sub.index_offset + sub.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn tri() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Vertex::new([0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ]
    }

    #[test]
    fn vertex_is_24_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn accepts_valid_triangle() {
        let mesh = MeshData::new(tri(), vec![0, 1, 2], vec![]).unwrap();
        assert_eq!(mesh.submeshes(), &[Submesh { index_offset: 0, index_count: 3 }]);
        assert_eq!(mesh.triangles().count(), 1);
    }

    #[test]
    fn rejects_partial_triangle() {
        let err = MeshData::new(tri(), vec![0, 1, 2, 0], vec![]).unwrap_err();
        assert_eq!(err, MeshError::NotTriangles { submesh: 0, count: 4 });
    }

    #[test]
    fn rejects_out_of_range_index() {
        let err = MeshData::new(tri(), vec![0, 1, 3], vec![]).unwrap_err();
        assert!(matches!(err, MeshError::IndexOutOfBounds { value: 3, .. }));
    }

    #[test]
    fn rejects_submesh_past_end() {
        let subs = vec![Submesh { index_offset: 3, index_count: 3 }];
        let err = MeshData::new(tri(), vec![0, 1, 2], subs).unwrap_err();
        assert!(matches!(err, MeshError::SubmeshOutOfRange { .. }));
    }

    #[test]
    fn rejects_empty_data() {
        assert_eq!(MeshData::new(vec![], vec![0], vec![]).unwrap_err(), MeshError::EmptyVertices);
        assert_eq!(MeshData::new(tri(), vec![], vec![]).unwrap_err(), MeshError::EmptyIndices);
    }

    #[test]
    fn cube_faces_wind_counter_clockwise_outward() {
        let cube = MeshData::cube([0.0; 3], 1.0);
        assert_eq!(cube.triangles().count(), 12);
        for [a, b, c] in cube.triangles() {
            let (pa, pb, pc) = (Vec3::from(a.position), Vec3::from(b.position), Vec3::from(c.position));
            let geometric = (pb - pa).cross(pc - pa).normalize();
            assert!(geometric.dot(Vec3::from(a.normal)) > 0.99);
        }
    }

    #[test]
    fn plane_and_quad_face_their_normals() {
        for mesh in [MeshData::plane([0.0; 3], 2.0), MeshData::quad([0.0; 3], 1.0, 1.0)] {
            for [a, b, c] in mesh.triangles() {
                let (pa, pb, pc) = (Vec3::from(a.position), Vec3::from(b.position), Vec3::from(c.position));
                let geometric = (pb - pa).cross(pc - pa).normalize();
                assert!(geometric.dot(Vec3::from(a.normal)) > 0.99);
            }
        }
    }
}
