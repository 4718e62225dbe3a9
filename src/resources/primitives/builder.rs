use crate::resources::mesh::{SubmeshData, VertexLayout};

/// Accumulates interleaved position/normal/uv vertices and triangles.
#[derive(Debug, Default)]
pub(crate) struct GeometryBuilder {
    vertices: Vec<f32>,
    indices: Vec<u32>,
    count: u32,
}

impl GeometryBuilder {
    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> u32 {
        self.vertices.extend_from_slice(&position);
        self.vertices.extend_from_slice(&normal);
        self.vertices.extend_from_slice(&uv);
        self.count += 1;
        self.count - 1
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn vertex_count(&self) -> u32 {
        self.count
    }

    pub fn finish(self) -> SubmeshData {
        SubmeshData {
            layout: VertexLayout::position_normal_uv(),
            vertices: self.vertices,
            indices: self.indices,
            material: 0,
        }
    }
}
