use super::builder::GeometryBuilder;
use crate::resources::mesh::SubmeshData;

pub struct PlaneOptions {
    pub width: f32,
    pub depth: f32,
    pub width_segments: u32,
    pub depth_segments: u32,
}

impl Default for PlaneOptions {
    fn default() -> Self {
        Self {
            width: 20.0,
            depth: 20.0,
            width_segments: 1,
            depth_segments: 1,
        }
    }
}

/// Horizontal plane in XZ facing +Y.
#[must_use]
pub fn create_plane(options: &PlaneOptions) -> SubmeshData {
    let grid_x = options.width_segments.max(1);
    let grid_z = options.depth_segments.max(1);
    let half_w = options.width / 2.0;
    let half_d = options.depth / 2.0;
    let segment_w = options.width / grid_x as f32;
    let segment_d = options.depth / grid_z as f32;

    let mut builder = GeometryBuilder::default();
    for iz in 0..=grid_z {
        let z = iz as f32 * segment_d - half_d;
        for ix in 0..=grid_x {
            let x = ix as f32 * segment_w - half_w;
            builder.push_vertex(
                [x, 0.0, z],
                [0.0, 1.0, 0.0],
                [ix as f32 / grid_x as f32, 1.0 - iz as f32 / grid_z as f32],
            );
        }
    }

    let row = grid_x + 1;
    for iz in 0..grid_z {
        for ix in 0..grid_x {
            let a = ix + row * iz;
            let b = ix + row * (iz + 1);
            let c = ix + 1 + row * (iz + 1);
            let d = ix + 1 + row * iz;
            builder.push_triangle(a, b, d);
            builder.push_triangle(b, c, d);
        }
    }
    builder.finish()
}

/// Two triangles covering clip space, used by the lighting pass.
#[must_use]
pub fn create_fullscreen_quad() -> SubmeshData {
    let mut builder = GeometryBuilder::default();
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    for (x, y) in corners {
        builder.push_vertex(
            [x, y, 0.0],
            [0.0, 0.0, 1.0],
            [(x + 1.0) * 0.5, (1.0 - y) * 0.5],
        );
    }
    builder.push_triangle(0, 1, 2);
    builder.push_triangle(0, 2, 3);
    builder.finish()
}
