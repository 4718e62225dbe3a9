use std::f32::consts::PI;

use super::builder::GeometryBuilder;
use crate::resources::mesh::SubmeshData;

pub struct SphereOptions {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for SphereOptions {
    fn default() -> Self {
        Self {
            radius: 0.5,
            width_segments: 32,
            height_segments: 16,
        }
    }
}

#[must_use]
pub fn create_sphere(options: &SphereOptions) -> SubmeshData {
    let radius = options.radius;
    let width_segments = options.width_segments.max(3);
    let height_segments = options.height_segments.max(2);

    let mut builder = GeometryBuilder::default();

    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let theta = v * PI;
        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let phi = u * 2.0 * PI;

            let normal = [
                -phi.cos() * theta.sin(),
                theta.cos(),
                phi.sin() * theta.sin(),
            ];
            let position = normal.map(|n| n * radius);
            builder.push_vertex(position, normal, [u, 1.0 - v]);
        }
    }

    // Poles only need one triangle per cell.
    let stride = width_segments + 1;
    for y in 0..height_segments {
        for x in 0..width_segments {
            let a = y * stride + x + 1;
            let b = y * stride + x;
            let c = (y + 1) * stride + x;
            let d = (y + 1) * stride + x + 1;

            if y != 0 {
                builder.push_triangle(a, b, d);
            }
            if y != height_segments - 1 {
                builder.push_triangle(b, c, d);
            }
        }
    }

    builder.finish()
}
