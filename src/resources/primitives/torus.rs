use std::f32::consts::PI;

use glam::Vec3;

use super::builder::GeometryBuilder;
use crate::resources::mesh::SubmeshData;

pub struct TorusOptions {
    pub radius: f32,
    pub tube: f32,
    pub radial_segments: u32,
    pub tubular_segments: u32,
}

impl Default for TorusOptions {
    fn default() -> Self {
        Self {
            radius: 0.5,
            tube: 0.2,
            radial_segments: 16,
            tubular_segments: 48,
        }
    }
}

/// Torus lying in the XY plane.
#[must_use]
pub fn create_torus(options: &TorusOptions) -> SubmeshData {
    let radial = options.radial_segments.max(3);
    let tubular = options.tubular_segments.max(3);

    let mut builder = GeometryBuilder::default();
    for j in 0..=radial {
        let v = j as f32 / radial as f32 * 2.0 * PI;
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * 2.0 * PI;
            let ring = options.radius + options.tube * v.cos();
            let position = Vec3::new(ring * u.cos(), ring * u.sin(), options.tube * v.sin());
            let center = Vec3::new(options.radius * u.cos(), options.radius * u.sin(), 0.0);
            builder.push_vertex(
                position.to_array(),
                (position - center).normalize().to_array(),
                [i as f32 / tubular as f32, j as f32 / radial as f32],
            );
        }
    }

    let row = tubular + 1;
    for j in 1..=radial {
        for i in 1..=tubular {
            let a = row * j + i - 1;
            let b = row * (j - 1) + i - 1;
            let c = row * (j - 1) + i;
            let d = row * j + i;
            builder.push_triangle(a, b, d);
            builder.push_triangle(b, c, d);
        }
    }
    builder.finish()
}
