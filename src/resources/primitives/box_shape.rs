use glam::Vec3;

use super::builder::GeometryBuilder;
use crate::resources::mesh::SubmeshData;

/// Axis-aligned box centred on the origin, 4 vertices per face.
#[must_use]
pub fn create_box(width: f32, height: f32, depth: f32) -> SubmeshData {
    let half = Vec3::new(width, height, depth) * 0.5;

    // (normal, u axis, v axis) with u × v = normal so corners wind CCW.
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    ];

    let mut builder = GeometryBuilder::default();
    for (normal, u, v) in faces {
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        let base = builder.vertex_count();
        for (su, sv) in corners {
            let p = (normal + u * su + v * sv) * half;
            builder.push_vertex(
                p.to_array(),
                normal.to_array(),
                [(su + 1.0) * 0.5, (sv + 1.0) * 0.5],
            );
        }
        builder.push_triangle(base, base + 1, base + 2);
        builder.push_triangle(base, base + 2, base + 3);
    }
    builder.finish()
}
