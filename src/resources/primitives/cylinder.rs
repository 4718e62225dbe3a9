use std::f32::consts::PI;

use glam::Vec3;

use super::builder::GeometryBuilder;
use crate::resources::mesh::SubmeshData;

pub struct CylinderOptions {
    pub radius_top: f32,
    pub radius_bottom: f32,
    pub height: f32,
    pub radial_segments: u32,
}

impl Default for CylinderOptions {
    fn default() -> Self {
        Self {
            radius_top: 0.5,
            radius_bottom: 0.5,
            height: 1.0,
            radial_segments: 32,
        }
    }
}

/// Capped cylinder along Y. A zero top radius gives a cone.
#[must_use]
pub fn create_cylinder(options: &CylinderOptions) -> SubmeshData {
    let radial = options.radial_segments.max(3);
    let half_height = options.height / 2.0;
    let slope = (options.radius_bottom - options.radius_top) / options.height;

    let mut builder = GeometryBuilder::default();

    // Side wall: one ring at the top, one at the bottom.
    let ring = radial + 1;
    for y in 0..=1u32 {
        let v = y as f32;
        let radius = v * (options.radius_bottom - options.radius_top) + options.radius_top;
        for x in 0..=radial {
            let u = x as f32 / radial as f32;
            let theta = u * 2.0 * PI;
            let (sin, cos) = theta.sin_cos();
            let normal = Vec3::new(sin, slope, cos).normalize();
            builder.push_vertex(
                [radius * sin, half_height - v * options.height, radius * cos],
                normal.to_array(),
                [u, 1.0 - v],
            );
        }
    }
    for x in 0..radial {
        let a = x;
        let b = ring + x;
        let c = ring + x + 1;
        let d = x + 1;
        builder.push_triangle(a, b, d);
        builder.push_triangle(b, c, d);
    }

    if options.radius_top > 0.0 {
        push_cap(&mut builder, radial, options.radius_top, half_height, true);
    }
    if options.radius_bottom > 0.0 {
        push_cap(&mut builder, radial, options.radius_bottom, half_height, false);
    }

    builder.finish()
}

#[must_use]
pub fn create_cone(radius: f32, height: f32, radial_segments: u32) -> SubmeshData {
    create_cylinder(&CylinderOptions {
        radius_top: 0.0,
        radius_bottom: radius,
        height,
        radial_segments,
    })
}

fn push_cap(builder: &mut GeometryBuilder, radial: u32, radius: f32, half_height: f32, top: bool) {
    let sign = if top { 1.0 } else { -1.0 };
    let normal = [0.0, sign, 0.0];
    let y = half_height * sign;

    let center_start = builder.vertex_count();
    for _ in 0..radial {
        builder.push_vertex([0.0, y, 0.0], normal, [0.5, 0.5]);
    }
    let ring_start = builder.vertex_count();
    for x in 0..=radial {
        let theta = x as f32 / radial as f32 * 2.0 * PI;
        let (sin, cos) = theta.sin_cos();
        builder.push_vertex(
            [radius * sin, y, radius * cos],
            normal,
            [cos * 0.5 + 0.5, sin * 0.5 * sign + 0.5],
        );
    }

    for x in 0..radial {
        let c = center_start + x;
        let i = ring_start + x;
        if top {
            builder.push_triangle(i, i + 1, c);
        } else {
            builder.push_triangle(i + 1, i, c);
        }
    }
}
