//! Procedural primitives
//!
//! All shapes share the [`VertexLayout::position_normal_uv`] layout so one
//! program can draw any of them. [`PrimitiveParser`] exposes them to the
//! geometry store as models under `primitive://<name>` paths.

mod box_shape;
mod builder;
mod cylinder;
mod plane;
mod sphere;
mod torus;

use std::path::Path;

pub use box_shape::create_box;
pub use cylinder::{create_cone, create_cylinder, CylinderOptions};
pub use plane::{create_fullscreen_quad, create_plane, PlaneOptions};
pub use sphere::{create_sphere, SphereOptions};
pub use torus::{create_torus, TorusOptions};

use crate::errors::{Result, StrataError};
use crate::resources::material::MaterialData;
use crate::resources::mesh::{MeshData, ModelParser, ParsedModel, SubmeshData};

/// Path scheme that routes a model load to the procedural generators.
pub const PRIMITIVE_SCHEME: &str = "primitive://";

/// Built-in shapes the editor can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Cube,
    Sphere,
    Cylinder,
    Cone,
    Torus,
    Plane,
}

impl Primitive {
    pub const ALL: [Self; 6] = [
        Self::Cube,
        Self::Sphere,
        Self::Cylinder,
        Self::Cone,
        Self::Torus,
        Self::Plane,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cube => "cube",
            Self::Sphere => "sphere",
            Self::Cylinder => "cylinder",
            Self::Cone => "cone",
            Self::Torus => "torus",
            Self::Plane => "plane",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// `primitive://<name>`
    #[must_use]
    pub fn path(self) -> String {
        format!("{PRIMITIVE_SCHEME}{}", self.name())
    }

    #[must_use]
    pub fn generate(self) -> SubmeshData {
        match self {
            Self::Cube => create_box(1.0, 1.0, 1.0),
            Self::Sphere => create_sphere(&SphereOptions::default()),
            Self::Cylinder => create_cylinder(&CylinderOptions::default()),
            Self::Cone => create_cone(0.5, 1.0, 32),
            Self::Torus => create_torus(&TorusOptions::default()),
            Self::Plane => create_plane(&PlaneOptions::default()),
        }
    }

    /// Single-submesh model with one untextured material.
    #[must_use]
    pub fn model(self) -> ParsedModel {
        ParsedModel {
            mesh: MeshData {
                submeshes: vec![self.generate()],
            },
            materials: vec![MaterialData {
                name: self.name().to_owned(),
                ..MaterialData::default()
            }],
        }
    }
}

/// [`ModelParser`] that understands `primitive://<name>` paths only.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimitiveParser;

impl ModelParser for PrimitiveParser {
    fn parse(&self, path: &Path) -> Result<ParsedModel> {
        let raw = path.to_string_lossy();
        raw.strip_prefix(PRIMITIVE_SCHEME)
            .and_then(Primitive::from_name)
            .map(Primitive::model)
            .ok_or_else(|| StrataError::Parse {
                path: path.to_path_buf(),
                message: "not a built-in primitive".to_owned(),
            })
    }
}
