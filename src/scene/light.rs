use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Light kind requested through the editor interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    Directional,
    Point,
}

/// Kind-specific light parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point { radius: f32, intensity: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub name: String,
    pub color: Vec3,
    pub direction: Vec3,
    pub position: Vec3,
    pub kind: LightKind,
}

impl Light {
    pub const DEFAULT_RADIUS: f32 = 20.0;

    /// Light of the given type with the editor's default placement.
    #[must_use]
    pub fn instance(ty: LightType, name: impl Into<String>) -> Self {
        match ty {
            LightType::Directional => Self {
                name: name.into(),
                color: Vec3::ONE,
                direction: Vec3::NEG_ONE,
                position: Vec3::ZERO,
                kind: LightKind::Directional,
            },
            LightType::Point => Self {
                name: name.into(),
                color: Vec3::ONE,
                direction: Vec3::ONE,
                position: Vec3::new(0.0, 5.0, 0.0),
                kind: LightKind::Point {
                    radius: Self::DEFAULT_RADIUS,
                    intensity: 1.0,
                },
            },
        }
    }

    #[must_use]
    pub fn light_type(&self) -> LightType {
        match self.kind {
            LightKind::Directional => LightType::Directional,
            LightKind::Point { .. } => LightType::Point,
        }
    }

    /// Value of the `kind` field in the shader light struct.
    #[must_use]
    pub fn type_code(&self) -> u32 {
        match self.kind {
            LightKind::Directional => 0,
            LightKind::Point { .. } => 1,
        }
    }

    /// `(radius, intensity)`; directional lights have no falloff.
    #[must_use]
    pub fn falloff(&self) -> (f32, f32) {
        match self.kind {
            LightKind::Directional => (0.0, 1.0),
            LightKind::Point { radius, intensity } => (radius, intensity),
        }
    }
}
