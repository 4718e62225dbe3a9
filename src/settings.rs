//! Renderer Settings & Render Topology Configuration
//!
//! This module defines the configuration consumed when the renderer is
//! created, and the two enums the editor flips at runtime:
//! [`RenderTopology`] and [`RenderTarget`].
//!
//! Settings are plain serde data so a JSON file can override any subset of
//! the defaults:
//!
//! ```rust,ignore
//! use strata::settings::{RendererSettings, RenderTopology};
//!
//! let settings = RendererSettings::from_json_str(r#"{ "topology": "Deferred" }"#)?;
//! assert_eq!(settings.topology, RenderTopology::Deferred);
//! ```

use std::path::Path;

use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

// ---------------------------------------------------------------------------
// RenderTopology
// ---------------------------------------------------------------------------

/// How the scene is shaded.
///
/// | Capability                 | `Forward` | `Deferred` |
/// |----------------------------|-----------|------------|
/// | Lights evaluated per draw  | ✅        | ❌         |
/// | G-buffer inspection        | ❌        | ✅         |
/// | Separate lighting pass     | ❌        | ✅         |
/// | Depth blit into lit target | ❌        | ✅         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderTopology {
    /// One geometry pass that binds global and local uniforms per entity.
    #[default]
    Forward,
    /// G-buffer geometry pass followed by a full-screen lighting pass.
    Deferred,
}

// ---------------------------------------------------------------------------
// RenderTarget
// ---------------------------------------------------------------------------

/// Render target shown by the editor viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderTarget {
    /// G-buffer albedo.
    Color,
    /// G-buffer world position.
    Position,
    /// G-buffer world normal.
    Normal,
    /// G-buffer depth visualisation.
    Depth,
    /// Lit composite.
    #[default]
    Final,
}

impl RenderTarget {
    pub const ALL: [Self; 5] = [
        Self::Color,
        Self::Position,
        Self::Normal,
        Self::Depth,
        Self::Final,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Color => "Color",
            Self::Position => "Position",
            Self::Normal => "Normal",
            Self::Depth => "Depth",
            Self::Final => "Final",
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-settings
// ---------------------------------------------------------------------------

/// Planar water surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterSettings {
    /// World-space height of the water plane.
    pub height: f32,
    /// Side length of the square water quad.
    pub extent: f32,
}

impl Default for WaterSettings {
    fn default() -> Self {
        Self {
            height: 0.0,
            extent: 20.0,
        }
    }
}

/// Shader file plus the variant define that selects one program from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSource {
    pub path: String,
    pub variant: String,
}

impl ProgramSource {
    #[must_use]
    pub fn new(path: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            variant: variant.into(),
        }
    }

    fn builtin(variant: &str) -> Self {
        Self::new(BUILTIN_SHADER, variant)
    }
}

/// Built-in shader file every default program is a variant of.
pub const BUILTIN_SHADER: &str = "engine.wgsl";

/// One program per role the frame composer draws with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramSources {
    /// Forward shading, also used to fill the water targets.
    pub forward: ProgramSource,
    /// Deferred G-buffer fill.
    pub geometry: ProgramSource,
    /// Deferred full-screen lighting.
    pub lighting: ProgramSource,
    pub skybox: ProgramSource,
    pub water: ProgramSource,
    pub debug_light: ProgramSource,
}

impl Default for ProgramSources {
    fn default() -> Self {
        Self {
            forward: ProgramSource::builtin("SHOW_TEXTURED_MESH"),
            geometry: ProgramSource::builtin("GEOMETRY_PASS"),
            lighting: ProgramSource::builtin("LIGHTING_PASS"),
            skybox: ProgramSource::builtin("SKYBOX"),
            water: ProgramSource::builtin("WATER_SURFACE"),
            debug_light: ProgramSource::builtin("DEBUG_LIGHT"),
        }
    }
}

/// Initial fly-camera placement and tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub front: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Units per second.
    pub speed: f32,
    /// Degrees per pixel of mouse drag.
    pub sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [-20.0, 10.0, 5.0],
            front: [20.0, -9.0, -5.0],
            fov: 60.0,
            near: 0.1,
            far: 100.0,
            speed: 15.0,
            sensitivity: 0.15,
        }
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Global configuration for renderer initialization.
///
/// | Field                 | Description                               | Default       |
/// |-----------------------|-------------------------------------------|---------------|
/// | `display_size`        | Size of every render target               | 1280 × 720    |
/// | `topology`            | Initial render topology                   | `Forward`     |
/// | `inspected_target`    | Target shown by the viewport              | `Final`       |
/// | `clear_color`         | Clear colour of colour attachments        | dark grey     |
/// | `water`               | Planar water, `None` disables it          | `None`        |
/// | `debug_light_markers` | Draw a marker at each point light         | `true`        |
/// | `programs`            | Shader file + variant per program role    | built-in      |
/// | `skybox_faces`        | Six cubemap face paths (+X −X +Y −Y +Z −Z)| `None`        |
/// | `camera`              | Initial camera                            | see type      |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub display_size: [u32; 2],
    pub topology: RenderTopology,
    pub inspected_target: RenderTarget,
    pub clear_color: [f32; 4],
    pub water: Option<WaterSettings>,
    pub debug_light_markers: bool,
    pub programs: ProgramSources,
    pub skybox_faces: Option<[String; 6]>,
    pub camera: CameraSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            display_size: [1280, 720],
            topology: RenderTopology::default(),
            inspected_target: RenderTarget::default(),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            water: None,
            debug_light_markers: true,
            programs: ProgramSources::default(),
            skybox_faces: None,
            camera: CameraSettings::default(),
        }
    }
}

impl RendererSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    #[inline]
    #[must_use]
    pub fn display_size(&self) -> UVec2 {
        UVec2::from_array(self.display_size)
    }
}
