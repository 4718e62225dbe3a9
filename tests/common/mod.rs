//! Shared collaborators for the integration tests.
//!
//! - `MapDecoder`: in-memory images keyed by path, counting decode calls
//! - `MapParser`: in-memory models keyed by path, counting parse calls
//! - `TEST_SHADER`: a small variant template with deliberate failure modes

#![allow(dead_code)]

use std::cell::Cell;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use strata::errors::{Result, StrataError};
use strata::resources::{Image, ImageDecoder, MeshData, ModelParser, ParsedModel};

pub const ENGINE_SHADER: &str = include_str!("../../src/renderer/shaders/engine.wgsl");

/// Variants: `POSITION_ONLY`, `WITH_UV`, `BROKEN_LINK` (fragment reads a
/// varying the vertex stage never writes), `BROKEN_SYNTAX`.
pub const TEST_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

{$ if BROKEN_SYNTAX $}
fn oops( {
{$ endif $}

{$ if VERTEX $}
@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
{$ if WITH_UV $}
    @location(2) uv: vec2<f32>,
{$ endif $}
) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position, 1.0);
{$ if WITH_UV $}
    out.uv = uv;
{$ else $}
    out.uv = vec2<f32>(0.0, 0.0);
{$ endif $}
    return out;
}
{$ endif $}

{$ if FRAGMENT $}
{$ if BROKEN_LINK $}
@fragment
fn fs_main(@location(1) tint: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(tint, 1.0);
}
{$ else $}
@fragment
fn fs_main(v: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(v.uv, 0.0, 1.0);
}
{$ endif $}
{$ endif $}
"#;

// ============================================================================
// Image decoder
// ============================================================================

#[derive(Debug, Default)]
pub struct MapDecoder {
    images: FxHashMap<PathBuf, Image>,
    calls: Cell<usize>,
}

impl MapDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, image: Image) -> Self {
        self.images.insert(path.into(), image);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ImageDecoder for MapDecoder {
    fn decode(&self, path: &Path) -> Result<Image> {
        self.calls.set(self.calls.get() + 1);
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| StrataError::Decode {
                path: path.to_path_buf(),
                message: "not in test image map".into(),
            })
    }
}

// ============================================================================
// Model parser
// ============================================================================

#[derive(Debug, Default)]
pub struct MapParser {
    models: FxHashMap<PathBuf, ParsedModel>,
    calls: Cell<usize>,
}

impl MapParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, model: ParsedModel) -> Self {
        self.models.insert(path.into(), model);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ModelParser for MapParser {
    fn parse(&self, path: &Path) -> Result<ParsedModel> {
        self.calls.set(self.calls.get() + 1);
        self.models
            .get(path)
            .cloned()
            .ok_or_else(|| StrataError::AssetMissing(path.to_path_buf()))
    }
}

/// A model with no geometry at all.
pub fn empty_model() -> ParsedModel {
    ParsedModel {
        mesh: MeshData { submeshes: vec![] },
        materials: vec![],
    }
}
