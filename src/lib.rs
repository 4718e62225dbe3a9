//! # Strata
//!
//! Render-resource and frame-composition core of a 3D scene editor.
//!
//! The crate manages GPU-resident meshes, textures and shader programs,
//! allocates per-frame uniform data, and records forward or deferred frames
//! with optional planar water, skybox and light-marker passes. Everything
//! talks to the GPU through the [`GpuBackend`] trait, so the whole engine
//! runs against [`HeadlessBackend`] without a device.
//!
//! ## Modules
//!
//! - [`resources`]: CPU-side meshes, materials, images and procedural shapes
//! - [`scene`]: entities, lights, the fly camera and editor commands
//! - [`renderer`]: stores, uniform arena, framebuffers and the frame composer
//! - [`engine`]: scene + camera + renderer for one editor session
//! - [`settings`]: serialisable renderer configuration
//! - [`errors`]: the [`StrataError`] taxonomy

pub mod engine;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod settings;

pub use engine::Engine;
pub use errors::{Result, ShaderStage, StrataError};
pub use renderer::backend::{GpuBackend, HeadlessBackend, WgpuBackend};
pub use renderer::{Collaborators, FrameReport, Renderer};
pub use resources::{
    EntityHandle, FileImageDecoder, Image, ImageDecoder, LightHandle, MaterialHandle, MeshHandle,
    ModelHandle, ModelParser, ParsedModel, Primitive, PrimitiveParser, ProgramHandle,
    TextureHandle,
};
pub use scene::{
    ButtonState, Camera, CommandOutcome, FrameInput, Key, Light, LightType, Scene, SceneCommand,
    Transform,
};
pub use settings::{RenderTarget, RenderTopology, RendererSettings, WaterSettings};
