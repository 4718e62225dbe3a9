//! Rendering Module
//!
//! [`Renderer`] is the explicit context object that owns every render
//! resource store and drives the frame composer:
//!
//! - [`backend`]: the GPU device seam ([`GpuBackend`]) and its two backends
//! - [`geometry`]: shared vertex/index buffers per mesh
//! - [`program`]: shader variants and their reflected vertex inputs
//! - [`texture`]: decoded images, render targets and cubemaps
//! - [`binding`]: memoised (submesh, program) vertex bindings
//! - [`uniform_arena`]: per-frame uniform block allocation
//! - [`framebuffer`]: G-buffer, lit and water targets
//! - [`composer`]: pass planning and recording
//!
//! # Frame
//!
//! ```text
//! Renderer::render(scene, camera)
//!   └─ FrameComposer::render
//!        ├─ UniformArena: begin_frame → globals + locals → end_frame
//!        ├─ passes (per plan): bind target → program → bindings → draws
//!        └─ GpuBackend::submit
//! ```

pub mod backend;
pub mod binding;
pub mod composer;
pub mod framebuffer;
pub mod geometry;
pub mod program;
pub mod shader_source;
pub mod texture;
pub mod uniform_arena;

use std::path::{Path, PathBuf};

use glam::{UVec2, Vec4};

pub use backend::{GpuBackend, HeadlessBackend, WgpuBackend};
pub use binding::VertexBindingCache;
pub use composer::{FrameComposer, FrameReport, FrameStep, PassKind, PassTarget};
pub use framebuffer::FramebufferSet;
pub use geometry::GeometryStore;
pub use program::ProgramRegistry;
pub use shader_source::{EmbeddedShaderLoader, FsShaderLoader, MemoryShaderLoader, ShaderSourceLoader};
pub use texture::TextureStore;
pub use uniform_arena::UniformArena;

use crate::errors::Result;
use crate::resources::handle::{ModelHandle, ProgramHandle, TextureHandle};
use crate::resources::image::{FileImageDecoder, ImageDecoder};
use crate::resources::mesh::{MeshData, ModelParser, SubmeshData};
use crate::resources::primitives::{
    create_box, create_fullscreen_quad, create_plane, create_sphere, PlaneOptions, Primitive,
    PrimitiveParser, SphereOptions,
};
use crate::scene::camera::Camera;
use crate::scene::scene::Scene;
use crate::settings::{ProgramSource, RenderTarget, RenderTopology, RendererSettings};
use self::backend::DeviceInfo;
use self::composer::{BuiltinMeshes, FrameContext, ProgramRoles};

/// External components the renderer reads content through.
pub struct Collaborators {
    pub shaders: Box<dyn ShaderSourceLoader>,
    pub images: Box<dyn ImageDecoder>,
    pub models: Box<dyn ModelParser>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            shaders: Box::new(EmbeddedShaderLoader::new()),
            images: Box::new(FileImageDecoder),
            models: Box::new(PrimitiveParser),
        }
    }
}

impl Collaborators {
    #[must_use]
    pub fn with_shaders(mut self, shaders: impl ShaderSourceLoader + 'static) -> Self {
        self.shaders = Box::new(shaders);
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: impl ImageDecoder + 'static) -> Self {
        self.images = Box::new(images);
        self
    }

    #[must_use]
    pub fn with_models(mut self, models: impl ModelParser + 'static) -> Self {
        self.models = Box::new(models);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Owns every render store and the backend they live on.
#[derive(Debug)]
pub struct Renderer<B: GpuBackend> {
    backend: B,
    settings: RendererSettings,
    collaborators: Collaborators,

    geometry: GeometryStore,
    textures: TextureStore,
    programs: ProgramRegistry,
    bindings: VertexBindingCache,
    arena: UniformArena,
    framebuffers: FramebufferSet,
    composer: FrameComposer,
}

impl<B: GpuBackend> Renderer<B> {
    /// Builds every store, the built-in programs and meshes, and the
    /// framebuffers at the configured display size.
    ///
    /// Fails on the first structural error: a program that does not compile,
    /// an incomplete framebuffer, or empty built-in geometry.
    pub fn new(mut backend: B, settings: RendererSettings, collaborators: Collaborators) -> Result<Self> {
        let info = backend.info();
        log::info!(
            "Initializing renderer on '{}' ({}, driver {})",
            info.name,
            info.backend,
            info.driver
        );

        let mut textures = TextureStore::new(&mut backend);
        let mut programs = ProgramRegistry::new()?;
        let mut geometry = GeometryStore::new();

        let roles = {
            let shaders = &*collaborators.shaders;
            let mut load = |source: &ProgramSource| -> Result<ProgramHandle> {
                programs.load_program(&mut backend, shaders, &source.path, &source.variant)
            };
            let sources = &settings.programs;
            ProgramRoles {
                forward: load(&sources.forward)?,
                geometry: load(&sources.geometry)?,
                lighting: load(&sources.lighting)?,
                skybox: load(&sources.skybox)?,
                water: load(&sources.water)?,
                debug_light: load(&sources.debug_light)?,
            }
        };

        let mut builtin = |submesh: SubmeshData, label: &str| {
            geometry.load_mesh(
                &mut backend,
                &MeshData {
                    submeshes: vec![submesh],
                },
                label,
            )
        };
        let meshes = BuiltinMeshes {
            fullscreen_quad: builtin(create_fullscreen_quad(), "fullscreen quad")?,
            skybox: builtin(create_box(2.0, 2.0, 2.0), "skybox")?,
            water_surface: builtin(
                create_plane(&PlaneOptions {
                    width: 1.0,
                    depth: 1.0,
                    ..PlaneOptions::default()
                }),
                "water surface",
            )?,
            light_marker: builtin(create_sphere(&SphereOptions::default()), "light marker")?,
        };

        let skybox = settings.skybox_faces.as_ref().map(|faces| {
            let faces: [PathBuf; 6] = faces.clone().map(PathBuf::from);
            textures.create_cubemap(&mut backend, &*collaborators.images, &faces)
        });

        let arena = UniformArena::new(&mut backend);
        let framebuffers = FramebufferSet::new(
            &mut backend,
            &mut textures,
            settings.display_size(),
            settings.water.is_some(),
        )?;

        let mut composer = FrameComposer::new(roles, meshes)
            .with_clear_color(Vec4::from_array(settings.clear_color))
            .with_water(settings.water)
            .with_debug_light_markers(settings.debug_light_markers);
        composer.set_topology(settings.topology);
        composer.set_inspected_target(settings.inspected_target);
        composer.set_skybox(skybox);

        log::info!(
            "Renderer ready: {} programs, {:?} topology",
            programs.len(),
            settings.topology
        );

        Ok(Self {
            backend,
            settings,
            collaborators,
            geometry,
            textures,
            programs,
            bindings: VertexBindingCache::new(),
            arena,
            framebuffers,
            composer,
        })
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Records and submits one frame.
    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<FrameReport> {
        let mut ctx = FrameContext {
            backend: &mut self.backend,
            geometry: &mut self.geometry,
            textures: &self.textures,
            programs: &self.programs,
            bindings: &mut self.bindings,
            arena: &mut self.arena,
            framebuffers: &self.framebuffers,
        };
        self.composer.render(&mut ctx, scene, camera)
    }

    /// Recreates every framebuffer at `size`.
    pub fn resize(&mut self, size: UVec2) -> Result<()> {
        if size == self.framebuffers.size() {
            return Ok(());
        }
        self.framebuffers
            .resize(&mut self.backend, &mut self.textures, size)?;
        self.settings.display_size = self.framebuffers.size().to_array();
        Ok(())
    }

    pub fn set_topology(&mut self, topology: RenderTopology) {
        if topology != self.composer.topology() {
            log::info!("Render topology: {topology:?}");
        }
        self.composer.set_topology(topology);
    }

    pub fn set_inspected_target(&mut self, target: RenderTarget) {
        self.composer.set_inspected_target(target);
    }

    /// Texture a viewport should display for `target`.
    #[must_use]
    pub fn render_target_texture(&self, target: RenderTarget) -> TextureHandle {
        self.framebuffers.render_target_texture(target)
    }

    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        self.backend.info()
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Loads a model through the model parser collaborator.
    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<ModelHandle> {
        self.geometry.load_model(
            &mut self.backend,
            &mut self.textures,
            &*self.collaborators.models,
            &*self.collaborators.images,
            path,
        )
    }

    /// Loads a built-in shape, whatever model parser is configured.
    pub fn load_primitive(&mut self, primitive: Primitive) -> Result<ModelHandle> {
        self.geometry.load_model(
            &mut self.backend,
            &mut self.textures,
            &PrimitiveParser,
            &*self.collaborators.images,
            primitive.path(),
        )
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<TextureHandle> {
        self.textures
            .load_texture_2d(&mut self.backend, &*self.collaborators.images, path)
    }

    /// Loads six faces (+X −X +Y −Y +Z −Z) and uses them as the skybox.
    /// The previous skybox cubemap is released.
    pub fn set_skybox(&mut self, faces: &[PathBuf; 6]) -> TextureHandle {
        let cubemap =
            self.textures
                .create_cubemap(&mut self.backend, &*self.collaborators.images, faces);
        if let Some(previous) = self.composer.set_skybox(Some(cubemap)) {
            self.textures.release(&mut self.backend, previous);
        }
        cubemap
    }

    /// Rebuilds every program whose source changed on disk.
    ///
    /// A program that fails to rebuild keeps its previous version; the
    /// failure is logged. Returns how many programs were replaced.
    pub fn reload_modified_programs(&mut self) -> usize {
        let shaders = &*self.collaborators.shaders;
        let mut reloaded = 0;
        for handle in self.programs.modified_programs(shaders) {
            match self.programs.reload(&mut self.backend, shaders, handle) {
                Ok(()) => reloaded += 1,
                Err(e) => log::error!("Keeping previous build of {handle}: {e}"),
            }
        }
        reloaded
    }

    /// Releases every GPU resource the stores own.
    pub fn destroy(&mut self) {
        self.framebuffers.destroy(&mut self.backend, &mut self.textures);
        if let Some(skybox) = self.composer.set_skybox(None) {
            self.textures.release(&mut self.backend, skybox);
        }
        self.arena.destroy(&mut self.backend);
        self.geometry.destroy(&mut self.backend);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    #[inline]
    #[must_use]
    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    #[inline]
    #[must_use]
    pub fn programs(&self) -> &ProgramRegistry {
        &self.programs
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &VertexBindingCache {
        &self.bindings
    }

    #[inline]
    #[must_use]
    pub fn arena(&self) -> &UniformArena {
        &self.arena
    }

    #[inline]
    #[must_use]
    pub fn framebuffers(&self) -> &FramebufferSet {
        &self.framebuffers
    }

    #[inline]
    #[must_use]
    pub fn composer(&self) -> &FrameComposer {
        &self.composer
    }
}
