//! Frame Composer
//!
//! Turns the scene into an ordered list of passes and records them on the
//! backend. Planning is a pure function of the topology, the inspected
//! target and which optional features are active, so the pass order can be
//! checked without a device.
//!
//! # Pass order
//!
//! ```text
//! Forward:   [reflection, refraction] → geometry(lit) → [debug lights] → [environment(lit)]
//!
//! Deferred:  [reflection, refraction] → geometry(gbuffer)
//!            → [environment(gbuffer)]      when a G-buffer attachment is inspected
//!            → lighting(lit) → depth blit(gbuffer → lit)
//!            → [debug lights] → [environment(lit)]   when the lit image is inspected
//! ```
//!
//! The environment pass draws the skybox and the water surface against
//! whichever target is both depth-complete and on screen.
//!
//! # Uniforms
//!
//! Every block of the frame is pushed up front, between
//! `begin_frame` and `end_frame`, so the arena is unmapped before the first
//! draw binds a range from it.

use glam::{Mat4, Vec3, Vec4};

use crate::errors::{Result, StrataError};
use crate::renderer::backend::{
    ClearValues, FramebufferId, GpuBackend, PassDesc, RasterState, UniformSlot,
};
use crate::renderer::binding::VertexBindingCache;
use crate::renderer::framebuffer::FramebufferSet;
use crate::renderer::geometry::GeometryStore;
use crate::renderer::program::{Program, ProgramRegistry};
use crate::renderer::texture::TextureStore;
use crate::renderer::uniform_arena::{DrawKey, UniformArena, UniformView};
use crate::resources::handle::{MaterialHandle, MeshHandle, ProgramHandle, TextureHandle};
use crate::resources::material::TextureSlot;
use crate::scene::camera::Camera;
use crate::scene::light::LightKind;
use crate::scene::scene::Scene;
use crate::settings::{RenderTarget, RenderTopology, WaterSettings};

/// Scale applied to the debug marker mesh at each point light.
pub const LIGHT_MARKER_SCALE: f32 = 0.25;

// ============================================================================
// Planning
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    WaterReflection,
    WaterRefraction,
    Geometry,
    Lighting,
    DebugLights,
    Environment,
}

impl PassKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WaterReflection => "water reflection",
            Self::WaterRefraction => "water refraction",
            Self::Geometry => "geometry",
            Self::Lighting => "lighting",
            Self::DebugLights => "debug lights",
            Self::Environment => "environment",
        }
    }
}

/// Framebuffer a pass renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassTarget {
    WaterReflection,
    WaterRefraction,
    GBuffer,
    Lit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    Pass { kind: PassKind, target: PassTarget },
    DepthBlit { src: PassTarget, dst: PassTarget },
}

/// Optional passes that are active this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassFeatures {
    pub water: bool,
    /// A skybox is loaded or water is enabled.
    pub environment: bool,
    pub debug_lights: bool,
}

/// Ordered steps of one frame.
#[must_use]
pub fn plan(topology: RenderTopology, inspected: RenderTarget, features: PassFeatures) -> Vec<FrameStep> {
    let pass = |kind, target| FrameStep::Pass { kind, target };
    let mut steps = Vec::with_capacity(8);

    if features.water {
        steps.push(pass(PassKind::WaterReflection, PassTarget::WaterReflection));
        steps.push(pass(PassKind::WaterRefraction, PassTarget::WaterRefraction));
    }

    match topology {
        RenderTopology::Forward => {
            steps.push(pass(PassKind::Geometry, PassTarget::Lit));
            if features.debug_lights {
                steps.push(pass(PassKind::DebugLights, PassTarget::Lit));
            }
            if features.environment {
                steps.push(pass(PassKind::Environment, PassTarget::Lit));
            }
        }
        RenderTopology::Deferred => {
            let inspecting_lit = inspected == RenderTarget::Final;
            steps.push(pass(PassKind::Geometry, PassTarget::GBuffer));
            if features.environment && !inspecting_lit {
                steps.push(pass(PassKind::Environment, PassTarget::GBuffer));
            }
            steps.push(pass(PassKind::Lighting, PassTarget::Lit));
            steps.push(FrameStep::DepthBlit {
                src: PassTarget::GBuffer,
                dst: PassTarget::Lit,
            });
            if features.debug_lights {
                steps.push(pass(PassKind::DebugLights, PassTarget::Lit));
            }
            if features.environment && inspecting_lit {
                steps.push(pass(PassKind::Environment, PassTarget::Lit));
            }
        }
    }
    steps
}

// ============================================================================
// Execution
// ============================================================================

/// Program used by each pass role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramRoles {
    pub forward: ProgramHandle,
    pub geometry: ProgramHandle,
    pub lighting: ProgramHandle,
    pub skybox: ProgramHandle,
    pub water: ProgramHandle,
    pub debug_light: ProgramHandle,
}

/// Meshes the composer draws besides scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinMeshes {
    pub fullscreen_quad: MeshHandle,
    pub skybox: MeshHandle,
    pub water_surface: MeshHandle,
    pub light_marker: MeshHandle,
}

/// What one frame did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub steps: Vec<FrameStep>,
    pub passes: usize,
    pub draw_calls: usize,
    pub depth_blits: usize,
    /// Entities drawn into the displayed image.
    pub entities_drawn: usize,
}

/// Stores the composer reads and writes while recording a frame.
pub struct FrameContext<'a> {
    pub backend: &'a mut dyn GpuBackend,
    pub geometry: &'a mut GeometryStore,
    pub textures: &'a TextureStore,
    pub programs: &'a ProgramRegistry,
    pub bindings: &'a mut VertexBindingCache,
    pub arena: &'a mut UniformArena,
    pub framebuffers: &'a FramebufferSet,
}

#[derive(Debug, Clone)]
pub struct FrameComposer {
    programs: ProgramRoles,
    meshes: BuiltinMeshes,
    topology: RenderTopology,
    inspected: RenderTarget,
    clear: ClearValues,
    water: Option<WaterSettings>,
    skybox: Option<TextureHandle>,
    debug_light_markers: bool,
}

impl FrameComposer {
    #[must_use]
    pub fn new(programs: ProgramRoles, meshes: BuiltinMeshes) -> Self {
        Self {
            programs,
            meshes,
            topology: RenderTopology::default(),
            inspected: RenderTarget::default(),
            clear: ClearValues {
                color: Vec4::new(0.1, 0.1, 0.1, 1.0),
                depth: 1.0,
            },
            water: None,
            skybox: None,
            debug_light_markers: true,
        }
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: Vec4) -> Self {
        self.clear.color = color;
        self
    }

    #[must_use]
    pub fn with_water(mut self, water: Option<WaterSettings>) -> Self {
        self.water = water;
        self
    }

    #[must_use]
    pub fn with_debug_light_markers(mut self, enabled: bool) -> Self {
        self.debug_light_markers = enabled;
        self
    }

    pub fn set_topology(&mut self, topology: RenderTopology) {
        self.topology = topology;
    }

    pub fn set_inspected_target(&mut self, target: RenderTarget) {
        self.inspected = target;
    }

    /// Replaces the skybox cubemap and returns the previous one.
    pub fn set_skybox(&mut self, cubemap: Option<TextureHandle>) -> Option<TextureHandle> {
        std::mem::replace(&mut self.skybox, cubemap)
    }

    #[inline]
    #[must_use]
    pub fn skybox(&self) -> Option<TextureHandle> {
        self.skybox
    }

    #[inline]
    #[must_use]
    pub fn topology(&self) -> RenderTopology {
        self.topology
    }

    #[inline]
    #[must_use]
    pub fn inspected_target(&self) -> RenderTarget {
        self.inspected
    }

    #[inline]
    #[must_use]
    pub fn programs(&self) -> &ProgramRoles {
        &self.programs
    }

    #[must_use]
    pub fn features(&self) -> PassFeatures {
        PassFeatures {
            water: self.water.is_some(),
            environment: self.skybox.is_some() || self.water.is_some(),
            debug_lights: self.debug_light_markers,
        }
    }

    /// Records one frame and submits it.
    pub fn render(&self, ctx: &mut FrameContext<'_>, scene: &Scene, camera: &Camera) -> Result<FrameReport> {
        let steps = plan(self.topology, self.inspected, self.features());

        ctx.arena.begin_frame()?;
        let pushed = self.push_uniforms(ctx.arena, scene, camera);
        ctx.arena.end_frame(ctx.backend)?;
        pushed?;

        let mut report = FrameReport::default();
        if let Err(err) = self.record_steps(ctx, scene, &steps, &mut report) {
            log::error!("Frame abandoned: {err}");
            ctx.backend.discard_frame();
            return Err(err);
        }
        ctx.backend.submit();

        log::trace!(
            "Frame: {} passes, {} draws, {} entities",
            report.passes,
            report.draw_calls,
            report.entities_drawn
        );
        report.steps = steps;
        Ok(report)
    }

    fn record_steps(
        &self,
        ctx: &mut FrameContext<'_>,
        scene: &Scene,
        steps: &[FrameStep],
        report: &mut FrameReport,
    ) -> Result<()> {
        for step in steps {
            match *step {
                FrameStep::Pass { kind, target } => {
                    self.run_pass(ctx, scene, kind, target, report)?;
                }
                FrameStep::DepthBlit { src, dst } => {
                    let (src, dst) = (self.framebuffer(ctx, src)?, self.framebuffer(ctx, dst)?);
                    ctx.backend.blit_depth(src, dst);
                    report.depth_blits += 1;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Uniforms
    // ------------------------------------------------------------------------

    fn push_uniforms(&self, arena: &mut UniformArena, scene: &Scene, camera: &Camera) -> Result<()> {
        push_view(arena, UniformView::Main, scene, camera)?;
        let view_projection = camera.view_projection();

        if self.debug_light_markers {
            for (handle, light) in scene.lights() {
                if let LightKind::Point { .. } = light.kind {
                    let world = Mat4::from_translation(light.position)
                        * Mat4::from_scale(Vec3::splat(LIGHT_MARKER_SCALE));
                    arena.push_local_block(
                        UniformView::Main,
                        DrawKey::LightMarker(handle),
                        world,
                        view_projection,
                    )?;
                }
            }
        }
        if self.skybox.is_some() {
            arena.push_local_block(
                UniformView::Main,
                DrawKey::Skybox,
                Mat4::IDENTITY,
                camera.rotation_view_projection(),
            )?;
        }
        if let Some(water) = self.water {
            let world = Mat4::from_translation(Vec3::new(0.0, water.height, 0.0))
                * Mat4::from_scale(Vec3::new(water.extent, 1.0, water.extent));
            arena.push_local_block(UniformView::Main, DrawKey::WaterSurface, world, view_projection)?;

            let mirrored = camera.mirrored(water.height);
            push_view(arena, UniformView::WaterReflection, scene, &mirrored)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------------

    fn framebuffer(&self, ctx: &FrameContext<'_>, target: PassTarget) -> Result<FramebufferId> {
        let fb = ctx.framebuffers;
        let water = || {
            fb.water().ok_or(StrataError::FrameState(
                "water pass planned without water targets",
            ))
        };
        Ok(match target {
            PassTarget::GBuffer => fb.gbuffer().framebuffer,
            PassTarget::Lit => fb.lighting().framebuffer,
            PassTarget::WaterReflection => water()?.reflection.framebuffer,
            PassTarget::WaterRefraction => water()?.refraction.framebuffer,
        })
    }

    fn clip_plane(&self, kind: PassKind) -> Option<Vec4> {
        let height = self.water.map_or(0.0, |w| w.height);
        match kind {
            PassKind::WaterReflection => Some(Vec4::new(0.0, 1.0, 0.0, -height)),
            PassKind::WaterRefraction => Some(Vec4::new(0.0, -1.0, 0.0, height)),
            _ => None,
        }
    }

    fn run_pass(
        &self,
        ctx: &mut FrameContext<'_>,
        scene: &Scene,
        kind: PassKind,
        target: PassTarget,
        report: &mut FrameReport,
    ) -> Result<()> {
        let framebuffer = self.framebuffer(ctx, target)?;
        let clear = match (kind, target) {
            (PassKind::DebugLights | PassKind::Environment, _) => None,
            // Zero alpha marks uncovered G-buffer pixels as background.
            (_, PassTarget::GBuffer) => Some(ClearValues {
                color: self.clear.color.truncate().extend(0.0),
                ..self.clear
            }),
            _ => Some(self.clear),
        };
        ctx.backend.begin_pass(&PassDesc {
            label: kind.label(),
            target: framebuffer,
            clear,
            clip_plane: self.clip_plane(kind),
        });

        match kind {
            PassKind::WaterReflection => {
                self.draw_entities(ctx, scene, UniformView::WaterReflection, true, report)?;
            }
            PassKind::WaterRefraction => {
                self.draw_entities(ctx, scene, UniformView::Main, true, report)?;
            }
            PassKind::Geometry => {
                let forward = self.topology == RenderTopology::Forward;
                let drawn = self.draw_entities(ctx, scene, UniformView::Main, forward, report)?;
                report.entities_drawn = drawn;
            }
            PassKind::Lighting => self.draw_lighting(ctx, report)?,
            PassKind::DebugLights => self.draw_light_markers(ctx, scene, report)?,
            PassKind::Environment => self.draw_environment(ctx, report)?,
        }

        ctx.backend.end_pass();
        report.passes += 1;
        Ok(())
    }

    /// Draws every entity; returns how many were drawn.
    ///
    /// Forward shading binds the global and the local range per entity; the
    /// G-buffer fill binds the local range only.
    fn draw_entities(
        &self,
        ctx: &mut FrameContext<'_>,
        scene: &Scene,
        view: UniformView,
        forward: bool,
        report: &mut FrameReport,
    ) -> Result<usize> {
        let role = if forward {
            self.programs.forward
        } else {
            self.programs.geometry
        };
        let programs = ctx.programs;
        let program = programs.get(role)?;
        ctx.backend.set_raster_state(RasterState::OPAQUE);
        ctx.backend.use_program(program.linked_id()?);

        let global = ctx.arena.global_range(view)?;
        let buffer = ctx.arena.buffer();
        let mut drawn = 0;
        for (handle, entity) in scene.entities() {
            let (mesh, materials) = {
                let model = ctx.geometry.model(entity.model)?;
                (model.mesh, model.materials.clone())
            };
            if forward {
                ctx.backend.bind_uniform_range(UniformSlot::Global, buffer, global);
            }
            let local = ctx.arena.local_range(view, DrawKey::Entity(handle))?;
            ctx.backend.bind_uniform_range(UniformSlot::Local, buffer, local);
            self.draw_mesh(ctx, program, mesh, Some(&materials), report)?;
            drawn += 1;
        }
        Ok(drawn)
    }

    fn draw_lighting(&self, ctx: &mut FrameContext<'_>, report: &mut FrameReport) -> Result<()> {
        let programs = ctx.programs;
        let program = programs.get(self.programs.lighting)?;
        ctx.backend.set_raster_state(RasterState::FULLSCREEN);
        ctx.backend.use_program(program.linked_id()?);

        let global = ctx.arena.global_range(UniformView::Main)?;
        ctx.backend
            .bind_uniform_range(UniformSlot::Global, ctx.arena.buffer(), global);

        let gbuffer = ctx.framebuffers.gbuffer();
        for (unit, texture) in [gbuffer.color, gbuffer.position, gbuffer.normal]
            .into_iter()
            .enumerate()
        {
            let id = ctx.textures.get(texture)?.id;
            ctx.backend.bind_texture(unit as u32, id);
        }
        self.draw_mesh(ctx, program, self.meshes.fullscreen_quad, None, report)
    }

    fn draw_light_markers(
        &self,
        ctx: &mut FrameContext<'_>,
        scene: &Scene,
        report: &mut FrameReport,
    ) -> Result<()> {
        let programs = ctx.programs;
        let program = programs.get(self.programs.debug_light)?;
        ctx.backend.set_raster_state(RasterState::OPAQUE);
        ctx.backend.use_program(program.linked_id()?);

        let buffer = ctx.arena.buffer();
        for (handle, light) in scene.lights() {
            if !matches!(light.kind, LightKind::Point { .. }) {
                continue;
            }
            let local = ctx
                .arena
                .local_range(UniformView::Main, DrawKey::LightMarker(handle))?;
            ctx.backend.bind_uniform_range(UniformSlot::Local, buffer, local);
            self.draw_mesh(ctx, program, self.meshes.light_marker, None, report)?;
        }
        Ok(())
    }

    fn draw_environment(&self, ctx: &mut FrameContext<'_>, report: &mut FrameReport) -> Result<()> {
        let programs = ctx.programs;
        let buffer = ctx.arena.buffer();

        if let Some(cubemap) = self.skybox {
            let program = programs.get(self.programs.skybox)?;
            ctx.backend.set_raster_state(RasterState::BACKGROUND);
            ctx.backend.use_program(program.linked_id()?);
            let local = ctx.arena.local_range(UniformView::Main, DrawKey::Skybox)?;
            ctx.backend.bind_uniform_range(UniformSlot::Local, buffer, local);
            ctx.backend.bind_texture(0, ctx.textures.get(cubemap)?.id);
            self.draw_mesh(ctx, program, self.meshes.skybox, None, report)?;
        }

        if self.water.is_some() {
            let Some(targets) = ctx.framebuffers.water() else {
                return Ok(());
            };
            let program = programs.get(self.programs.water)?;
            ctx.backend.set_raster_state(RasterState::TRANSLUCENT);
            ctx.backend.use_program(program.linked_id()?);
            let global = ctx.arena.global_range(UniformView::Main)?;
            let local = ctx.arena.local_range(UniformView::Main, DrawKey::WaterSurface)?;
            ctx.backend.bind_uniform_range(UniformSlot::Global, buffer, global);
            ctx.backend.bind_uniform_range(UniformSlot::Local, buffer, local);
            ctx.backend
                .bind_texture(0, ctx.textures.get(targets.reflection.color)?.id);
            ctx.backend
                .bind_texture(1, ctx.textures.get(targets.refraction.color)?.id);
            self.draw_mesh(ctx, program, self.meshes.water_surface, None, report)?;
        }
        Ok(())
    }

    /// Draws every submesh of `mesh`. With `materials`, unit 0 gets each
    /// submesh's albedo (white when absent) before its draw.
    fn draw_mesh(
        &self,
        ctx: &mut FrameContext<'_>,
        program: &Program,
        mesh: MeshHandle,
        materials: Option<&[MaterialHandle]>,
        report: &mut FrameReport,
    ) -> Result<()> {
        let submesh_count = ctx.geometry.mesh(mesh)?.submeshes.len();
        for index in 0..submesh_count {
            let binding = ctx
                .bindings
                .get_binding(ctx.backend, ctx.geometry, mesh, index, program)?;
            ctx.backend.bind_vertex_binding(binding);

            if let Some(materials) = materials {
                let albedo = match materials.get(index) {
                    Some(&material) => ctx.geometry.material(material)?.texture(TextureSlot::Albedo),
                    None => None,
                };
                let white = ctx.textures.defaults().white;
                ctx.backend
                    .bind_texture(0, ctx.textures.resolve(albedo, white)?);
            }

            let submesh = &ctx.geometry.mesh(mesh)?.submeshes[index];
            ctx.backend
                .draw_indexed(submesh.index_count(), submesh.first_index());
            report.draw_calls += 1;
        }
        Ok(())
    }
}

/// Global block plus one local block per entity for `camera`.
fn push_view(arena: &mut UniformArena, view: UniformView, scene: &Scene, camera: &Camera) -> Result<()> {
    arena.push_global_block(view, camera.position(), scene.lights().map(|(_, l)| l))?;
    let view_projection = camera.view_projection();
    for (handle, entity) in scene.entities() {
        arena.push_local_block(view, DrawKey::Entity(handle), entity.world_matrix(), view_projection)?;
    }
    Ok(())
}
