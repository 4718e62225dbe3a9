//! Framebuffer Set
//!
//! Owns the render-target textures and framebuffers of every pass:
//!
//! | Group     | Color attachments                         | Depth |
//! |-----------|-------------------------------------------|-------|
//! | G-buffer  | albedo, position, normal, depth preview   | ✅    |
//! | Lighting  | final                                     | ✅    |
//! | Water     | reflection / refraction (one each)        | ✅    |
//!
//! Everything is sized to the display. A resize builds a complete new set and
//! only then destroys the old one; nothing is resized in place.

use glam::UVec2;

use crate::errors::{Result, StrataError};
use crate::renderer::backend::{FramebufferDesc, FramebufferId, GpuBackend, PixelFormat};
use crate::renderer::texture::TextureStore;
use crate::resources::handle::TextureHandle;
use crate::settings::RenderTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBuffer {
    pub color: TextureHandle,
    pub position: TextureHandle,
    pub normal: TextureHandle,
    pub depth_preview: TextureHandle,
    pub depth: TextureHandle,
    pub framebuffer: FramebufferId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightingTarget {
    pub final_color: TextureHandle,
    pub depth: TextureHandle,
    pub framebuffer: FramebufferId,
}

/// One colour + depth target, used for each water fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTarget {
    pub color: TextureHandle,
    pub depth: TextureHandle,
    pub framebuffer: FramebufferId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterTargets {
    pub reflection: ColorTarget,
    pub refraction: ColorTarget,
}

#[derive(Debug)]
pub struct FramebufferSet {
    size: UVec2,
    gbuffer: GBuffer,
    lighting: LightingTarget,
    water: Option<WaterTargets>,
}

impl FramebufferSet {
    /// Creates every target group. If any group fails, the groups already
    /// built are released before the error is returned.
    pub fn new(
        backend: &mut dyn GpuBackend,
        textures: &mut TextureStore,
        size: UVec2,
        with_water: bool,
    ) -> Result<Self> {
        let size = size.max(UVec2::ONE);
        let gbuffer = Self::create_gbuffer(backend, textures, size)?;
        let lighting = match Self::create_lighting_target(backend, textures, size) {
            Ok(lighting) => lighting,
            Err(err) => {
                gbuffer.release(backend, textures);
                return Err(err);
            }
        };
        let water = if with_water {
            match Self::create_water_targets(backend, textures, size) {
                Ok(water) => Some(water),
                Err(err) => {
                    gbuffer.release(backend, textures);
                    lighting.release(backend, textures);
                    return Err(err);
                }
            }
        } else {
            None
        };
        log::info!("Created framebuffers at {}x{}", size.x, size.y);
        Ok(Self {
            size,
            gbuffer,
            lighting,
            water,
        })
    }

    pub fn create_gbuffer(
        backend: &mut dyn GpuBackend,
        textures: &mut TextureStore,
        size: UVec2,
    ) -> Result<GBuffer> {
        let color = textures.create_render_target(backend, "gbuffer color", size, PixelFormat::Rgba8);
        let position =
            textures.create_render_target(backend, "gbuffer position", size, PixelFormat::Rgba16Float);
        let normal =
            textures.create_render_target(backend, "gbuffer normal", size, PixelFormat::Rgba16Float);
        let depth_preview =
            textures.create_render_target(backend, "gbuffer depth preview", size, PixelFormat::Rgba8);
        let depth = textures.create_render_target(backend, "gbuffer depth", size, PixelFormat::Depth32);

        let framebuffer = build(
            backend,
            textures,
            "gbuffer",
            &[color, position, normal, depth_preview],
            depth,
        )?;
        Ok(GBuffer {
            color,
            position,
            normal,
            depth_preview,
            depth,
            framebuffer,
        })
    }

    pub fn create_lighting_target(
        backend: &mut dyn GpuBackend,
        textures: &mut TextureStore,
        size: UVec2,
    ) -> Result<LightingTarget> {
        let target = create_color_target(backend, textures, "lighting", size)?;
        Ok(LightingTarget {
            final_color: target.color,
            depth: target.depth,
            framebuffer: target.framebuffer,
        })
    }

    pub fn create_water_targets(
        backend: &mut dyn GpuBackend,
        textures: &mut TextureStore,
        size: UVec2,
    ) -> Result<WaterTargets> {
        let reflection = create_color_target(backend, textures, "water reflection", size)?;
        let refraction = match create_color_target(backend, textures, "water refraction", size) {
            Ok(target) => target,
            Err(err) => {
                reflection.release(backend, textures);
                return Err(err);
            }
        };
        Ok(WaterTargets {
            reflection,
            refraction,
        })
    }

    /// Recreates every target at `size`.
    ///
    /// The replacement set is built before the current one is destroyed, so
    /// on failure `self` still holds live targets at the old size.
    pub fn resize(
        &mut self,
        backend: &mut dyn GpuBackend,
        textures: &mut TextureStore,
        size: UVec2,
    ) -> Result<()> {
        let next = Self::new(backend, textures, size, self.water.is_some())?;
        self.destroy(backend, textures);
        *self = next;
        Ok(())
    }

    pub fn destroy(&mut self, backend: &mut dyn GpuBackend, textures: &mut TextureStore) {
        self.gbuffer.release(backend, textures);
        self.lighting.release(backend, textures);
        if let Some(water) = self.water.take() {
            water.release(backend, textures);
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    #[inline]
    #[must_use]
    pub fn lighting(&self) -> &LightingTarget {
        &self.lighting
    }

    #[inline]
    #[must_use]
    pub fn water(&self) -> Option<&WaterTargets> {
        self.water.as_ref()
    }

    /// Texture the viewport shows for `target`.
    #[must_use]
    pub fn render_target_texture(&self, target: RenderTarget) -> TextureHandle {
        match target {
            RenderTarget::Color => self.gbuffer.color,
            RenderTarget::Position => self.gbuffer.position,
            RenderTarget::Normal => self.gbuffer.normal,
            RenderTarget::Depth => self.gbuffer.depth_preview,
            RenderTarget::Final => self.lighting.final_color,
        }
    }
}

impl GBuffer {
    fn release(&self, backend: &mut dyn GpuBackend, textures: &mut TextureStore) {
        backend.destroy_framebuffer(self.framebuffer);
        for t in [self.color, self.position, self.normal, self.depth_preview, self.depth] {
            textures.release(backend, t);
        }
    }
}

impl LightingTarget {
    fn release(&self, backend: &mut dyn GpuBackend, textures: &mut TextureStore) {
        backend.destroy_framebuffer(self.framebuffer);
        textures.release(backend, self.final_color);
        textures.release(backend, self.depth);
    }
}

impl ColorTarget {
    fn release(&self, backend: &mut dyn GpuBackend, textures: &mut TextureStore) {
        backend.destroy_framebuffer(self.framebuffer);
        textures.release(backend, self.color);
        textures.release(backend, self.depth);
    }
}

impl WaterTargets {
    fn release(&self, backend: &mut dyn GpuBackend, textures: &mut TextureStore) {
        self.reflection.release(backend, textures);
        self.refraction.release(backend, textures);
    }
}

fn create_color_target(
    backend: &mut dyn GpuBackend,
    textures: &mut TextureStore,
    label: &'static str,
    size: UVec2,
) -> Result<ColorTarget> {
    let color = textures.create_render_target(backend, label, size, PixelFormat::Rgba8);
    let depth = textures.create_render_target(backend, label, size, PixelFormat::Depth32);
    let framebuffer = build(backend, textures, label, &[color], depth)?;
    Ok(ColorTarget {
        color,
        depth,
        framebuffer,
    })
}

/// Creates a framebuffer; on incompleteness its textures are released and
/// the backend status is returned as [`StrataError::FramebufferIncomplete`].
fn build(
    backend: &mut dyn GpuBackend,
    textures: &mut TextureStore,
    label: &'static str,
    color: &[TextureHandle],
    depth: TextureHandle,
) -> Result<FramebufferId> {
    let color_ids = color
        .iter()
        .map(|&h| textures.get(h).map(|t| t.id))
        .collect::<Result<Vec<_>>>()?;
    let depth_id = textures.get(depth)?.id;

    backend
        .create_framebuffer(&FramebufferDesc {
            label,
            color: &color_ids,
            depth: Some(depth_id),
        })
        .map_err(|status| {
            log::error!("Framebuffer '{label}' is incomplete: {status}");
            for &h in color.iter().chain(std::iter::once(&depth)) {
                textures.release(backend, h);
            }
            StrataError::FramebufferIncomplete {
                target: label,
                status,
            }
        })
}
