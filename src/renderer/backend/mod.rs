//! GPU device seam
//!
//! The stores and the frame composer never talk to a graphics API directly.
//! They drive a [`GpuBackend`], a small GL-shaped command interface:
//! create/destroy resources, then per frame `begin_pass` → state and draws →
//! `end_pass`, and finally `submit`.
//!
//! Two implementations ship with the crate:
//!
//! - [`HeadlessBackend`] records every command in an inspectable log and
//!   validates framebuffer completeness. It needs no GPU.
//! - [`WgpuBackend`] drives a caller-supplied `wgpu` device and queue.

mod headless;
mod wgpu_backend;

pub use headless::{Command, HeadlessBackend, TextureInfo, VertexBindingRecord};
pub use wgpu_backend::WgpuBackend;

use glam::{UVec2, Vec4};

use crate::errors::Result;
use crate::renderer::program::CompiledProgram;

macro_rules! define_gpu_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

define_gpu_id!(
    /// Backend buffer object.
    BufferId,
    /// Backend texture object.
    TextureId,
    /// Backend program object.
    ProgramId,
    /// Vertex binding (VAO-equivalent) tying a program to vertex/index buffers.
    BindingId,
    /// Framebuffer object.
    FramebufferId,
);

// ============================================================================
// Resource descriptors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub usage: BufferUsage,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Rgba16Float,
    Depth32,
}

impl PixelFormat {
    #[must_use]
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32)
    }

    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::Rg8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Depth32 => 4,
            Self::Rgba16Float => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Texture creation parameters. Wrapping is always clamp-to-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub size: UVec2,
    pub format: PixelFormat,
    pub kind: TextureKind,
    pub filter: FilterMode,
    pub mip_levels: u32,
    /// Usable as a framebuffer attachment.
    pub render_target: bool,
}

/// A program both of whose stages have already been validated.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub program: &'a CompiledProgram,
}

/// One resolved attribute of a vertex binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeBinding {
    pub location: u32,
    pub components: u8,
    /// Byte offset inside one vertex.
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBindingDesc<'a> {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    /// Byte offset of the submesh's first vertex in `vertex_buffer`.
    pub base_vertex_offset: u64,
    pub stride: u32,
    pub attributes: &'a [VertexAttributeBinding],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferDesc<'a> {
    pub label: &'a str,
    pub color: &'a [TextureId],
    pub depth: Option<TextureId>,
}

/// Why a framebuffer cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Undefined,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDrawBuffer,
    Unsupported,
    AttachmentSizeMismatch,
}

impl std::fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Undefined => "UNDEFINED",
            Self::IncompleteAttachment => "INCOMPLETE_ATTACHMENT",
            Self::MissingAttachment => "MISSING_ATTACHMENT",
            Self::IncompleteDrawBuffer => "INCOMPLETE_DRAW_BUFFER",
            Self::Unsupported => "UNSUPPORTED",
            Self::AttachmentSizeMismatch => "ATTACHMENT_SIZE_MISMATCH",
        })
    }
}

/// Attachment description used by [`check_framebuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub size: UVec2,
    pub format: PixelFormat,
    pub render_target: bool,
}

/// Completeness rules shared by every backend.
pub fn check_framebuffer(
    color: &[Option<AttachmentInfo>],
    depth: Option<Option<AttachmentInfo>>,
) -> std::result::Result<(), FramebufferStatus> {
    if color.is_empty() && depth.is_none() {
        return Err(FramebufferStatus::MissingAttachment);
    }

    let mut size = None;
    let mut check = |info: Option<AttachmentInfo>,
                     want_depth: bool|
     -> std::result::Result<(), FramebufferStatus> {
        let info = info.ok_or(FramebufferStatus::Undefined)?;
        if !info.render_target || info.format.is_depth() != want_depth {
            return Err(FramebufferStatus::IncompleteAttachment);
        }
        match size {
            None => size = Some(info.size),
            Some(s) if s != info.size => return Err(FramebufferStatus::AttachmentSizeMismatch),
            Some(_) => {}
        }
        Ok(())
    };

    for info in color {
        check(*info, false)?;
    }
    if let Some(depth) = depth {
        check(depth, true)?;
    }
    Ok(())
}

// ============================================================================
// Pass and draw state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: Vec4,
    pub depth: f32,
}

/// Parameters of one render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDesc<'a> {
    pub label: &'a str,
    pub target: FramebufferId,
    /// `None` loads the existing contents.
    pub clear: Option<ClearValues>,
    /// Fragments with `dot(plane, vec4(world_pos, 1)) < 0` are discarded.
    pub clip_plane: Option<Vec4>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthTest {
    Less,
    LessEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub depth_test: DepthTest,
    pub depth_write: bool,
    pub cull_back_faces: bool,
    pub alpha_blend: bool,
}

impl RasterState {
    /// Opaque geometry.
    pub const OPAQUE: Self = Self {
        depth_test: DepthTest::Less,
        depth_write: true,
        cull_back_faces: true,
        alpha_blend: false,
    };

    /// Full-screen composition that ignores depth.
    pub const FULLSCREEN: Self = Self {
        depth_test: DepthTest::Always,
        depth_write: false,
        cull_back_faces: false,
        alpha_blend: false,
    };

    /// Skybox drawn at the far plane.
    pub const BACKGROUND: Self = Self {
        depth_test: DepthTest::LessEqual,
        depth_write: false,
        cull_back_faces: false,
        alpha_blend: false,
    };

    /// Depth-tested translucent surface.
    pub const TRANSLUCENT: Self = Self {
        depth_test: DepthTest::Less,
        depth_write: false,
        cull_back_faces: false,
        alpha_blend: true,
    };
}

/// Byte range inside a uniform buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformRange {
    pub offset: u64,
    pub size: u64,
}

impl UniformRange {
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Uniform block binding points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// Camera and lights.
    Global = 0,
    /// Per-draw matrices.
    Local = 1,
}

/// Limits the uniform arena must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub uniform_offset_alignment: u32,
    pub max_uniform_block_size: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            uniform_offset_alignment: 256,
            max_uniform_block_size: 65536,
        }
    }
}

/// Adapter and driver description for the info panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub backend: String,
    pub driver: String,
}

// ============================================================================
// The trait
// ============================================================================

/// Number of 2D texture units a draw can bind.
pub const TEXTURE_UNITS: usize = 4;

/// GL-shaped device interface driven by the stores and the composer.
///
/// Creation calls may happen at any time; draw-state calls are only valid
/// between `begin_pass` and `end_pass`. `submit` flushes the frame and
/// `discard_frame` abandons it.
pub trait GpuBackend {
    fn info(&self) -> DeviceInfo;
    fn limits(&self) -> DeviceLimits;

    // --- Buffers --------------------------------------------------------
    fn create_buffer(&mut self, desc: &BufferDesc<'_>, contents: Option<&[u8]>) -> BufferId;
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferId);

    // --- Textures -------------------------------------------------------
    /// `levels` holds the mip chain (level 0 first) of a 2D texture; it is
    /// empty for render targets and cubemaps.
    fn create_texture(&mut self, desc: &TextureDesc<'_>, levels: &[&[u8]]) -> TextureId;
    /// Uploads one face (0..6, order +X −X +Y −Y +Z −Z) of a cubemap.
    fn write_cubemap_face(&mut self, texture: TextureId, face: u32, data: &[u8]);
    fn destroy_texture(&mut self, texture: TextureId);

    // --- Programs and bindings -----------------------------------------
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId>;
    fn create_vertex_binding(&mut self, desc: &VertexBindingDesc<'_>) -> BindingId;

    // --- Framebuffers ---------------------------------------------------
    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDesc<'_>,
    ) -> std::result::Result<FramebufferId, FramebufferStatus>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    // --- Frame commands -------------------------------------------------
    fn begin_pass(&mut self, desc: &PassDesc<'_>);
    fn set_raster_state(&mut self, state: RasterState);
    fn use_program(&mut self, program: ProgramId);
    fn bind_vertex_binding(&mut self, binding: BindingId);
    fn bind_uniform_range(&mut self, slot: UniformSlot, buffer: BufferId, range: UniformRange);
    /// Binds a texture to a unit. Cubemaps always go to the environment slot.
    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    fn draw_indexed(&mut self, index_count: u32, first_index: u32);
    fn end_pass(&mut self);
    /// Copies the depth attachment of `src` into the depth attachment of `dst`.
    fn blit_depth(&mut self, src: FramebufferId, dst: FramebufferId);
    fn submit(&mut self);
    /// Drops everything recorded since the last `submit`, including an open
    /// pass. Called when recording a frame fails part way.
    fn discard_frame(&mut self);
}
