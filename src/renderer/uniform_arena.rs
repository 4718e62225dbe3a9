//! Uniform Arena
//!
//! A per-frame, append-only byte arena backing the single uniform buffer.
//!
//! # Frame protocol
//!
//! ```text
//! begin_frame()                      head = 0, arena mapped
//! push_global_block(view, ...)       camera + lights for one view
//! push_local_block(view, key, ...)   world + world-view-projection per draw
//! ...
//! end_frame(backend)                 one upload of [0, head), arena unmapped
//! global_range / local_range         only readable once unmapped
//! ```
//!
//! Every block starts at the device's uniform offset alignment (never less
//! than 16 bytes, the alignment of a `vec4`). A head that
//! is already aligned is not moved, so back-to-back blocks whose size is a
//! multiple of the alignment pack without padding.
//!
//! # Global block layout
//!
//! | Offset        | Field              |
//! |---------------|--------------------|
//! | 0             | camera position    |
//! | 12            | light count        |
//! | 16 + 80·i     | light `i`: kind, color (16), direction (32), position (48), radius (60), intensity (64) |
//!
//! The block always reserves room for [`MAX_LIGHTS`] lights so the shader's
//! fixed-size array never reads past the range. More lights than that is a
//! [`StrataError::UniformOverflow`] against the reserved block size.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::errors::{Result, StrataError};
use crate::renderer::backend::{BufferDesc, BufferId, BufferUsage, GpuBackend, UniformRange};
use crate::resources::handle::{EntityHandle, LightHandle};
use crate::scene::light::Light;

/// Lights the global block has room for.
pub const MAX_LIGHTS: usize = 16;
/// Bytes per light in the global block.
pub const LIGHT_STRIDE: u64 = 80;
/// Reserved size of one global block.
pub const GLOBAL_BLOCK_SIZE: u64 = global_block_bytes(MAX_LIGHTS);
/// Size of one local block: two column-major `mat4x4<f32>`.
pub const LOCAL_BLOCK_SIZE: u64 = 2 * std::mem::size_of::<Mat4>() as u64;

const VEC4_ALIGN: u64 = 16;
const SCALAR_ALIGN: u64 = 4;

/// Camera a set of blocks was serialised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformView {
    /// The real camera, also used by the refraction fill.
    Main,
    /// Camera mirrored about the water plane.
    WaterReflection,
}

/// What a local block is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawKey {
    Entity(EntityHandle),
    LightMarker(LightHandle),
    Skybox,
    WaterSurface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArenaState {
    Idle,
    Mapped,
}

/// Bytes the global block needs for `lights` lights.
#[inline]
#[must_use]
pub const fn global_block_bytes(lights: usize) -> u64 {
    16 + LIGHT_STRIDE * lights as u64
}

#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[derive(Debug)]
pub struct UniformArena {
    buffer: BufferId,
    staging: Vec<u8>,
    head: u64,
    alignment: u64,
    capacity: u64,
    state: ArenaState,
    globals: FxHashMap<UniformView, UniformRange>,
    locals: FxHashMap<(UniformView, DrawKey), UniformRange>,
}

impl UniformArena {
    /// Creates the backing buffer sized to the device's maximum uniform
    /// block size.
    pub fn new(backend: &mut dyn GpuBackend) -> Self {
        let limits = backend.limits();
        let capacity = u64::from(limits.max_uniform_block_size);
        let buffer = backend.create_buffer(
            &BufferDesc {
                label: "uniform arena",
                usage: BufferUsage::Uniform,
                size: capacity,
            },
            None,
        );
        log::debug!(
            "Uniform arena: {} bytes, offset alignment {}",
            capacity,
            limits.uniform_offset_alignment
        );
        Self {
            buffer,
            staging: vec![0; capacity as usize],
            head: 0,
            alignment: u64::from(limits.uniform_offset_alignment).max(VEC4_ALIGN),
            capacity,
            state: ArenaState::Idle,
            globals: FxHashMap::default(),
            locals: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Frame bracket
    // ========================================================================

    /// Resets the cursor and forgets last frame's ranges.
    pub fn begin_frame(&mut self) -> Result<()> {
        if self.state == ArenaState::Mapped {
            return Err(StrataError::FrameState("begin_frame called twice without end_frame"));
        }
        self.state = ArenaState::Mapped;
        self.head = 0;
        self.globals.clear();
        self.locals.clear();
        Ok(())
    }

    /// Uploads everything written this frame.
    pub fn end_frame(&mut self, backend: &mut dyn GpuBackend) -> Result<()> {
        if self.state != ArenaState::Mapped {
            return Err(StrataError::FrameState("end_frame called without begin_frame"));
        }
        if self.head > 0 {
            backend.write_buffer(self.buffer, 0, &self.staging[..self.head as usize]);
        }
        self.state = ArenaState::Idle;
        Ok(())
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Writes camera position and lights for `view`.
    pub fn push_global_block<'a>(
        &mut self,
        view: UniformView,
        camera_position: Vec3,
        lights: impl IntoIterator<Item = &'a Light>,
    ) -> Result<UniformRange> {
        self.ensure_mapped()?;
        let lights: Vec<&Light> = lights.into_iter().collect();
        let requested = global_block_bytes(lights.len());
        if requested > GLOBAL_BLOCK_SIZE {
            log::error!(
                "{} lights in the scene, the global block has room for {}",
                lights.len(),
                MAX_LIGHTS
            );
            return Err(StrataError::UniformOverflow {
                requested,
                capacity: GLOBAL_BLOCK_SIZE,
            });
        }

        let start = self.begin_block(GLOBAL_BLOCK_SIZE)?;
        self.push_vec3(camera_position);
        self.push_u32(lights.len() as u32);
        for light in &lights {
            self.align_head(VEC4_ALIGN);
            let (radius, intensity) = light.falloff();
            self.push_u32(light.type_code());
            self.push_vec3(light.color);
            self.push_vec3(light.direction);
            self.push_vec3(light.position);
            self.push_f32(radius);
            self.push_f32(intensity);
        }

        self.head = start + GLOBAL_BLOCK_SIZE;
        let range = UniformRange {
            offset: start,
            size: GLOBAL_BLOCK_SIZE,
        };
        self.globals.insert(view, range);
        Ok(range)
    }

    /// Writes `world` and `view_projection · world` for one draw.
    pub fn push_local_block(
        &mut self,
        view: UniformView,
        key: DrawKey,
        world: Mat4,
        view_projection: Mat4,
    ) -> Result<UniformRange> {
        if !self.globals.contains_key(&view) {
            return Err(StrataError::FrameState("local block pushed before the global block"));
        }
        let start = self.begin_block(LOCAL_BLOCK_SIZE)?;
        self.push_mat4(world);
        self.push_mat4(view_projection * world);

        let range = UniformRange {
            offset: start,
            size: self.head - start,
        };
        self.locals.insert((view, key), range);
        Ok(range)
    }

    // ========================================================================
    // Range lookup (after end_frame)
    // ========================================================================

    pub fn global_range(&self, view: UniformView) -> Result<UniformRange> {
        self.ensure_unmapped()?;
        self.globals
            .get(&view)
            .copied()
            .ok_or(StrataError::FrameState("no global block recorded for this view"))
    }

    pub fn local_range(&self, view: UniformView, key: DrawKey) -> Result<UniformRange> {
        self.ensure_unmapped()?;
        self.locals
            .get(&(view, key))
            .copied()
            .ok_or(StrataError::FrameState("no local block recorded for this draw"))
    }

    /// Local ranges recorded this frame, in no particular order.
    pub fn local_ranges(&self) -> impl Iterator<Item = (&(UniformView, DrawKey), &UniformRange)> {
        self.locals.iter()
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    #[inline]
    #[must_use]
    pub fn head(&self) -> u64 {
        self.head
    }

    #[inline]
    #[must_use]
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[inline]
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.state == ArenaState::Mapped
    }

    pub fn destroy(&mut self, backend: &mut dyn GpuBackend) {
        backend.destroy_buffer(self.buffer);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_unmapped(&self) -> Result<()> {
        if self.state == ArenaState::Mapped {
            return Err(StrataError::FrameState("uniform ranges read before end_frame"));
        }
        Ok(())
    }

    fn ensure_mapped(&self) -> Result<()> {
        if self.state != ArenaState::Mapped {
            return Err(StrataError::FrameState("uniform block pushed outside begin_frame/end_frame"));
        }
        Ok(())
    }

    /// Aligns the head to the block alignment and checks `size` fits.
    fn begin_block(&mut self, size: u64) -> Result<u64> {
        self.ensure_mapped()?;
        let start = align_up(self.head, self.alignment);
        if start + size > self.capacity {
            log::error!(
                "Uniform arena overflow: {} bytes needed, {} available",
                start + size,
                self.capacity
            );
            return Err(StrataError::UniformOverflow {
                requested: start + size,
                capacity: self.capacity,
            });
        }
        self.head = start;
        Ok(start)
    }

    fn align_head(&mut self, alignment: u64) {
        self.head = align_up(self.head, alignment);
    }

    fn push_bytes(&mut self, alignment: u64, bytes: &[u8]) {
        self.align_head(alignment);
        let start = self.head as usize;
        self.staging[start..start + bytes.len()].copy_from_slice(bytes);
        self.head += bytes.len() as u64;
    }

    fn push_u32(&mut self, value: u32) {
        self.push_bytes(SCALAR_ALIGN, bytemuck::bytes_of(&value));
    }

    fn push_f32(&mut self, value: f32) {
        self.push_bytes(SCALAR_ALIGN, bytemuck::bytes_of(&value));
    }

    fn push_vec3(&mut self, value: Vec3) {
        self.push_bytes(VEC4_ALIGN, bytemuck::bytes_of(&value.to_array()));
    }

    fn push_mat4(&mut self, value: Mat4) {
        self.push_bytes(VEC4_ALIGN, bytemuck::bytes_of(&value.to_cols_array()));
    }
}
