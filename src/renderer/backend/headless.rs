//! Command-recording backend
//!
//! Allocates ids, keeps resource metadata and buffer contents, validates
//! framebuffer completeness and appends every frame command to a log. Tests
//! and headless tooling inspect the log instead of pixels.

use glam::{UVec2, Vec4};
use rustc_hash::FxHashMap;

use super::{
    AttachmentInfo, BindingId, BufferDesc, BufferId, BufferUsage, DeviceInfo, DeviceLimits,
    FilterMode, FramebufferDesc, FramebufferId, FramebufferStatus, GpuBackend, PassDesc,
    PixelFormat, ProgramDesc, ProgramId, RasterState, TextureDesc, TextureId, TextureKind,
    UniformRange, UniformSlot, VertexAttributeBinding, VertexBindingDesc, check_framebuffer,
};
use crate::errors::Result;

/// One recorded device command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    WriteBuffer {
        buffer: BufferId,
        offset: u64,
        len: usize,
    },
    BeginPass {
        label: String,
        target: FramebufferId,
        clear: bool,
        clip_plane: Option<Vec4>,
    },
    SetRasterState(RasterState),
    UseProgram(ProgramId),
    BindVertexBinding(BindingId),
    BindUniformRange {
        slot: UniformSlot,
        buffer: BufferId,
        range: UniformRange,
    },
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
    },
    EndPass,
    BlitDepth {
        src: FramebufferId,
        dst: FramebufferId,
    },
    Submit,
    /// The frame recorded since the last submit was abandoned.
    DiscardFrame,
}

/// Metadata kept for every live texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub label: String,
    pub size: UVec2,
    pub format: PixelFormat,
    pub kind: TextureKind,
    pub filter: FilterMode,
    pub mip_levels: u32,
    pub render_target: bool,
    /// Number of mip levels supplied at creation.
    pub uploaded_levels: u32,
    pub faces_written: [bool; 6],
}

/// A created vertex binding with its attributes copied out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBindingRecord {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub base_vertex_offset: u64,
    pub stride: u32,
    pub attributes: Vec<VertexAttributeBinding>,
}

#[derive(Debug)]
struct BufferRecord {
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    limits: DeviceLimits,
    next_id: u32,
    buffers: FxHashMap<BufferId, BufferRecord>,
    buffers_created: usize,
    textures: FxHashMap<TextureId, TextureInfo>,
    programs: FxHashMap<ProgramId, String>,
    bindings: FxHashMap<BindingId, VertexBindingRecord>,
    framebuffers: FxHashMap<FramebufferId, (Vec<TextureId>, Option<TextureId>)>,
    commands: Vec<Command>,
    in_pass: bool,
    fail_framebuffer: Option<(usize, FramebufferStatus)>,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Makes the next `create_framebuffer` call report `status`.
    pub fn fail_next_framebuffer(&mut self, status: FramebufferStatus) {
        self.fail_framebuffer_after(0, status);
    }

    /// Lets `successes` framebuffers through, then fails the next one.
    pub fn fail_framebuffer_after(&mut self, successes: usize, status: FramebufferStatus) {
        self.fail_framebuffer = Some((successes, status));
    }

    /// Whether a pass is open.
    #[must_use]
    pub fn in_pass(&self) -> bool {
        self.in_pass
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    #[must_use]
    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    #[must_use]
    pub fn buffer_usage(&self, buffer: BufferId) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|b| b.usage)
    }

    #[must_use]
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Buffers created over the backend's lifetime, destroyed ones included.
    #[must_use]
    pub fn buffers_created(&self) -> usize {
        self.buffers_created
    }

    #[must_use]
    pub fn texture_info(&self, texture: TextureId) -> Option<&TextureInfo> {
        self.textures.get(&texture)
    }

    #[must_use]
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn program_label(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(&program).map(String::as_str)
    }

    #[must_use]
    pub fn vertex_binding(&self, binding: BindingId) -> Option<&VertexBindingRecord> {
        self.bindings.get(&binding)
    }

    #[must_use]
    pub fn vertex_binding_count(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    fn next(&mut self) -> u32 {
        // 0 is never handed out so a zeroed id is recognisably invalid.
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, command: Command) {
        if !self.in_pass {
            log::warn!("Headless backend: {command:?} recorded outside a pass");
        }
        self.commands.push(command);
    }

    fn attachment(&self, texture: TextureId) -> Option<AttachmentInfo> {
        self.textures.get(&texture).map(|t| AttachmentInfo {
            size: t.size,
            format: t.format,
            render_target: t.render_target,
        })
    }
}

impl GpuBackend for HeadlessBackend {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Headless".to_owned(),
            vendor: "strata".to_owned(),
            backend: "command log".to_owned(),
            driver: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>, contents: Option<&[u8]>) -> BufferId {
        let id = BufferId(self.next());
        let mut data = vec![0; desc.size as usize];
        if let Some(contents) = contents {
            let n = contents.len().min(data.len());
            data[..n].copy_from_slice(&contents[..n]);
        }
        log::debug!("Headless buffer {:?} '{}' ({} bytes)", id, desc.label, desc.size);
        self.buffers.insert(
            id,
            BufferRecord {
                usage: desc.usage,
                data,
            },
        );
        self.buffers_created += 1;
        id
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        if let Some(record) = self.buffers.get_mut(&buffer) {
            let start = (offset as usize).min(record.data.len());
            let end = (start + data.len()).min(record.data.len());
            record.data[start..end].copy_from_slice(&data[..end - start]);
        }
        self.commands.push(Command::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>, levels: &[&[u8]]) -> TextureId {
        let id = TextureId(self.next());
        self.textures.insert(
            id,
            TextureInfo {
                label: desc.label.to_owned(),
                size: desc.size,
                format: desc.format,
                kind: desc.kind,
                filter: desc.filter,
                mip_levels: desc.mip_levels,
                render_target: desc.render_target,
                uploaded_levels: levels.len() as u32,
                faces_written: [false; 6],
            },
        );
        id
    }

    fn write_cubemap_face(&mut self, texture: TextureId, face: u32, _data: &[u8]) {
        if let Some(info) = self.textures.get_mut(&texture)
            && let Some(slot) = info.faces_written.get_mut(face as usize)
        {
            *slot = true;
        }
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        let id = ProgramId(self.next());
        self.programs.insert(id, desc.label.to_owned());
        Ok(id)
    }

    fn create_vertex_binding(&mut self, desc: &VertexBindingDesc<'_>) -> BindingId {
        let id = BindingId(self.next());
        self.bindings.insert(
            id,
            VertexBindingRecord {
                program: desc.program,
                vertex_buffer: desc.vertex_buffer,
                index_buffer: desc.index_buffer,
                base_vertex_offset: desc.base_vertex_offset,
                stride: desc.stride,
                attributes: desc.attributes.to_vec(),
            },
        );
        id
    }

    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDesc<'_>,
    ) -> std::result::Result<FramebufferId, FramebufferStatus> {
        match self.fail_framebuffer.take() {
            Some((0, status)) => return Err(status),
            Some((n, status)) => self.fail_framebuffer = Some((n - 1, status)),
            None => {}
        }
        let color: Vec<_> = desc.color.iter().map(|&t| self.attachment(t)).collect();
        let depth = desc.depth.map(|t| self.attachment(t));
        check_framebuffer(&color, depth)?;

        let id = FramebufferId(self.next());
        self.framebuffers
            .insert(id, (desc.color.to_vec(), desc.depth));
        Ok(id)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
    }

    fn begin_pass(&mut self, desc: &PassDesc<'_>) {
        if self.in_pass {
            log::warn!("Headless backend: pass '{}' begun inside another pass", desc.label);
        }
        self.in_pass = true;
        self.commands.push(Command::BeginPass {
            label: desc.label.to_owned(),
            target: desc.target,
            clear: desc.clear.is_some(),
            clip_plane: desc.clip_plane,
        });
    }

    fn set_raster_state(&mut self, state: RasterState) {
        self.record(Command::SetRasterState(state));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.record(Command::UseProgram(program));
    }

    fn bind_vertex_binding(&mut self, binding: BindingId) {
        self.record(Command::BindVertexBinding(binding));
    }

    fn bind_uniform_range(&mut self, slot: UniformSlot, buffer: BufferId, range: UniformRange) {
        self.record(Command::BindUniformRange {
            slot,
            buffer,
            range,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.record(Command::BindTexture { unit, texture });
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        self.record(Command::DrawIndexed {
            index_count,
            first_index,
        });
    }

    fn end_pass(&mut self) {
        self.record(Command::EndPass);
        self.in_pass = false;
    }

    fn blit_depth(&mut self, src: FramebufferId, dst: FramebufferId) {
        self.commands.push(Command::BlitDepth { src, dst });
    }

    fn submit(&mut self) {
        self.commands.push(Command::Submit);
    }

    fn discard_frame(&mut self) {
        self.in_pass = false;
        self.commands.push(Command::DiscardFrame);
    }
}
