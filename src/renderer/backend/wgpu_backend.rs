//! `wgpu` device backend
//!
//! Maps the GL-shaped [`GpuBackend`] calls onto `wgpu`:
//!
//! | GpuBackend concept   | wgpu realisation                                        |
//! |----------------------|---------------------------------------------------------|
//! | program              | two shader modules (one per validated stage)            |
//! | vertex binding       | vertex/index buffer slices + a vertex buffer layout     |
//! | program + binding    | render pipeline, cached by program, layout, raster      |
//! |   + raster + target  | state and attachment formats                            |
//! | uniform range        | bind group with a dynamic offset                        |
//! | clip plane           | per-pass slot of a uniform buffer read by the fragment  |
//! | depth blit           | texture-to-texture copy                                 |
//!
//! # Bind group layout
//!
//! | Group | Bindings                                                |
//! |-------|---------------------------------------------------------|
//! | 0     | global uniform block (dynamic offset)                   |
//! | 1     | local uniform block (dynamic offset)                    |
//! | 2     | four 2D texture units + one sampler                     |
//! | 3     | environment cubemap + clip plane block (dynamic offset) |
//!
//! Every pipeline uses the full layout; shaders declare what they read.
//!
//! Frame commands are recorded between `begin_pass` and `end_pass` and
//! replayed into a single command encoder by `submit`. Buffer and texture
//! writes go straight to the queue.

use std::borrow::Cow;
use std::num::NonZeroU64;

use glam::{UVec2, Vec4};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use super::{
    BindingId, BufferDesc, BufferId, BufferUsage, ClearValues, DepthTest, DeviceInfo,
    DeviceLimits, FilterMode, FramebufferDesc, FramebufferId, FramebufferStatus, GpuBackend,
    PassDesc, PixelFormat, ProgramDesc, ProgramId, RasterState, TEXTURE_UNITS, TextureDesc,
    TextureId, TextureKind, UniformRange, UniformSlot, VertexAttributeBinding, VertexBindingDesc,
    AttachmentInfo, check_framebuffer,
};
use crate::errors::Result;
use crate::renderer::program::{FRAGMENT_ENTRY, VERTEX_ENTRY};

/// Size of one clip plane block: plane + enable flag.
const CLIP_BLOCK_SIZE: u64 = 32;
const INITIAL_CLIP_SLOTS: u64 = 16;

// ============================================================================
// Resource records
// ============================================================================

struct BufferEntry {
    buffer: wgpu::Buffer,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: UVec2,
    format: PixelFormat,
    kind: TextureKind,
    filter: FilterMode,
    render_target: bool,
}

struct ProgramEntry {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    fragment_outputs: Vec<u32>,
}

struct BindingEntry {
    program: ProgramId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    base_vertex_offset: u64,
    stride: u32,
    attributes: SmallVec<[VertexAttributeBinding; 4]>,
}

struct FramebufferEntry {
    color: Vec<TextureId>,
    depth: Option<TextureId>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    stride: u32,
    attributes: SmallVec<[VertexAttributeBinding; 4]>,
    raster: RasterState,
    color_formats: SmallVec<[wgpu::TextureFormat; 4]>,
    depth_format: Option<wgpu::TextureFormat>,
}

// ============================================================================
// Recorded frame
// ============================================================================

/// Draw state as seen by one draw call.
#[derive(Clone, Copy)]
struct DrawState {
    raster: RasterState,
    program: Option<ProgramId>,
    binding: Option<BindingId>,
    global: Option<(BufferId, UniformRange)>,
    local: Option<(BufferId, UniformRange)>,
    units: [Option<TextureId>; TEXTURE_UNITS],
    environment: Option<TextureId>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            raster: RasterState::OPAQUE,
            program: None,
            binding: None,
            global: None,
            local: None,
            units: [None; TEXTURE_UNITS],
            environment: None,
        }
    }
}

struct RecordedDraw {
    state: DrawState,
    index_count: u32,
    first_index: u32,
}

struct RecordedPass {
    label: String,
    target: FramebufferId,
    clear: Option<ClearValues>,
    clip_plane: Option<Vec4>,
    draws: Vec<RecordedDraw>,
}

enum RecordedStep {
    Pass(RecordedPass),
    BlitDepth { src: FramebufferId, dst: FramebufferId },
}

/// Everything `set_*` needs for one draw, resolved before the pass begins.
struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_groups: [wgpu::BindGroup; 4],
    offsets: [u32; 3],
    vertex_buffer: wgpu::Buffer,
    vertex_offset: u64,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    first_index: u32,
}

// ============================================================================
// Backend
// ============================================================================

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: DeviceInfo,
    limits: DeviceLimits,
    next_id: u32,

    buffers: FxHashMap<BufferId, BufferEntry>,
    textures: FxHashMap<TextureId, TextureEntry>,
    programs: FxHashMap<ProgramId, ProgramEntry>,
    bindings: FxHashMap<BindingId, BindingEntry>,
    framebuffers: FxHashMap<FramebufferId, FramebufferEntry>,

    group_layouts: [wgpu::BindGroupLayout; 4],
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_groups: FxHashMap<(u32, BufferId, u64), wgpu::BindGroup>,
    texture_groups: FxHashMap<([Option<TextureId>; TEXTURE_UNITS], bool), wgpu::BindGroup>,
    environment_groups: FxHashMap<Option<TextureId>, wgpu::BindGroup>,

    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    fallback_2d: wgpu::TextureView,
    fallback_cube: wgpu::TextureView,
    clip_buffer: wgpu::Buffer,
    clip_slots: u64,

    state: DrawState,
    current: Option<RecordedPass>,
    recorded: Vec<RecordedStep>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("info", &self.info)
            .field("limits", &self.limits)
            .field("buffers", &self.buffers.len())
            .field("textures", &self.textures.len())
            .field("programs", &self.programs.len())
            .field("pipelines", &self.pipelines.len())
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Wraps a device and queue created by the caller.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let device_limits = device.limits();
        let limits = DeviceLimits {
            uniform_offset_alignment: device_limits.min_uniform_buffer_offset_alignment,
            max_uniform_block_size: device_limits
                .max_uniform_buffer_binding_size
                .try_into()
                .unwrap_or(u32::MAX),
        };

        let group_layouts = create_group_layouts(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("strata pipeline layout"),
            bind_group_layouts: &[
                Some(&group_layouts[0]),
                Some(&group_layouts[1]),
                Some(&group_layouts[2]),
                Some(&group_layouts[3]),
            ],
            immediate_size: 0,
        });

        let sampler = |label, filter, mipmap_filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter,
                ..Default::default()
            })
        };
        let linear_sampler = sampler(
            "linear sampler",
            wgpu::FilterMode::Linear,
            wgpu::MipmapFilterMode::Linear,
        );
        let nearest_sampler = sampler(
            "nearest sampler",
            wgpu::FilterMode::Nearest,
            wgpu::MipmapFilterMode::Nearest,
        );

        let fallback_2d = create_fallback(&device, &queue, 1, wgpu::TextureViewDimension::D2);
        let fallback_cube = create_fallback(&device, &queue, 6, wgpu::TextureViewDimension::Cube);
        let clip_slots = INITIAL_CLIP_SLOTS;
        let clip_buffer = create_clip_buffer(&device, clip_slots, limits.uniform_offset_alignment);

        Self {
            device,
            queue,
            info: DeviceInfo::default(),
            limits,
            next_id: 0,
            buffers: FxHashMap::default(),
            textures: FxHashMap::default(),
            programs: FxHashMap::default(),
            bindings: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            group_layouts,
            pipeline_layout,
            pipelines: FxHashMap::default(),
            uniform_groups: FxHashMap::default(),
            texture_groups: FxHashMap::default(),
            environment_groups: FxHashMap::default(),
            linear_sampler,
            nearest_sampler,
            fallback_2d,
            fallback_cube,
            clip_buffer,
            clip_slots,
            state: DrawState::default(),
            current: None,
            recorded: Vec::new(),
        }
    }

    /// Fills the info panel strings from the adapter.
    #[must_use]
    pub fn with_adapter_info(mut self, info: &wgpu::AdapterInfo) -> Self {
        self.info = DeviceInfo {
            name: info.name.clone(),
            vendor: format!("{:#06x}", info.vendor),
            backend: format!("{:?}", info.backend),
            driver: format!("{} {}", info.driver, info.driver_info).trim().to_owned(),
        };
        self
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The `wgpu` texture behind `id`, for presenting or reading back.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(&id).map(|t| &t.texture)
    }

    #[must_use]
    pub fn texture_view(&self, id: TextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(&id).map(|t| &t.view)
    }

    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn invalidate_bind_groups(&mut self) {
        self.uniform_groups.clear();
        self.texture_groups.clear();
        self.environment_groups.clear();
    }

    fn record_state_change(&self, what: &str) -> bool {
        if self.current.is_none() {
            log::warn!("{what} outside a render pass is ignored");
            return false;
        }
        true
    }

    // ========================================================================
    // Submission
    // ========================================================================

    fn upload_clip_planes(&mut self) {
        let pass_count = self
            .recorded
            .iter()
            .filter(|s| matches!(s, RecordedStep::Pass(_)))
            .count() as u64;
        if pass_count > self.clip_slots {
            self.clip_slots = pass_count.next_power_of_two();
            self.clip_buffer =
                create_clip_buffer(&self.device, self.clip_slots, self.limits.uniform_offset_alignment);
            self.environment_groups.clear();
        }

        let stride = u64::from(self.limits.uniform_offset_alignment).max(CLIP_BLOCK_SIZE);
        let mut staging = vec![0u8; (stride * pass_count) as usize];
        let passes = self.recorded.iter().filter_map(|s| match s {
            RecordedStep::Pass(p) => Some(p),
            RecordedStep::BlitDepth { .. } => None,
        });
        for (slot, pass) in passes.enumerate() {
            let (plane, enabled) = match pass.clip_plane {
                Some(plane) => (plane, Vec4::X),
                None => (Vec4::ZERO, Vec4::ZERO),
            };
            let block = [plane.to_array(), enabled.to_array()];
            let start = slot * stride as usize;
            staging[start..start + CLIP_BLOCK_SIZE as usize]
                .copy_from_slice(bytemuck::cast_slice(&block));
        }
        if !staging.is_empty() {
            self.queue.write_buffer(&self.clip_buffer, 0, &staging);
        }
    }

    fn attachment_formats(
        &self,
        framebuffer: &FramebufferEntry,
    ) -> (SmallVec<[wgpu::TextureFormat; 4]>, Option<wgpu::TextureFormat>) {
        let format_of = |id: &TextureId| self.textures.get(id).map(|t| texture_format(t.format));
        (
            framebuffer.color.iter().filter_map(format_of).collect(),
            framebuffer.depth.as_ref().and_then(format_of),
        )
    }

    fn prepare_draw(
        &mut self,
        draw: &RecordedDraw,
        color_formats: &SmallVec<[wgpu::TextureFormat; 4]>,
        depth_format: Option<wgpu::TextureFormat>,
        clip_offset: u32,
    ) -> Option<PreparedDraw> {
        let state = draw.state;
        let (Some(program), Some(binding_id)) = (state.program, state.binding) else {
            log::warn!("Draw without a program or vertex binding is skipped");
            return None;
        };
        let binding = self.bindings.get(&binding_id)?;
        if binding.program != program {
            log::warn!(
                "Vertex binding {binding_id:?} was built for {:?}, not {program:?}; draw skipped",
                binding.program
            );
            return None;
        }
        let key = PipelineKey {
            program,
            stride: binding.stride,
            attributes: binding.attributes.clone(),
            raster: state.raster,
            color_formats: color_formats.clone(),
            depth_format,
        };
        let vertex_buffer = self.buffers.get(&binding.vertex_buffer)?.buffer.clone();
        let index_buffer = self.buffers.get(&binding.index_buffer)?.buffer.clone();
        let vertex_offset = binding.base_vertex_offset;

        let pipeline = self.pipeline(&key)?;
        let (global_group, global_offset) = self.uniform_group(0, state.global);
        let (local_group, local_offset) = self.uniform_group(1, state.local);
        let texture_group = self.texture_group(&state.units);
        let environment_group = self.environment_group(state.environment);

        Some(PreparedDraw {
            pipeline,
            bind_groups: [global_group, local_group, texture_group, environment_group],
            offsets: [global_offset, local_offset, clip_offset],
            vertex_buffer,
            vertex_offset,
            index_buffer,
            index_count: draw.index_count,
            first_index: draw.first_index,
        })
    }

    fn encode_pass(&mut self, encoder: &mut wgpu::CommandEncoder, pass: &RecordedPass, slot: u64) {
        let Some(framebuffer) = self.framebuffers.get(&pass.target) else {
            log::error!("Pass '{}' targets unknown framebuffer {:?}", pass.label, pass.target);
            return;
        };
        let (color_formats, depth_format) = self.attachment_formats(framebuffer);
        let color_views: Vec<wgpu::TextureView> = framebuffer
            .color
            .iter()
            .filter_map(|id| self.textures.get(id).map(|t| t.view.clone()))
            .collect();
        let depth_view = framebuffer
            .depth
            .and_then(|id| self.textures.get(&id).map(|t| t.view.clone()));

        let stride = u64::from(self.limits.uniform_offset_alignment).max(CLIP_BLOCK_SIZE);
        let clip_offset = (slot * stride) as u32;
        let prepared: Vec<PreparedDraw> = pass
            .draws
            .iter()
            .filter_map(|draw| self.prepare_draw(draw, &color_formats, depth_format, clip_offset))
            .collect();

        let load = match pass.clear {
            Some(clear) => wgpu::LoadOp::Clear(wgpu::Color {
                r: f64::from(clear.color.x),
                g: f64::from(clear.color.y),
                b: f64::from(clear.color.z),
                a: f64::from(clear.color.w),
            }),
            None => wgpu::LoadOp::Load,
        };
        let depth_load = match pass.clear {
            Some(clear) => wgpu::LoadOp::Clear(clear.depth),
            None => wgpu::LoadOp::Load,
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&pass.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_view.as_ref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for draw in &prepared {
            render_pass.set_pipeline(&draw.pipeline);
            render_pass.set_bind_group(0, &draw.bind_groups[0], &[draw.offsets[0]]);
            render_pass.set_bind_group(1, &draw.bind_groups[1], &[draw.offsets[1]]);
            render_pass.set_bind_group(2, &draw.bind_groups[2], &[]);
            render_pass.set_bind_group(3, &draw.bind_groups[3], &[draw.offsets[2]]);
            render_pass.set_vertex_buffer(0, draw.vertex_buffer.slice(draw.vertex_offset..));
            render_pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(draw.first_index..draw.first_index + draw.index_count, 0, 0..1);
        }
    }

    fn encode_depth_blit(&self, encoder: &mut wgpu::CommandEncoder, src: FramebufferId, dst: FramebufferId) {
        let depth_of = |fb: FramebufferId| {
            self.framebuffers
                .get(&fb)
                .and_then(|f| f.depth)
                .and_then(|id| self.textures.get(&id))
        };
        let (Some(src), Some(dst)) = (depth_of(src), depth_of(dst)) else {
            log::error!("Depth blit between framebuffers without depth attachments skipped");
            return;
        };
        if src.size != dst.size {
            log::error!(
                "Depth blit size mismatch: {}x{} → {}x{}",
                src.size.x,
                src.size.y,
                dst.size.x,
                dst.size.y
            );
            return;
        }
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: src.size.x,
                height: src.size.y,
                depth_or_array_layers: 1,
            },
        );
    }

    // ========================================================================
    // Caches
    // ========================================================================

    fn pipeline(&mut self, key: &PipelineKey) -> Option<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(key) {
            return Some(pipeline.clone());
        }
        let program = self.programs.get(&key.program)?;

        let attributes: Vec<wgpu::VertexAttribute> = key
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: vertex_format(a.components),
                offset: u64::from(a.offset),
                shader_location: a.location,
            })
            .collect();
        let blend = if key.raster.alpha_blend {
            wgpu::BlendState::ALPHA_BLENDING
        } else {
            wgpu::BlendState::REPLACE
        };
        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_formats
            .iter()
            .enumerate()
            .map(|(location, &format)| {
                let written = program.fragment_outputs.contains(&(location as u32));
                Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: if written {
                        wgpu::ColorWrites::ALL
                    } else {
                        wgpu::ColorWrites::empty()
                    },
                })
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&program.label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: u64::from(key.stride),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: key.raster.cull_back_faces.then_some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: Some(key.raster.depth_write),
                depth_compare: Some(match key.raster.depth_test {
                    DepthTest::Less => wgpu::CompareFunction::Less,
                    DepthTest::LessEqual => wgpu::CompareFunction::LessEqual,
                    DepthTest::Always => wgpu::CompareFunction::Always,
                }),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
            cache: None,
        });
        log::debug!("Created pipeline for '{}' ({} pipelines cached)", program.label, self.pipelines.len() + 1);
        self.pipelines.insert(key.clone(), pipeline.clone());
        Some(pipeline)
    }

    /// Bind group for a uniform slot plus its dynamic offset. An unbound
    /// slot falls back to offset 0 of the clip buffer so the layout is
    /// always satisfied.
    fn uniform_group(&mut self, group: u32, bound: Option<(BufferId, UniformRange)>) -> (wgpu::BindGroup, u32) {
        let (buffer_id, range) = bound
            .filter(|(id, _)| self.buffers.contains_key(id))
            .unwrap_or((
                BufferId(0),
                UniformRange {
                    offset: 0,
                    size: CLIP_BLOCK_SIZE,
                },
            ));
        let key = (group, buffer_id, range.size);
        if let Some(bind_group) = self.uniform_groups.get(&key) {
            return (bind_group.clone(), range.offset as u32);
        }
        let buffer = self
            .buffers
            .get(&buffer_id)
            .map_or(&self.clip_buffer, |b| &b.buffer);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform range"),
            layout: &self.group_layouts[group as usize],
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(range.size),
                }),
            }],
        });
        self.uniform_groups.insert(key, bind_group.clone());
        (bind_group, range.offset as u32)
    }

    fn texture_group(&mut self, units: &[Option<TextureId>; TEXTURE_UNITS]) -> wgpu::BindGroup {
        let units = units.map(|u| u.filter(|id| self.textures.contains_key(id)));
        let nearest = units[0]
            .and_then(|id| self.textures.get(&id))
            .is_some_and(|t| t.filter == FilterMode::Nearest);
        if let Some(bind_group) = self.texture_groups.get(&(units, nearest)) {
            return bind_group.clone();
        }
        let views: Vec<&wgpu::TextureView> = units
            .iter()
            .map(|unit| {
                unit.and_then(|id| self.textures.get(&id))
                    .map_or(&self.fallback_2d, |t| &t.view)
            })
            .collect();
        let sampler = if nearest {
            &self.nearest_sampler
        } else {
            &self.linear_sampler
        };
        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: TEXTURE_UNITS as u32,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture units"),
            layout: &self.group_layouts[2],
            entries: &entries,
        });
        self.texture_groups.insert((units, nearest), bind_group.clone());
        bind_group
    }

    fn environment_group(&mut self, cubemap: Option<TextureId>) -> wgpu::BindGroup {
        let cubemap = cubemap.filter(|id| self.textures.contains_key(id));
        if let Some(bind_group) = self.environment_groups.get(&cubemap) {
            return bind_group.clone();
        }
        let view = cubemap
            .and_then(|id| self.textures.get(&id))
            .map_or(&self.fallback_cube, |t| &t.view);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("environment"),
            layout: &self.group_layouts[3],
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.clip_buffer,
                        offset: 0,
                        size: NonZeroU64::new(CLIP_BLOCK_SIZE),
                    }),
                },
            ],
        });
        self.environment_groups.insert(cubemap, bind_group.clone());
        bind_group
    }
}

impl GpuBackend for WgpuBackend {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    // --- Buffers --------------------------------------------------------

    fn create_buffer(&mut self, desc: &BufferDesc<'_>, contents: Option<&[u8]>) -> BufferId {
        let usage = wgpu::BufferUsages::COPY_DST
            | match desc.usage {
                BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
                BufferUsage::Index => wgpu::BufferUsages::INDEX,
                BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
            };
        let buffer = match contents {
            Some(contents) if !contents.is_empty() => {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents,
                    usage,
                })
            }
            _ => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: desc.size.max(wgpu::COPY_BUFFER_ALIGNMENT),
                usage,
                mapped_at_creation: false,
            }),
        };
        let id = BufferId(self.next());
        self.buffers.insert(id, BufferEntry { buffer });
        id
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        match self.buffers.get(&buffer) {
            Some(entry) => self.queue.write_buffer(&entry.buffer, offset, data),
            None => log::warn!("write_buffer on unknown buffer {buffer:?}"),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.invalidate_bind_groups();
        }
    }

    // --- Textures -------------------------------------------------------

    fn create_texture(&mut self, desc: &TextureDesc<'_>, levels: &[&[u8]]) -> TextureId {
        let layers = match desc.kind {
            TextureKind::D2 => 1,
            TextureKind::Cube => 6,
        };
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if desc.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        }
        let format = texture_format(desc.format);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.size.x.max(1),
                height: desc.size.y.max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            dimension: Some(match desc.kind {
                TextureKind::D2 => wgpu::TextureViewDimension::D2,
                TextureKind::Cube => wgpu::TextureViewDimension::Cube,
            }),
            ..Default::default()
        });

        let mut size = desc.size.max(UVec2::ONE);
        for (level, data) in levels.iter().enumerate().take(desc.mip_levels.max(1) as usize) {
            let pixels = expand_to_texture_format(desc.format, data);
            write_texel_layer(&self.queue, &texture, desc.format, level as u32, 0, size, &pixels);
            size = (size / 2).max(UVec2::ONE);
        }

        let id = TextureId(self.next());
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                size: desc.size,
                format: desc.format,
                kind: desc.kind,
                filter: desc.filter,
                render_target: desc.render_target,
            },
        );
        id
    }

    fn write_cubemap_face(&mut self, texture: TextureId, face: u32, data: &[u8]) {
        let Some(entry) = self.textures.get(&texture) else {
            log::warn!("write_cubemap_face on unknown texture {texture:?}");
            return;
        };
        if entry.kind != TextureKind::Cube || face >= 6 {
            log::warn!("Face {face} is not writable on texture {texture:?}");
            return;
        }
        let pixels = expand_to_texture_format(entry.format, data);
        write_texel_layer(&self.queue, &entry.texture, entry.format, 0, face, entry.size, &pixels);
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.invalidate_bind_groups();
        }
    }

    // --- Programs and bindings -----------------------------------------

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        let module = |stage: &str, source: &str| {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} ({stage})", desc.label)),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_owned())),
            })
        };
        let vertex = module("vertex", &desc.program.vertex.source);
        let fragment = module("fragment", &desc.program.fragment.source);

        let id = ProgramId(self.next());
        self.programs.insert(
            id,
            ProgramEntry {
                label: desc.label.to_owned(),
                vertex,
                fragment,
                fragment_outputs: desc.program.fragment_outputs.clone(),
            },
        );
        Ok(id)
    }

    fn create_vertex_binding(&mut self, desc: &VertexBindingDesc<'_>) -> BindingId {
        let id = BindingId(self.next());
        self.bindings.insert(
            id,
            BindingEntry {
                program: desc.program,
                vertex_buffer: desc.vertex_buffer,
                index_buffer: desc.index_buffer,
                base_vertex_offset: desc.base_vertex_offset,
                stride: desc.stride,
                attributes: desc.attributes.iter().copied().collect(),
            },
        );
        id
    }

    // --- Framebuffers ---------------------------------------------------

    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDesc<'_>,
    ) -> std::result::Result<FramebufferId, FramebufferStatus> {
        let attachment = |id: &TextureId| {
            self.textures.get(id).map(|t| AttachmentInfo {
                size: t.size,
                format: t.format,
                render_target: t.render_target,
            })
        };
        let color: Vec<_> = desc.color.iter().map(attachment).collect();
        let depth = desc.depth.as_ref().map(attachment);
        check_framebuffer(&color, depth)?;

        let id = FramebufferId(self.next());
        self.framebuffers.insert(
            id,
            FramebufferEntry {
                color: desc.color.to_vec(),
                depth: desc.depth,
            },
        );
        Ok(id)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
    }

    // --- Frame commands -------------------------------------------------

    fn begin_pass(&mut self, desc: &PassDesc<'_>) {
        if let Some(open) = self.current.take() {
            log::warn!("Pass '{}' was not ended before '{}'", open.label, desc.label);
            self.recorded.push(RecordedStep::Pass(open));
        }
        // Texture units do not carry over: a previous pass may have bound
        // what is now an attachment.
        self.state = DrawState::default();
        self.current = Some(RecordedPass {
            label: desc.label.to_owned(),
            target: desc.target,
            clear: desc.clear,
            clip_plane: desc.clip_plane,
            draws: Vec::new(),
        });
    }

    fn set_raster_state(&mut self, state: RasterState) {
        if self.record_state_change("set_raster_state") {
            self.state.raster = state;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.record_state_change("use_program") {
            self.state.program = Some(program);
        }
    }

    fn bind_vertex_binding(&mut self, binding: BindingId) {
        if self.record_state_change("bind_vertex_binding") {
            self.state.binding = Some(binding);
        }
    }

    fn bind_uniform_range(&mut self, slot: UniformSlot, buffer: BufferId, range: UniformRange) {
        if !self.record_state_change("bind_uniform_range") {
            return;
        }
        match slot {
            UniformSlot::Global => self.state.global = Some((buffer, range)),
            UniformSlot::Local => self.state.local = Some((buffer, range)),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if !self.record_state_change("bind_texture") {
            return;
        }
        let is_cube = self
            .textures
            .get(&texture)
            .is_some_and(|t| t.kind == TextureKind::Cube);
        if is_cube {
            self.state.environment = Some(texture);
        } else if let Some(slot) = self.state.units.get_mut(unit as usize) {
            *slot = Some(texture);
        } else {
            log::warn!("Texture unit {unit} is out of range (max {TEXTURE_UNITS})");
        }
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        let state = self.state;
        match self.current.as_mut() {
            Some(pass) => pass.draws.push(RecordedDraw {
                state,
                index_count,
                first_index,
            }),
            None => log::warn!("draw_indexed outside a render pass is ignored"),
        }
    }

    fn end_pass(&mut self) {
        match self.current.take() {
            Some(pass) => self.recorded.push(RecordedStep::Pass(pass)),
            None => log::warn!("end_pass without begin_pass"),
        }
    }

    fn blit_depth(&mut self, src: FramebufferId, dst: FramebufferId) {
        if let Some(open) = self.current.take() {
            log::warn!("Depth blit inside pass '{}'; closing it first", open.label);
            self.recorded.push(RecordedStep::Pass(open));
        }
        self.recorded.push(RecordedStep::BlitDepth { src, dst });
    }

    fn submit(&mut self) {
        if let Some(open) = self.current.take() {
            log::warn!("Pass '{}' was still open at submit", open.label);
            self.recorded.push(RecordedStep::Pass(open));
        }
        self.upload_clip_planes();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strata frame"),
            });
        let steps = std::mem::take(&mut self.recorded);
        let mut slot = 0;
        for step in &steps {
            match step {
                RecordedStep::Pass(pass) => {
                    self.encode_pass(&mut encoder, pass, slot);
                    slot += 1;
                }
                RecordedStep::BlitDepth { src, dst } => {
                    self.encode_depth_blit(&mut encoder, *src, *dst);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn discard_frame(&mut self) {
        if let Some(open) = self.current.take() {
            log::warn!("Discarding open pass '{}'", open.label);
        }
        log::debug!("Discarding {} recorded frame steps", self.recorded.len());
        self.recorded.clear();
        self.state = DrawState::default();
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn create_group_layouts(device: &wgpu::Device) -> [wgpu::BindGroupLayout; 4] {
    let uniform = |binding, visibility| wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: None,
        },
        count: None,
    };
    let texture = |binding, view_dimension| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    };
    let layout = |label, entries: &[wgpu::BindGroupLayoutEntry]| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries,
        })
    };

    let mut unit_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..TEXTURE_UNITS as u32)
        .map(|i| texture(i, wgpu::TextureViewDimension::D2))
        .collect();
    unit_entries.push(wgpu::BindGroupLayoutEntry {
        binding: TEXTURE_UNITS as u32,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });

    [
        layout("global uniforms", &[uniform(0, wgpu::ShaderStages::VERTEX_FRAGMENT)]),
        layout("local uniforms", &[uniform(0, wgpu::ShaderStages::VERTEX_FRAGMENT)]),
        layout("texture units", &unit_entries),
        layout(
            "environment",
            &[
                texture(0, wgpu::TextureViewDimension::Cube),
                uniform(1, wgpu::ShaderStages::FRAGMENT),
            ],
        ),
    ]
}

fn create_clip_buffer(device: &wgpu::Device, slots: u64, alignment: u32) -> wgpu::Buffer {
    let stride = u64::from(alignment).max(CLIP_BLOCK_SIZE);
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("clip planes"),
        size: stride * slots,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// White 1×1 texture bound to units nothing was bound to.
fn create_fallback(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layers: u32,
    dimension: wgpu::TextureViewDimension,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("fallback texture"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: layers,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for layer in 0..layers {
        write_texel_layer(queue, &texture, PixelFormat::Rgba8, 0, layer, UVec2::ONE, &[255; 4]);
    }
    texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(dimension),
        ..Default::default()
    })
}

fn write_texel_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    format: PixelFormat,
    mip_level: u32,
    layer: u32,
    size: UVec2,
    pixels: &[u8],
) {
    let bytes_per_pixel = texture_bytes_per_pixel(format);
    let expected = (size.x * size.y * bytes_per_pixel) as usize;
    if pixels.len() < expected {
        log::warn!(
            "Texture upload of {} bytes is short of the {} bytes a {}x{} level needs",
            pixels.len(),
            expected,
            size.x,
            size.y
        );
        return;
    }
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        &pixels[..expected],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.x * bytes_per_pixel),
            rows_per_image: Some(size.y),
        },
        wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
    );
}

/// RGB has no `wgpu` format; it is stored as RGBA.
fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::R8 => wgpu::TextureFormat::R8Unorm,
        PixelFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Depth32 => wgpu::TextureFormat::Depth32Float,
    }
}

fn texture_bytes_per_pixel(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgb8 => 4,
        other => other.bytes_per_pixel(),
    }
}

fn expand_to_texture_format(format: PixelFormat, data: &[u8]) -> Cow<'_, [u8]> {
    match format {
        PixelFormat::Rgb8 => Cow::Owned(
            data.chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                .collect(),
        ),
        _ => Cow::Borrowed(data),
    }
}

fn vertex_format(components: u8) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}
