//! Geometry Store
//!
//! Owns every mesh's GPU vertex/index buffers, the models that reference
//! meshes, and their materials.
//!
//! # Buffer layout
//!
//! A mesh owns exactly **one** vertex buffer and **one** index buffer. The
//! submeshes are packed back to back and each records its byte offsets:
//!
//! ```text
//! vertex buffer: [ submesh 0 vertices | submesh 1 vertices | ... ]
//! index buffer:  [ submesh 0 indices  | submesh 1 indices  | ... ]
//! ```
//!
//! Indices stay submesh-local; the binding applies the vertex offset.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{Result, StrataError};
use crate::renderer::backend::{BindingId, BufferDesc, BufferId, BufferUsage, GpuBackend, ProgramId};
use crate::renderer::texture::TextureStore;
use crate::resources::handle::{MaterialHandle, MeshHandle, ModelHandle};
use crate::resources::image::ImageDecoder;
use crate::resources::material::{Material, TextureSlot};
use crate::resources::mesh::{MeshData, ModelParser, ParsedModel, VertexLayout};

/// A buffer owned by exactly one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub id: BufferId,
    pub size: u64,
}

impl GpuBuffer {
    pub fn create(
        backend: &mut dyn GpuBackend,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Self {
        let size = contents.len() as u64;
        let id = backend.create_buffer(&BufferDesc { label, usage, size }, Some(contents));
        Self { id, size }
    }
}

/// A submesh living inside its mesh's shared buffers.
#[derive(Debug, Clone)]
pub struct Submesh {
    pub layout: VertexLayout,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Byte offset of the first vertex in the mesh vertex buffer.
    pub vertex_offset: u64,
    /// Byte offset of the first index in the mesh index buffer.
    pub index_offset: u64,
    /// Bindings already built for this submesh, keyed by program.
    pub(crate) bindings: SmallVec<[(ProgramId, BindingId); 2]>,
}

impl Submesh {
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Index of the submesh's first element in the index buffer.
    #[must_use]
    pub fn first_index(&self) -> u32 {
        (self.index_offset / std::mem::size_of::<u32>() as u64) as u32
    }

    #[must_use]
    pub fn cached_binding(&self, program: ProgramId) -> Option<BindingId> {
        self.bindings
            .iter()
            .find(|(p, _)| *p == program)
            .map(|&(_, b)| b)
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub submeshes: Vec<Submesh>,
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
}

/// A mesh plus one material per submesh.
#[derive(Debug, Clone)]
pub struct Model {
    pub mesh: MeshHandle,
    pub materials: Vec<MaterialHandle>,
}

#[derive(Debug, Default)]
pub struct GeometryStore {
    meshes: Vec<Mesh>,
    models: Vec<Model>,
    materials: Vec<Material>,
    model_paths: FxHashMap<PathBuf, ModelHandle>,
}

impl GeometryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads a mesh into one shared vertex buffer and one shared index
    /// buffer.
    pub fn load_mesh(
        &mut self,
        backend: &mut dyn GpuBackend,
        data: &MeshData,
        label: &str,
    ) -> Result<MeshHandle> {
        if data.submeshes.is_empty() {
            return Err(StrataError::AssetEmpty(PathBuf::from(label)));
        }

        let mut vertex_bytes: Vec<u8> = Vec::new();
        let mut index_bytes: Vec<u8> = Vec::new();
        let mut submeshes = Vec::with_capacity(data.submeshes.len());

        for sub in &data.submeshes {
            let vertex_offset = vertex_bytes.len() as u64;
            let index_offset = index_bytes.len() as u64;
            vertex_bytes.extend_from_slice(bytemuck::cast_slice(&sub.vertices));
            index_bytes.extend_from_slice(bytemuck::cast_slice(&sub.indices));

            submeshes.push(Submesh {
                layout: sub.layout.clone(),
                vertices: sub.vertices.clone(),
                indices: sub.indices.clone(),
                vertex_offset,
                index_offset,
                bindings: SmallVec::new(),
            });
        }

        let vertex_buffer = GpuBuffer::create(
            backend,
            &format!("{label} vertices"),
            BufferUsage::Vertex,
            &vertex_bytes,
        );
        let index_buffer = GpuBuffer::create(
            backend,
            &format!("{label} indices"),
            BufferUsage::Index,
            &index_bytes,
        );
        log::debug!(
            "Loaded mesh '{}': {} submeshes, {} vertex bytes, {} index bytes",
            label,
            submeshes.len(),
            vertex_buffer.size,
            index_buffer.size
        );

        let handle = MeshHandle::from_index(self.meshes.len());
        self.meshes.push(Mesh {
            submeshes,
            vertex_buffer,
            index_buffer,
        });
        Ok(handle)
    }

    /// Parses and uploads a model, returning the cached handle when the
    /// path was loaded before.
    pub fn load_model(
        &mut self,
        backend: &mut dyn GpuBackend,
        textures: &mut TextureStore,
        parser: &dyn ModelParser,
        decoder: &dyn ImageDecoder,
        path: impl AsRef<Path>,
    ) -> Result<ModelHandle> {
        let path = path.as_ref();
        if let Some(&handle) = self.model_paths.get(path) {
            return Ok(handle);
        }
        let parsed = parser.parse(path)?;
        self.add_model(backend, textures, decoder, path, &parsed)
    }

    /// Uploads an already parsed model and registers it under `path`.
    pub fn add_model(
        &mut self,
        backend: &mut dyn GpuBackend,
        textures: &mut TextureStore,
        decoder: &dyn ImageDecoder,
        path: &Path,
        parsed: &ParsedModel,
    ) -> Result<ModelHandle> {
        if parsed.mesh.submeshes.is_empty() {
            log::error!("Model '{}' has no geometry", path.display());
            return Err(StrataError::AssetEmpty(path.to_path_buf()));
        }

        let mesh = self.load_mesh(backend, &parsed.mesh, &path.to_string_lossy())?;

        let directory = path.parent().unwrap_or_else(|| Path::new(""));
        let first_material = self.materials.len();
        for data in &parsed.materials {
            let mut material = Material::untextured(data);
            for slot in TextureSlot::ALL {
                let Some(relative) = data.texture_path(slot) else {
                    continue;
                };
                let handle = textures
                    .load_texture_2d(backend, decoder, directory.join(relative))
                    .ok();
                material.set_texture(slot, handle);
            }
            self.materials.push(material);
        }

        let materials = parsed
            .mesh
            .submeshes
            .iter()
            .map(|sub| {
                let index = if sub.material < parsed.materials.len() {
                    first_material + sub.material
                } else {
                    self.push_default_material()
                };
                MaterialHandle::from_index(index)
            })
            .collect();

        let handle = ModelHandle::from_index(self.models.len());
        self.models.push(Model { mesh, materials });
        self.model_paths.insert(path.to_path_buf(), handle);
        Ok(handle)
    }

    fn push_default_material(&mut self) -> usize {
        self.materials.push(Material::untextured(&Default::default()));
        self.materials.len() - 1
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn mesh(&self, handle: MeshHandle) -> Result<&Mesh> {
        self.meshes.get(handle.index()).ok_or_else(|| handle.invalid())
    }

    pub fn mesh_mut(&mut self, handle: MeshHandle) -> Result<&mut Mesh> {
        self.meshes
            .get_mut(handle.index())
            .ok_or_else(|| handle.invalid())
    }

    pub fn model(&self, handle: ModelHandle) -> Result<&Model> {
        self.models.get(handle.index()).ok_or_else(|| handle.invalid())
    }

    pub fn material(&self, handle: MaterialHandle) -> Result<&Material> {
        self.materials
            .get(handle.index())
            .ok_or_else(|| handle.invalid())
    }

    pub fn material_mut(&mut self, handle: MaterialHandle) -> Result<&mut Material> {
        self.materials
            .get_mut(handle.index())
            .ok_or_else(|| handle.invalid())
    }

    #[must_use]
    pub fn model_by_path(&self, path: impl AsRef<Path>) -> Option<ModelHandle> {
        self.model_paths.get(path.as_ref()).copied()
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Releases every GPU buffer. The store is empty afterwards.
    pub fn destroy(&mut self, backend: &mut dyn GpuBackend) {
        for mesh in self.meshes.drain(..) {
            backend.destroy_buffer(mesh.vertex_buffer.id);
            backend.destroy_buffer(mesh.index_buffer.id);
        }
        self.models.clear();
        self.materials.clear();
        self.model_paths.clear();
    }
}
