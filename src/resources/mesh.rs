//! CPU-side mesh data
//!
//! [`MeshData`] is what a model parser hands to the geometry store: one or
//! more submeshes, each with interleaved `f32` vertices, `u32` triangle
//! indices and a [`VertexLayout`] describing the interleaving.

use std::path::Path;

use smallvec::SmallVec;

use crate::errors::Result;
use crate::resources::material::MaterialData;

/// Size of one vertex component in bytes. All vertex data is `f32`.
pub const COMPONENT_SIZE: u32 = std::mem::size_of::<f32>() as u32;

/// One attribute inside an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Number of `f32` components (1..=4).
    pub components: u8,
    /// Byte offset inside one vertex.
    pub offset: u32,
}

/// Ordered `(location, components, offset)` triples plus the vertex stride.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    attributes: SmallVec<[VertexAttribute; 4]>,
    stride: u32,
}

impl VertexLayout {
    /// Builds a tightly packed layout from `(location, components)` pairs in
    /// the order they appear in each vertex.
    #[must_use]
    pub fn interleaved(slots: &[(u32, u8)]) -> Self {
        let mut offset = 0;
        let attributes = slots
            .iter()
            .map(|&(location, components)| {
                let attr = VertexAttribute {
                    location,
                    components,
                    offset,
                };
                offset += u32::from(components) * COMPONENT_SIZE;
                attr
            })
            .collect();
        Self {
            attributes,
            stride: offset,
        }
    }

    /// Position (3), normal (3), uv (2) at locations 0, 1, 2.
    #[must_use]
    pub fn position_normal_uv() -> Self {
        Self::interleaved(&[(0, 3), (1, 3), (2, 2)])
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    #[must_use]
    pub fn floats_per_vertex(&self) -> usize {
        (self.stride / COMPONENT_SIZE) as usize
    }

    /// Attribute bound to `location`, if the layout provides it.
    #[must_use]
    pub fn find(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }
}

/// Parsed geometry for one submesh.
#[derive(Debug, Clone, Default)]
pub struct SubmeshData {
    pub layout: VertexLayout,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Index into the owning [`ParsedModel::materials`].
    pub material: usize,
}

impl SubmeshData {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        match self.layout.floats_per_vertex() {
            0 => 0,
            n => self.vertices.len() / n,
        }
    }
}

/// Parsed geometry for a whole mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub submeshes: Vec<SubmeshData>,
}

/// A mesh together with the materials its submeshes reference.
#[derive(Debug, Clone, Default)]
pub struct ParsedModel {
    pub mesh: MeshData,
    pub materials: Vec<MaterialData>,
}

/// Model/material parsing collaborator.
///
/// Texture paths inside the returned materials are relative to the model
/// file's directory.
pub trait ModelParser {
    fn parse(&self, path: &Path) -> Result<ParsedModel>;
}
