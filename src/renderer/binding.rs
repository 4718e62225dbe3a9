//! Vertex Binding Cache
//!
//! A binding wires a submesh's interleaved vertex layout to the input
//! locations a program declares. Bindings are built on first request and
//! memoised on the submesh, keyed by the program's backend id, for the
//! lifetime of the mesh.

use crate::errors::{Result, StrataError};
use crate::renderer::backend::{BindingId, GpuBackend, VertexAttributeBinding, VertexBindingDesc};
use crate::renderer::geometry::{GeometryStore, Submesh};
use crate::renderer::program::Program;
use crate::resources::handle::MeshHandle;

/// Hit/miss counters for the debug overlay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BindingStats {
    pub created: usize,
    pub reused: usize,
}

#[derive(Debug, Default)]
pub struct VertexBindingCache {
    stats: BindingStats,
}

impl VertexBindingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> BindingStats {
        self.stats
    }

    /// Binding of `mesh.submeshes[submesh]` for `program`, built on first use.
    pub fn get_binding(
        &mut self,
        backend: &mut dyn GpuBackend,
        geometry: &mut GeometryStore,
        mesh: MeshHandle,
        submesh: usize,
        program: &Program,
    ) -> Result<BindingId> {
        let program_id = program.linked_id()?;
        let mesh = geometry.mesh_mut(mesh)?;
        let (vertex_buffer, index_buffer) = (mesh.vertex_buffer.id, mesh.index_buffer.id);
        let sub = mesh
            .submeshes
            .get_mut(submesh)
            .ok_or(StrataError::InvalidHandle {
                kind: "submesh",
                index: submesh as u32,
            })?;

        if let Some(binding) = sub.cached_binding(program_id) {
            self.stats.reused += 1;
            return Ok(binding);
        }

        let attributes = resolve_attributes(sub, program)?;
        let binding = backend.create_vertex_binding(&VertexBindingDesc {
            program: program_id,
            vertex_buffer,
            index_buffer,
            base_vertex_offset: sub.vertex_offset,
            stride: sub.layout.stride(),
            attributes: &attributes,
        });
        sub.bindings.push((program_id, binding));
        self.stats.created += 1;
        log::debug!(
            "Created vertex binding {:?} for program '{}' ({} attributes)",
            binding,
            program.name,
            attributes.len()
        );
        Ok(binding)
    }
}

/// Matches every program input to the submesh attribute at the same
/// location. The mesh's component count wins; a differing count is only
/// logged.
fn resolve_attributes(sub: &Submesh, program: &Program) -> Result<Vec<VertexAttributeBinding>> {
    program
        .inputs
        .iter()
        .map(|input| {
            let attr = sub.layout.find(input.location).ok_or_else(|| {
                log::error!(
                    "Program '{}' expects attribute location {} the mesh does not provide",
                    program.name,
                    input.location
                );
                StrataError::AttributeUnresolved {
                    program: program.name.clone(),
                    location: input.location,
                }
            })?;
            if attr.components != input.components {
                log::debug!(
                    "Program '{}' reads {} components at location {}, the mesh supplies {}",
                    program.name,
                    input.components,
                    input.location,
                    attr.components
                );
            }
            Ok(VertexAttributeBinding {
                location: attr.location,
                components: attr.components,
                offset: attr.offset,
            })
        })
        .collect()
}
