//! Vertex binding cache tests
//!
//! Tests for:
//! - Memoisation per (submesh, program)
//! - Attribute resolution against the submesh layout
//! - Unresolved attributes and unlinked programs

mod common;

use common::TEST_SHADER;
use strata::errors::{Result, StrataError};
use strata::renderer::backend::BindingId;
use strata::renderer::binding::{BindingStats, VertexBindingCache};
use strata::renderer::program::ProgramRegistry;
use strata::renderer::{GeometryStore, MemoryShaderLoader};
use strata::resources::{MeshData, MeshHandle, ProgramHandle, SubmeshData, VertexLayout};
use strata::HeadlessBackend;

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    backend: HeadlessBackend,
    geometry: GeometryStore,
    programs: ProgramRegistry,
    bindings: VertexBindingCache,
}

impl Fixture {
    fn new() -> Self {
        Self {
            backend: HeadlessBackend::new(),
            geometry: GeometryStore::new(),
            programs: ProgramRegistry::new().unwrap(),
            bindings: VertexBindingCache::new(),
        }
    }

    fn program(&mut self, variant: &str) -> ProgramHandle {
        let loader = MemoryShaderLoader::new().with_source("test.wgsl", TEST_SHADER);
        self.programs
            .load_program(&mut self.backend, &loader, "test.wgsl", variant)
            .unwrap()
    }

    fn mesh(&mut self, layout: VertexLayout, submeshes: usize) -> MeshHandle {
        let floats = layout.floats_per_vertex();
        let data = MeshData {
            submeshes: (0..submeshes)
                .map(|_| SubmeshData {
                    layout: layout.clone(),
                    vertices: vec![0.0; floats * 3],
                    indices: vec![0, 1, 2],
                    material: 0,
                })
                .collect(),
        };
        self.geometry
            .load_mesh(&mut self.backend, &data, "test mesh")
            .unwrap()
    }

    fn bind(&mut self, mesh: MeshHandle, submesh: usize, program: ProgramHandle) -> Result<BindingId> {
        let program = self.programs.get(program)?;
        self.bindings
            .get_binding(&mut self.backend, &mut self.geometry, mesh, submesh, program)
    }
}

// ============================================================================
// Memoisation
// ============================================================================

#[test]
fn binding_is_built_once_per_program() {
    let mut f = Fixture::new();
    let program = f.program("WITH_UV");
    let mesh = f.mesh(VertexLayout::position_normal_uv(), 1);

    let first = f.bind(mesh, 0, program).unwrap();
    let second = f.bind(mesh, 0, program).unwrap();

    assert_eq!(first, second);
    assert_eq!(f.backend.vertex_binding_count(), 1);
    assert_eq!(f.bindings.stats(), BindingStats { created: 1, reused: 1 });
    assert_eq!(f.geometry.mesh(mesh).unwrap().submeshes[0].binding_count(), 1);
}

#[test]
fn each_program_gets_its_own_binding() {
    let mut f = Fixture::new();
    let plain = f.program("POSITION_ONLY");
    let textured = f.program("WITH_UV");
    let mesh = f.mesh(VertexLayout::position_normal_uv(), 1);

    let a = f.bind(mesh, 0, plain).unwrap();
    let b = f.bind(mesh, 0, textured).unwrap();

    assert_ne!(a, b);
    let submesh = &f.geometry.mesh(mesh).unwrap().submeshes[0];
    assert_eq!(submesh.binding_count(), 2);
    assert_eq!(submesh.cached_binding(f.programs.get(plain).unwrap().id), Some(a));
    assert_eq!(submesh.cached_binding(f.programs.get(textured).unwrap().id), Some(b));
}

#[test]
fn each_submesh_gets_its_own_binding() {
    let mut f = Fixture::new();
    let program = f.program("WITH_UV");
    let mesh = f.mesh(VertexLayout::position_normal_uv(), 2);

    let a = f.bind(mesh, 0, program).unwrap();
    let b = f.bind(mesh, 1, program).unwrap();
    assert_ne!(a, b);

    let second = f.backend.vertex_binding(b).unwrap();
    // three position/normal/uv vertices precede the second submesh
    assert_eq!(second.base_vertex_offset, 3 * 32);
}

// ============================================================================
// Attribute resolution
// ============================================================================

#[test]
fn attributes_follow_the_mesh_layout() {
    let mut f = Fixture::new();
    let program = f.program("WITH_UV");
    let mesh = f.mesh(VertexLayout::position_normal_uv(), 1);

    let binding = f.bind(mesh, 0, program).unwrap();
    let record = f.backend.vertex_binding(binding).unwrap();

    assert_eq!(record.stride, 32);
    let resolved: Vec<_> = record
        .attributes
        .iter()
        .map(|a| (a.location, a.components, a.offset))
        .collect();
    // normal (location 1) is in the buffer but unused by the program
    assert_eq!(resolved, vec![(0, 3, 0), (2, 2, 24)]);
    assert_eq!(record.program, f.programs.get(program).unwrap().id);
}

#[test]
fn mesh_component_count_is_used_when_it_differs() {
    let mut f = Fixture::new();
    let program = f.program("WITH_UV");
    // four-component positions; the program reads three
    let mesh = f.mesh(VertexLayout::interleaved(&[(0, 4), (2, 2)]), 1);

    let binding = f.bind(mesh, 0, program).unwrap();
    let record = f.backend.vertex_binding(binding).unwrap();

    assert_eq!(record.stride, 24);
    let resolved: Vec<_> = record
        .attributes
        .iter()
        .map(|a| (a.location, a.components, a.offset))
        .collect();
    assert_eq!(resolved, vec![(0, 4, 0), (2, 2, 16)]);
}

#[test]
fn missing_attribute_is_unresolved() {
    let mut f = Fixture::new();
    let program = f.program("WITH_UV");
    let mesh = f.mesh(VertexLayout::interleaved(&[(0, 3)]), 1);

    let err = f.bind(mesh, 0, program).unwrap_err();
    match err {
        StrataError::AttributeUnresolved { program, location } => {
            assert_eq!(program, "WITH_UV");
            assert_eq!(location, 2);
        }
        other => panic!("expected AttributeUnresolved, got {other:?}"),
    }
    assert_eq!(f.backend.vertex_binding_count(), 0);
}

#[test]
fn unlinked_program_cannot_bind() {
    let mut f = Fixture::new();
    let program = f.program("BROKEN_LINK");
    let mesh = f.mesh(VertexLayout::position_normal_uv(), 1);

    assert!(matches!(
        f.bind(mesh, 0, program),
        Err(StrataError::Link { .. })
    ));
}

#[test]
fn out_of_range_submesh_is_invalid() {
    let mut f = Fixture::new();
    let program = f.program("POSITION_ONLY");
    let mesh = f.mesh(VertexLayout::position_normal_uv(), 1);

    assert!(matches!(
        f.bind(mesh, 3, program),
        Err(StrataError::InvalidHandle { kind: "submesh", index: 3 })
    ));
}
