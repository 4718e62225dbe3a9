//! Program registry tests
//!
//! Tests for:
//! - Built-in variants compile, link and reflect their inputs
//! - Variant selection out of one template
//! - Compile errors are fatal, link errors are deferred to first use
//! - Hot reload through the modification timestamp

mod common;

use common::{ENGINE_SHADER, TEST_SHADER};
use strata::errors::{ShaderStage, StrataError};
use strata::renderer::backend::ProgramId;
use strata::renderer::program::{ProgramRegistry, ShaderAttribute};
use strata::renderer::{EmbeddedShaderLoader, MemoryShaderLoader};
use strata::HeadlessBackend;

const BUILTIN_VARIANTS: [&str; 6] = [
    "SHOW_TEXTURED_MESH",
    "GEOMETRY_PASS",
    "LIGHTING_PASS",
    "SKYBOX",
    "WATER_SURFACE",
    "DEBUG_LIGHT",
];

fn attr(location: u32, components: u8) -> ShaderAttribute {
    ShaderAttribute {
        location,
        components,
    }
}

fn test_loader() -> MemoryShaderLoader {
    MemoryShaderLoader::new().with_source("test.wgsl", TEST_SHADER)
}

// ============================================================================
// Built-in programs
// ============================================================================

#[test]
fn builtin_variants_compile_and_link() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let loader = EmbeddedShaderLoader::new();

    for variant in BUILTIN_VARIANTS {
        let handle = registry
            .load_program(&mut backend, &loader, "engine.wgsl", variant)
            .unwrap_or_else(|e| panic!("{variant}: {e}"));
        let program = registry.get(handle).unwrap();
        assert!(program.is_linked(), "{variant} did not link");
        assert_eq!(program.name, variant);
        assert_eq!(backend.program_label(program.id), Some(variant));
    }
    assert_eq!(registry.len(), BUILTIN_VARIANTS.len());
}

#[test]
fn builtin_programs_reflect_position_normal_uv() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let loader = MemoryShaderLoader::new().with_source("engine.wgsl", ENGINE_SHADER);

    let handle = registry
        .load_program(&mut backend, &loader, "engine.wgsl", "SHOW_TEXTURED_MESH")
        .unwrap();
    let program = registry.get(handle).unwrap();
    assert_eq!(program.inputs, vec![attr(0, 3), attr(1, 3), attr(2, 2)]);
}

#[test]
fn embedded_loader_has_no_timestamp() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let loader = EmbeddedShaderLoader::new();

    let handle = registry
        .load_program(&mut backend, &loader, "engine.wgsl", "SKYBOX")
        .unwrap();
    assert!(registry.get(handle).unwrap().last_write_timestamp.is_none());
    assert!(registry.modified_programs(&loader).is_empty());
}

// ============================================================================
// Variants
// ============================================================================

#[test]
fn variants_share_one_source() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let loader = test_loader();

    let plain = registry
        .load_program(&mut backend, &loader, "test.wgsl", "POSITION_ONLY")
        .unwrap();
    let textured = registry
        .load_program(&mut backend, &loader, "test.wgsl", "WITH_UV")
        .unwrap();

    let plain = registry.get(plain).unwrap();
    let textured = registry.get(textured).unwrap();
    assert_eq!(plain.inputs, vec![attr(0, 3)]);
    assert_eq!(textured.inputs, vec![attr(0, 3), attr(2, 2)]);
    assert_ne!(plain.id, textured.id);
    assert_eq!(textured.input(2), Some(&attr(2, 2)));
    assert_eq!(textured.input(1), None);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn compile_error_is_returned() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let loader = test_loader();

    let err = registry
        .load_program(&mut backend, &loader, "test.wgsl", "BROKEN_SYNTAX")
        .unwrap_err();
    match err {
        StrataError::Compile { program, stage, .. } => {
            assert_eq!(program, "BROKEN_SYNTAX");
            assert_eq!(stage, ShaderStage::Vertex);
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert!(registry.is_empty());
}

#[test]
fn missing_source_is_asset_missing() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();

    let err = registry
        .load_program(&mut backend, &test_loader(), "nope.wgsl", "POSITION_ONLY")
        .unwrap_err();
    assert!(matches!(err, StrataError::AssetMissing(_)));
}

#[test]
fn link_error_is_deferred_to_first_use() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let loader = test_loader();

    let handle = registry
        .load_program(&mut backend, &loader, "test.wgsl", "BROKEN_LINK")
        .expect("a link failure still yields a handle");
    let program = registry.get(handle).unwrap();

    assert!(!program.is_linked());
    assert_eq!(program.id, ProgramId(0));
    assert!(backend.program_label(program.id).is_none());
    match program.linked_id() {
        Err(StrataError::Link { program, message }) => {
            assert_eq!(program, "BROKEN_LINK");
            assert!(message.contains("location 1"), "{message}");
        }
        other => panic!("expected a link error, got {other:?}"),
    }
}

// ============================================================================
// Reload
// ============================================================================

#[test]
fn reload_rebuilds_modified_program() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let mut loader = test_loader();

    let handle = registry
        .load_program(&mut backend, &loader, "test.wgsl", "WITH_UV")
        .unwrap();
    let old_id = registry.get(handle).unwrap().id;
    assert!(registry.modified_programs(&loader).is_empty());

    loader.insert("test.wgsl", TEST_SHADER);
    assert_eq!(registry.modified_programs(&loader), vec![handle]);

    registry.reload(&mut backend, &loader, handle).unwrap();
    let program = registry.get(handle).unwrap();
    assert_ne!(program.id, old_id);
    assert_eq!(program.inputs, vec![attr(0, 3), attr(2, 2)]);
    assert!(registry.modified_programs(&loader).is_empty());
}

#[test]
fn failed_reload_keeps_previous_program() {
    let mut backend = HeadlessBackend::new();
    let mut registry = ProgramRegistry::new().unwrap();
    let mut loader = test_loader();

    let handle = registry
        .load_program(&mut backend, &loader, "test.wgsl", "POSITION_ONLY")
        .unwrap();
    let old_id = registry.get(handle).unwrap().id;

    loader.insert("test.wgsl", "this is not wgsl");
    let err = registry.reload(&mut backend, &loader, handle).unwrap_err();
    assert!(matches!(err, StrataError::Compile { .. }));
    assert_eq!(registry.get(handle).unwrap().id, old_id);
}
