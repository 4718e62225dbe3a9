//! Uniform arena tests
//!
//! Tests for:
//! - Block alignment and packing
//! - Global block byte layout
//! - Overflow against the device block size and the light array
//! - Frame bracket misuse

use glam::{Mat4, Vec3};
use strata::errors::StrataError;
use strata::renderer::backend::{Command, DeviceLimits};
use strata::renderer::uniform_arena::{
    DrawKey, GLOBAL_BLOCK_SIZE, LIGHT_STRIDE, LOCAL_BLOCK_SIZE, MAX_LIGHTS, UniformArena,
    UniformView, global_block_bytes,
};
use strata::renderer::{GeometryStore, TextureStore};
use strata::resources::{FileImageDecoder, ModelHandle};
use strata::scene::{Light, LightType, Scene};
use strata::{HeadlessBackend, Primitive, PrimitiveParser, Transform};

// ============================================================================
// Helpers
// ============================================================================

fn backend(alignment: u32, max_block: u32) -> HeadlessBackend {
    HeadlessBackend::with_limits(DeviceLimits {
        uniform_offset_alignment: alignment,
        max_uniform_block_size: max_block,
    })
}

/// Scene with `n` entities; handles come from a real scene so keys are valid.
fn scene_with_entities(n: usize) -> Scene {
    let model = model_handle();
    let mut scene = Scene::new();
    for i in 0..n {
        scene.add_entity(format!("e{i}"), model, Transform::default());
    }
    scene
}

/// The arena never resolves models, any issued handle will do.
fn model_handle() -> ModelHandle {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    let mut geometry = GeometryStore::new();
    geometry
        .load_model(
            &mut backend,
            &mut textures,
            &PrimitiveParser,
            &FileImageDecoder,
            Primitive::Cube.path(),
        )
        .unwrap()
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

// ============================================================================
// Alignment
// ============================================================================

#[test]
fn every_block_starts_aligned_and_globals_come_first() {
    let mut backend = backend(256, 65536);
    let mut arena = UniformArena::new(&mut backend);
    let scene = scene_with_entities(5);

    arena.begin_frame().unwrap();
    let global = arena
        .push_global_block(UniformView::Main, Vec3::ZERO, std::iter::empty())
        .unwrap();
    let mut locals = Vec::new();
    for (handle, _) in scene.entities() {
        locals.push(
            arena
                .push_local_block(UniformView::Main, DrawKey::Entity(handle), Mat4::IDENTITY, Mat4::IDENTITY)
                .unwrap(),
        );
    }
    arena.end_frame(&mut backend).unwrap();

    assert_eq!(global.offset, 0);
    assert_eq!(global.size, GLOBAL_BLOCK_SIZE);
    for (i, local) in locals.iter().enumerate() {
        assert_eq!(local.offset % 256, 0, "local {i} misaligned");
        assert_eq!(local.size, LOCAL_BLOCK_SIZE);
        assert!(local.offset >= global.end());
        for other in &locals[i + 1..] {
            assert!(!local.overlaps(other));
        }
    }
}

#[test]
fn aligned_head_is_not_padded() {
    // 128-byte locals on a 128-byte alignment pack back to back.
    let mut backend = backend(128, 65536);
    let mut arena = UniformArena::new(&mut backend);
    let scene = scene_with_entities(3);

    arena.begin_frame().unwrap();
    let global = arena
        .push_global_block(UniformView::Main, Vec3::ZERO, std::iter::empty())
        .unwrap();
    let offsets: Vec<u64> = scene
        .entities()
        .map(|(handle, _)| {
            arena
                .push_local_block(UniformView::Main, DrawKey::Entity(handle), Mat4::IDENTITY, Mat4::IDENTITY)
                .unwrap()
                .offset
        })
        .collect();
    arena.end_frame(&mut backend).unwrap();

    // 1296 rounds up to 1408, then no padding at all.
    assert_eq!(global.end(), 1296);
    assert_eq!(offsets, vec![1408, 1536, 1664]);
}

#[test]
fn alignment_never_drops_below_vec4() {
    let mut backend = backend(4, 65536);
    let arena = UniformArena::new(&mut backend);
    assert_eq!(arena.alignment(), 16);
}

// ============================================================================
// Contents
// ============================================================================

#[test]
fn global_block_layout_matches_shader() {
    let mut backend = backend(256, 65536);
    let mut arena = UniformArena::new(&mut backend);
    let directional = Light::instance(LightType::Directional, "sun");
    let point = Light::instance(LightType::Point, "bulb");

    arena.begin_frame().unwrap();
    arena
        .push_global_block(UniformView::Main, Vec3::new(1.0, 2.0, 3.0), [&directional, &point])
        .unwrap();
    arena.end_frame(&mut backend).unwrap();

    let bytes = backend.buffer_data(arena.buffer()).unwrap();
    assert_eq!(read_f32(bytes, 0), 1.0);
    assert_eq!(read_f32(bytes, 8), 3.0);
    assert_eq!(read_u32(bytes, 12), 2);

    // light 0: directional
    assert_eq!(read_u32(bytes, 16), 0);
    assert_eq!(read_f32(bytes, 16 + 32), -1.0);

    // light 1: point at (0, 5, 0), radius 20
    let base = 16 + LIGHT_STRIDE as usize;
    assert_eq!(read_u32(bytes, base), 1);
    assert_eq!(read_f32(bytes, base + 16), 1.0);
    assert_eq!(read_f32(bytes, base + 48 + 4), 5.0);
    assert_eq!(read_f32(bytes, base + 60), Light::DEFAULT_RADIUS);
    assert_eq!(read_f32(bytes, base + 64), 1.0);
}

#[test]
fn local_block_holds_world_and_world_view_projection() {
    let mut backend = backend(256, 65536);
    let mut arena = UniformArena::new(&mut backend);
    let scene = scene_with_entities(1);
    let (handle, _) = scene.entities().next().unwrap();

    let world = Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0));
    let view_projection = Mat4::from_scale(Vec3::splat(2.0));

    arena.begin_frame().unwrap();
    arena
        .push_global_block(UniformView::Main, Vec3::ZERO, std::iter::empty())
        .unwrap();
    let local = arena
        .push_local_block(UniformView::Main, DrawKey::Entity(handle), world, view_projection)
        .unwrap();
    arena.end_frame(&mut backend).unwrap();

    let bytes = backend.buffer_data(arena.buffer()).unwrap();
    let offset = local.offset as usize;
    // world translation x, column 3
    assert_eq!(read_f32(bytes, offset + 48), 4.0);
    // (vp · world) translation x
    assert_eq!(read_f32(bytes, offset + 64 + 48), 8.0);
    assert_eq!(
        arena.local_range(UniformView::Main, DrawKey::Entity(handle)).unwrap(),
        local
    );
}

// ============================================================================
// Overflow
// ============================================================================

#[test]
fn overflow_is_reported() {
    // global [0, 1296), locals at 1536 and 1792; the third needs 2176 bytes.
    let mut backend = backend(256, 2048);
    let mut arena = UniformArena::new(&mut backend);
    let scene = scene_with_entities(3);
    let handles: Vec<_> = scene.entities().map(|(h, _)| h).collect();

    arena.begin_frame().unwrap();
    arena
        .push_global_block(UniformView::Main, Vec3::ZERO, std::iter::empty())
        .unwrap();
    for &handle in &handles[..2] {
        arena
            .push_local_block(UniformView::Main, DrawKey::Entity(handle), Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
    }
    let err = arena
        .push_local_block(UniformView::Main, DrawKey::Entity(handles[2]), Mat4::IDENTITY, Mat4::IDENTITY)
        .unwrap_err();
    assert!(matches!(
        err,
        StrataError::UniformOverflow {
            requested: 2176,
            capacity: 2048
        }
    ));
}

#[test]
fn a_full_light_array_fits() {
    let mut backend = backend(256, 65536);
    let mut arena = UniformArena::new(&mut backend);
    let lights: Vec<Light> = (0..MAX_LIGHTS)
        .map(|i| Light::instance(LightType::Point, format!("bulb {i}")))
        .collect();

    arena.begin_frame().unwrap();
    let global = arena
        .push_global_block(UniformView::Main, Vec3::ZERO, &lights)
        .unwrap();
    arena.end_frame(&mut backend).unwrap();

    assert_eq!(global.size, GLOBAL_BLOCK_SIZE);
    let bytes = backend.buffer_data(arena.buffer()).unwrap();
    assert_eq!(read_u32(bytes, 12), MAX_LIGHTS as u32);
}

#[test]
fn more_lights_than_the_array_holds_is_an_overflow() {
    let mut backend = backend(256, 65536);
    let mut arena = UniformArena::new(&mut backend);
    let lights: Vec<Light> = (0..20)
        .map(|i| Light::instance(LightType::Point, format!("bulb {i}")))
        .collect();

    arena.begin_frame().unwrap();
    let err = arena
        .push_global_block(UniformView::Main, Vec3::ZERO, &lights)
        .unwrap_err();
    match err {
        StrataError::UniformOverflow {
            requested,
            capacity,
        } => {
            assert_eq!(requested, global_block_bytes(20));
            assert_eq!(capacity, GLOBAL_BLOCK_SIZE);
        }
        other => panic!("expected UniformOverflow, got {other:?}"),
    }
    // nothing was reserved for the rejected block
    assert_eq!(arena.head(), 0);
}

// ============================================================================
// Frame bracket
// ============================================================================

#[test]
fn push_outside_frame_is_rejected() {
    let mut backend = HeadlessBackend::new();
    let mut arena = UniformArena::new(&mut backend);
    let err = arena
        .push_global_block(UniformView::Main, Vec3::ZERO, std::iter::empty())
        .unwrap_err();
    assert!(matches!(err, StrataError::FrameState(_)));
}

#[test]
fn double_begin_is_rejected() {
    let mut backend = HeadlessBackend::new();
    let mut arena = UniformArena::new(&mut backend);
    arena.begin_frame().unwrap();
    assert!(matches!(arena.begin_frame(), Err(StrataError::FrameState(_))));
}

#[test]
fn ranges_are_unreadable_while_mapped() {
    let mut backend = HeadlessBackend::new();
    let mut arena = UniformArena::new(&mut backend);
    arena.begin_frame().unwrap();
    arena
        .push_global_block(UniformView::Main, Vec3::ZERO, std::iter::empty())
        .unwrap();
    assert!(arena.is_mapped());
    assert!(matches!(
        arena.global_range(UniformView::Main),
        Err(StrataError::FrameState(_))
    ));

    arena.end_frame(&mut backend).unwrap();
    assert!(!arena.is_mapped());
    assert_eq!(arena.global_range(UniformView::Main).unwrap().offset, 0);
}

#[test]
fn local_before_global_is_rejected() {
    let mut backend = HeadlessBackend::new();
    let mut arena = UniformArena::new(&mut backend);
    arena.begin_frame().unwrap();
    let err = arena
        .push_local_block(UniformView::Main, DrawKey::Skybox, Mat4::IDENTITY, Mat4::IDENTITY)
        .unwrap_err();
    assert!(matches!(err, StrataError::FrameState(_)));
}

#[test]
fn end_frame_uploads_once() {
    let mut backend = HeadlessBackend::new();
    let mut arena = UniformArena::new(&mut backend);
    arena.begin_frame().unwrap();
    arena
        .push_global_block(UniformView::Main, Vec3::ZERO, std::iter::empty())
        .unwrap();
    arena
        .push_local_block(UniformView::Main, DrawKey::Skybox, Mat4::IDENTITY, Mat4::IDENTITY)
        .unwrap();
    arena.end_frame(&mut backend).unwrap();

    let writes: Vec<_> = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::WriteBuffer { .. }))
        .collect();
    assert_eq!(writes.len(), 1);
    assert!(matches!(
        writes[0],
        Command::WriteBuffer { offset: 0, len, .. } if *len as u64 == arena.head()
    ));
}
