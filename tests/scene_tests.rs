//! Scene, camera and settings tests
//!
//! Tests for:
//! - Entity/light naming and tombstoned removal
//! - Transform composition
//! - Fly camera movement, look, zoom and clamps
//! - Mirrored camera for planar reflections
//! - Settings JSON overrides

use glam::{Mat4, UVec2, Vec2, Vec3};
use strata::errors::StrataError;
use strata::renderer::{GeometryStore, TextureStore};
use strata::resources::{FileImageDecoder, ModelHandle};
use strata::scene::LightKind;
use strata::settings::{BUILTIN_SHADER, CameraSettings, ProgramSource};
use strata::{
    ButtonState, Camera, FrameInput, HeadlessBackend, Key, Light, LightType, Primitive,
    PrimitiveParser, RenderTarget, RenderTopology, RendererSettings, Scene, Transform,
};

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
}

fn mat4_approx(a: Mat4, b: Mat4) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| approx_eq(*x, *y))
}

fn model() -> ModelHandle {
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    GeometryStore::new()
        .load_model(
            &mut backend,
            &mut textures,
            &PrimitiveParser,
            &FileImageDecoder,
            Primitive::Sphere.path(),
        )
        .unwrap()
}

fn default_camera() -> Camera {
    Camera::new(&CameraSettings::default(), UVec2::new(1280, 720))
}

// ============================================================================
// Entities & lights
// ============================================================================

#[test]
fn spawned_entities_are_numbered_by_base_name() {
    let mut scene = Scene::new();
    let model = model();

    let a = scene.spawn_entity("Rock", model);
    let b = scene.spawn_entity("Rock", model);
    let c = scene.spawn_entity("Tree", model);

    assert_eq!(scene.entity(a).unwrap().name, "Rock 0");
    assert_eq!(scene.entity(b).unwrap().name, "Rock 1");
    assert_eq!(scene.entity(c).unwrap().name, "Tree 0");
    assert_eq!(scene.entity(a).unwrap().transform(), &Transform::default());
}

#[test]
fn removal_leaves_other_handles_valid() {
    let mut scene = Scene::new();
    let model = model();
    let a = scene.add_entity("a", model, Transform::default());
    let b = scene.add_entity("b", model, Transform::default());
    let c = scene.add_entity("c", model, Transform::default());

    let removed = scene.remove_entity(b).unwrap();
    assert_eq!(removed.name, "b");
    assert_eq!(scene.entity_count(), 2);
    assert_eq!(scene.entity(a).unwrap().name, "a");
    assert_eq!(scene.entity(c).unwrap().name, "c");

    let order: Vec<_> = scene.entities().map(|(h, _)| h).collect();
    assert_eq!(order, vec![a, c]);

    assert!(matches!(
        scene.remove_entity(b),
        Err(StrataError::InvalidHandle { kind: "entity", .. })
    ));
    assert!(scene.set_transform(b, Transform::default()).is_err());
}

#[test]
fn set_transform_updates_the_world_matrix() {
    let mut scene = Scene::new();
    let e = scene.add_entity("e", model(), Transform::default());
    let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0)).with_scale(Vec3::splat(2.0));

    scene.set_transform(e, t).unwrap();
    let entity = scene.entity(e).unwrap();
    assert_eq!(entity.transform(), &t);
    assert!(mat4_approx(entity.world_matrix(), t.matrix()));
}

#[test]
fn lights_spawn_with_editor_defaults() {
    let mut scene = Scene::new();
    let sun = scene.spawn_light(LightType::Directional, "Sun");
    let lamp = scene.spawn_light(LightType::Point, "Lamp");
    let lamp2 = scene.spawn_light(LightType::Point, "Lamp");

    let sun = scene.light(sun).unwrap();
    assert_eq!(sun.name, "Sun 0");
    assert_eq!(sun.kind, LightKind::Directional);
    assert_eq!(sun.type_code(), 0);
    assert_eq!(sun.falloff(), (0.0, 1.0));

    let lamp = scene.light(lamp).unwrap();
    assert_eq!(lamp.position, Vec3::new(0.0, 5.0, 0.0));
    assert_eq!(lamp.falloff(), (Light::DEFAULT_RADIUS, 1.0));
    assert_eq!(lamp.type_code(), 1);
    assert_eq!(lamp.light_type(), LightType::Point);
    assert_eq!(scene.light(lamp2).unwrap().name, "Lamp 1");
}

#[test]
fn light_edits_and_removal() {
    let mut scene = Scene::new();
    let lamp = scene.spawn_light(LightType::Point, "Lamp");

    scene.light_mut(lamp).unwrap().color = Vec3::new(1.0, 0.5, 0.0);
    assert_eq!(scene.light(lamp).unwrap().color, Vec3::new(1.0, 0.5, 0.0));

    scene.remove_light(lamp).unwrap();
    assert_eq!(scene.light_count(), 0);
    assert!(scene.light(lamp).is_err());
}

// ============================================================================
// Transform
// ============================================================================

#[test]
fn transform_default_is_identity() {
    assert!(mat4_approx(Transform::default().matrix(), Mat4::IDENTITY));
}

#[test]
fn transform_applies_scale_then_rotation_then_translation() {
    let t = Transform::new(
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(0.0, 90.0, 0.0),
        Vec3::splat(2.0),
    );
    // +X scaled to 2, rotated 90° about Y to −Z, then moved.
    let p = t.matrix().transform_point3(Vec3::X);
    assert!(vec3_approx(p, Vec3::new(10.0, 0.0, -2.0)), "{p}");
}

// ============================================================================
// Camera
// ============================================================================

#[test]
fn camera_starts_from_settings() {
    let camera = default_camera();
    let settings = CameraSettings::default();
    assert_eq!(camera.position(), Vec3::from_array(settings.position));
    assert!(vec3_approx(camera.front(), Vec3::from_array(settings.front).normalize()));
    assert!(approx_eq(camera.aspect(), 1280.0 / 720.0));
}

#[test]
fn held_key_moves_along_front() {
    let mut camera = default_camera();
    let start = camera.position();
    let front = camera.front();

    camera.update(&FrameInput::new(0.1).with_key(Key::W, ButtonState::Pressed));
    assert!(vec3_approx(camera.position(), start + front * camera.speed * 0.1));

    // an edge state is not "held"
    let moved = camera.position();
    camera.update(&FrameInput::new(0.1).with_key(Key::W, ButtonState::Press));
    assert_eq!(camera.position(), moved);
}

#[test]
fn vertical_keys_move_along_world_up() {
    let mut camera = default_camera();
    let start = camera.position();
    camera.update(&FrameInput::new(1.0).with_key(Key::E, ButtonState::Pressed));
    assert!(vec3_approx(camera.position(), start + Vec3::Y * camera.speed));
}

#[test]
fn right_drag_rotates() {
    let mut camera = default_camera();
    let yaw = camera.yaw();
    let pitch = camera.pitch();

    camera.update(&FrameInput::new(0.016).with_mouse_drag(Vec2::new(10.0, 20.0)));
    assert!(approx_eq(camera.yaw(), yaw + 10.0 * camera.sensitivity));
    assert!(approx_eq(camera.pitch(), pitch - 20.0 * camera.sensitivity));
}

#[test]
fn pitch_is_clamped() {
    let mut camera = default_camera();
    camera.rotate(0.0, 500.0);
    assert_eq!(camera.pitch(), 89.0);
    camera.rotate(0.0, -500.0);
    assert_eq!(camera.pitch(), -89.0);
}

#[test]
fn scroll_zooms_within_limits() {
    let mut camera = default_camera();
    camera.update(&FrameInput::new(0.016).with_scroll(10.0));
    assert!(approx_eq(camera.fov(), 50.0));

    camera.set_fov(500.0);
    assert_eq!(camera.fov(), 60.0);
    camera.set_fov(-3.0);
    assert_eq!(camera.fov(), 1.0);
}

#[test]
fn skybox_matrix_ignores_translation() {
    let mut camera = default_camera();
    let before = camera.rotation_view_projection();
    camera.set_position(Vec3::new(100.0, -40.0, 3.0));
    assert!(mat4_approx(camera.rotation_view_projection(), before));
    assert!(!mat4_approx(camera.view_projection(), before));
}

#[test]
fn mirrored_camera_reflects_about_the_water_plane() {
    let camera = default_camera();
    let mirrored = camera.mirrored(2.0);

    assert!(approx_eq(mirrored.position().y, 4.0 - camera.position().y));
    assert!(approx_eq(mirrored.position().x, camera.position().x));
    assert!(approx_eq(mirrored.pitch(), -camera.pitch()));
    assert!(approx_eq(mirrored.front().y, -camera.front().y));
    assert!(approx_eq(mirrored.front().x, camera.front().x));
}

#[test]
fn viewport_change_updates_aspect() {
    let mut camera = default_camera();
    camera.set_viewport(UVec2::new(400, 400));
    assert!(approx_eq(camera.aspect(), 1.0));
    camera.set_viewport(UVec2::ZERO);
    assert!(camera.aspect().is_finite());
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_defaults() {
    let settings = RendererSettings::default();
    assert_eq!(settings.display_size(), UVec2::new(1280, 720));
    assert_eq!(settings.topology, RenderTopology::Forward);
    assert_eq!(settings.inspected_target, RenderTarget::Final);
    assert!(settings.water.is_none());
    assert!(settings.debug_light_markers);
    assert_eq!(
        settings.programs.lighting,
        ProgramSource::new(BUILTIN_SHADER, "LIGHTING_PASS")
    );
}

#[test]
fn json_overrides_a_subset() {
    let settings = RendererSettings::from_json_str(
        r#"{
            "topology": "Deferred",
            "display_size": [800, 600],
            "water": { "height": 1.5, "extent": 10.0 },
            "programs": { "forward": { "path": "custom.wgsl", "variant": "TOON" } }
        }"#,
    )
    .unwrap();

    assert_eq!(settings.topology, RenderTopology::Deferred);
    assert_eq!(settings.display_size(), UVec2::new(800, 600));
    let water = settings.water.unwrap();
    assert_eq!(water.height, 1.5);
    assert_eq!(water.extent, 10.0);
    assert_eq!(settings.programs.forward, ProgramSource::new("custom.wgsl", "TOON"));
    // untouched roles keep the built-in variants
    assert_eq!(
        settings.programs.geometry,
        ProgramSource::new(BUILTIN_SHADER, "GEOMETRY_PASS")
    );
    assert_eq!(settings.camera, CameraSettings::default());
}

#[test]
fn invalid_json_is_a_json_error() {
    let err = RendererSettings::from_json_str(r#"{ "topology": "Sideways" }"#).unwrap_err();
    assert!(matches!(err, StrataError::Json(_)));
}

#[test]
fn missing_settings_file_is_an_io_error() {
    let err = RendererSettings::load("/definitely/not/here/strata.json").unwrap_err();
    assert!(matches!(err, StrataError::Io(_)));
}
