//! Engine tests
//!
//! Tests for:
//! - Default scene population
//! - Editor commands and their handle validation
//! - Camera update, render and resize plumbing

use glam::{UVec2, Vec2, Vec3};
use strata::errors::StrataError;
use strata::renderer::backend::Command;
use strata::renderer::{GeometryStore, TextureStore};
use strata::{
    ButtonState, Collaborators, CommandOutcome, Engine, FrameInput, HeadlessBackend, Key,
    LightType, Primitive, PrimitiveParser, RenderTarget, RenderTopology, Renderer,
    RendererSettings, SceneCommand, Transform,
};

// ============================================================================
// Helpers
// ============================================================================

fn engine() -> Engine<HeadlessBackend> {
    let renderer = Renderer::new(
        HeadlessBackend::new(),
        RendererSettings::default(),
        Collaborators::default(),
    )
    .unwrap();
    Engine::new(renderer)
}

fn populated() -> Engine<HeadlessBackend> {
    let mut engine = engine();
    let cube = engine.renderer_mut().load_primitive(Primitive::Cube).unwrap();
    engine.populate_default_scene(cube, "Cube").unwrap();
    engine
}

fn entity_names(engine: &Engine<HeadlessBackend>) -> Vec<String> {
    engine.scene().entities().map(|(_, e)| e.name.clone()).collect()
}

// ============================================================================
// Default scene
// ============================================================================

#[test]
fn default_scene_has_a_ring_a_ground_and_two_lights() {
    let engine = populated();

    assert_eq!(
        entity_names(&engine),
        vec!["Cube 0", "Cube 1", "Cube 2", "Playground"]
    );
    let lights: Vec<_> = engine
        .scene()
        .lights()
        .map(|(_, l)| (l.name.clone(), l.light_type()))
        .collect();
    assert_eq!(
        lights,
        vec![
            ("Directional Light 0".to_string(), LightType::Directional),
            ("Point Light 0".to_string(), LightType::Point),
        ]
    );

    for (_, entity) in engine.scene().entities().take(3) {
        let p = entity.transform().position;
        assert!((p.y - 4.0).abs() < 1e-5);
        assert!((Vec2::new(p.x, p.z).length() - 4.0).abs() < 1e-4, "{p}");
    }
}

#[test]
fn populate_rejects_an_unknown_model() {
    let mut engine = engine();
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    let foreign = GeometryStore::new()
        .load_model(
            &mut backend,
            &mut textures,
            &PrimitiveParser,
            &strata::FileImageDecoder,
            Primitive::Cube.path(),
        )
        .unwrap();

    let err = engine.populate_default_scene(foreign, "Cube").unwrap_err();
    assert!(matches!(err, StrataError::InvalidHandle { kind: "model", .. }));
    assert_eq!(engine.scene().entity_count(), 0);
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn add_entity_continues_the_numbering() {
    let mut engine = populated();
    let cube = engine.scene().entities().next().unwrap().1.model;

    let outcome = engine
        .apply(SceneCommand::AddEntity {
            model: cube,
            name: "Cube".into(),
        })
        .unwrap();
    let CommandOutcome::Entity(handle) = outcome else {
        panic!("expected an entity, got {outcome:?}");
    };
    assert_eq!(engine.scene().entity(handle).unwrap().name, "Cube 3");
}

#[test]
fn add_entity_with_a_foreign_model_fails() {
    let mut engine = engine();
    let mut backend = HeadlessBackend::new();
    let mut textures = TextureStore::new(&mut backend);
    let foreign = GeometryStore::new()
        .load_model(
            &mut backend,
            &mut textures,
            &PrimitiveParser,
            &strata::FileImageDecoder,
            Primitive::Cone.path(),
        )
        .unwrap();

    let err = engine
        .apply(SceneCommand::AddEntity {
            model: foreign,
            name: "Cone".into(),
        })
        .unwrap_err();
    assert!(matches!(err, StrataError::InvalidHandle { .. }));
    assert_eq!(engine.scene().entity_count(), 0);
}

#[test]
fn add_light_returns_its_handle() {
    let mut engine = engine();
    let outcome = engine
        .apply(SceneCommand::AddLight {
            ty: LightType::Point,
            name: "Lamp".into(),
        })
        .unwrap();
    let CommandOutcome::Light(handle) = outcome else {
        panic!("expected a light, got {outcome:?}");
    };
    assert_eq!(engine.scene().light(handle).unwrap().name, "Lamp 0");
}

#[test]
fn transform_and_removal_commands() {
    let mut engine = populated();
    let (first, _) = engine.scene().entities().next().unwrap();
    let (sun, _) = engine.scene().lights().next().unwrap();
    let moved = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));

    assert_eq!(
        engine
            .apply(SceneCommand::SetTransform {
                entity: first,
                transform: moved,
            })
            .unwrap(),
        CommandOutcome::Applied
    );
    assert_eq!(engine.scene().entity(first).unwrap().transform(), &moved);

    engine.apply(SceneCommand::RemoveEntity(first)).unwrap();
    engine.apply(SceneCommand::RemoveLight(sun)).unwrap();
    assert_eq!(engine.scene().entity_count(), 3);
    assert_eq!(engine.scene().light_count(), 1);

    assert!(engine.apply(SceneCommand::RemoveEntity(first)).is_err());
    assert!(engine
        .apply(SceneCommand::SetTransform {
            entity: first,
            transform: moved,
        })
        .is_err());
}

#[test]
fn topology_and_inspection_commands_reach_the_composer() {
    let mut engine = engine();
    engine
        .apply(SceneCommand::SetRenderTopology(RenderTopology::Deferred))
        .unwrap();
    engine
        .apply(SceneCommand::SetInspectedTarget(RenderTarget::Normal))
        .unwrap();

    let composer = engine.renderer().composer();
    assert_eq!(composer.topology(), RenderTopology::Deferred);
    assert_eq!(composer.inspected_target(), RenderTarget::Normal);
}

// ============================================================================
// Frame loop
// ============================================================================

#[test]
fn update_moves_the_camera() {
    let mut engine = engine();
    let start = engine.camera().position();

    engine.update(&FrameInput::new(0.5).with_key(Key::W, ButtonState::Pressed));
    assert_ne!(engine.camera().position(), start);
}

#[test]
fn default_scene_renders_a_forward_frame() {
    let mut engine = populated();
    engine.renderer_mut().backend_mut().take_commands();

    let report = engine.render().unwrap();

    // geometry + debug light markers; no skybox or water configured
    assert_eq!(report.passes, 2);
    assert_eq!(report.entities_drawn, 4);
    assert_eq!(report.draw_calls, 5);
    assert_eq!(report.depth_blits, 0);
    assert_eq!(
        engine.renderer().backend().commands().last(),
        Some(&Command::Submit)
    );
}

#[test]
fn resize_updates_targets_and_camera() {
    let mut engine = engine();
    engine.resize(UVec2::new(640, 480)).unwrap();

    assert_eq!(engine.renderer().framebuffers().size(), UVec2::new(640, 480));
    assert_eq!(engine.renderer().settings().display_size(), UVec2::new(640, 480));
    assert!((engine.camera().aspect() - 640.0 / 480.0).abs() < 1e-5);
}
