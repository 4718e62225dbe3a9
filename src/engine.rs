//! Engine Core Module
//!
//! [`Engine`] ties the edited scene, the fly camera and the [`Renderer`]
//! together. It has no window or GUI of its own: a frontend feeds it
//! [`FrameInput`] and [`SceneCommand`]s and displays the texture returned by
//! [`Renderer::render_target_texture`].
//!
//! # Example
//!
//! ```rust,ignore
//! use strata::{Collaborators, Engine, HeadlessBackend, Renderer, RendererSettings};
//!
//! let renderer = Renderer::new(HeadlessBackend::new(), RendererSettings::default(), Collaborators::default())?;
//! let mut engine = Engine::new(renderer);
//! let cube = engine.renderer_mut().load_primitive(strata::Primitive::Cube)?;
//! engine.populate_default_scene(cube, "Cube")?;
//!
//! loop {
//!     engine.update(&input);
//!     let report = engine.render()?;
//! }
//! ```

use glam::{Quat, UVec2, Vec3};

use crate::errors::Result;
use crate::renderer::backend::GpuBackend;
use crate::renderer::composer::FrameReport;
use crate::renderer::Renderer;
use crate::resources::handle::ModelHandle;
use crate::resources::primitives::Primitive;
use crate::scene::camera::Camera;
use crate::scene::command::{CommandOutcome, SceneCommand};
use crate::scene::input::FrameInput;
use crate::scene::light::LightType;
use crate::scene::scene::Scene;
use crate::scene::transform::Transform;

/// Radius of the circle the default scene places model instances on.
const DEFAULT_RING_RADIUS: f32 = 4.0;
const DEFAULT_RING_HEIGHT: f32 = 4.0;
const DEFAULT_INSTANCES: usize = 3;

/// Scene, camera and renderer of one editor session.
#[derive(Debug)]
pub struct Engine<B: GpuBackend> {
    renderer: Renderer<B>,
    scene: Scene,
    camera: Camera,
}

impl<B: GpuBackend> Engine<B> {
    /// Starts an empty scene with the camera from the renderer settings.
    #[must_use]
    pub fn new(renderer: Renderer<B>) -> Self {
        let settings = renderer.settings();
        let camera = Camera::new(&settings.camera, settings.display_size());
        Self {
            renderer,
            scene: Scene::new(),
            camera,
        }
    }

    /// Applies one editor command.
    pub fn apply(&mut self, command: SceneCommand) -> Result<CommandOutcome> {
        match command {
            SceneCommand::AddEntity { model, name } => {
                // Reject handles the geometry store never issued.
                self.renderer.geometry().model(model)?;
                let entity = self.scene.spawn_entity(&name, model);
                log::debug!("Added entity {entity} from {model}");
                Ok(CommandOutcome::Entity(entity))
            }
            SceneCommand::AddLight { ty, name } => {
                let light = self.scene.spawn_light(ty, &name);
                log::debug!("Added {ty:?} light {light}");
                Ok(CommandOutcome::Light(light))
            }
            SceneCommand::SetTransform { entity, transform } => {
                self.scene.set_transform(entity, transform)?;
                Ok(CommandOutcome::Applied)
            }
            SceneCommand::RemoveEntity(entity) => {
                self.scene.remove_entity(entity)?;
                Ok(CommandOutcome::Applied)
            }
            SceneCommand::RemoveLight(light) => {
                self.scene.remove_light(light)?;
                Ok(CommandOutcome::Applied)
            }
            SceneCommand::SetRenderTopology(topology) => {
                self.renderer.set_topology(topology);
                Ok(CommandOutcome::Applied)
            }
            SceneCommand::SetInspectedTarget(target) => {
                self.renderer.set_inspected_target(target);
                Ok(CommandOutcome::Applied)
            }
        }
    }

    /// Builds the start-up scene: three instances of `model` on a ring,
    /// a ground plane, one directional and one point light.
    pub fn populate_default_scene(&mut self, model: ModelHandle, name: &str) -> Result<()> {
        self.renderer.geometry().model(model)?;
        for i in 0..DEFAULT_INSTANCES {
            let angle = (120.0 * i as f32).to_radians();
            let position =
                Quat::from_rotation_y(angle) * Vec3::new(DEFAULT_RING_RADIUS, DEFAULT_RING_HEIGHT, 0.0);
            self.scene.add_entity(
                format!("{name} {i}"),
                model,
                Transform::from_position(position).with_rotation(Vec3::new(0.0, -90.0, 0.0)),
            );
        }

        let plane = self.renderer.load_primitive(Primitive::Plane)?;
        self.scene
            .add_entity("Playground", plane, Transform::default());

        self.scene
            .spawn_light(LightType::Directional, "Directional Light");
        self.scene.spawn_light(LightType::Point, "Point Light");

        log::info!(
            "Default scene: {} entities, {} lights",
            self.scene.entity_count(),
            self.scene.light_count()
        );
        Ok(())
    }

    /// Advances the camera by one frame of input.
    pub fn update(&mut self, input: &FrameInput) {
        self.camera.update(input);
    }

    pub fn render(&mut self) -> Result<FrameReport> {
        self.renderer.render(&self.scene, &self.camera)
    }

    /// Recreates the framebuffers and updates the camera aspect.
    pub fn resize(&mut self, size: UVec2) -> Result<()> {
        self.renderer.resize(size)?;
        self.camera.set_viewport(size);
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> &mut Renderer<B> {
        &mut self.renderer
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }
}
