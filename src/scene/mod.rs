//! Scene state edited by the GUI and consumed by the renderer.

pub mod camera;
pub mod command;
pub mod entity;
pub mod input;
pub mod light;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use command::{CommandOutcome, SceneCommand};
pub use entity::Entity;
pub use input::{ButtonState, FrameInput, Key};
pub use light::{Light, LightKind, LightType};
pub use scene::Scene;
pub use transform::Transform;
