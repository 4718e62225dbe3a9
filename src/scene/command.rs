//! Scene-mutation commands issued by the editor.

use crate::resources::handle::{EntityHandle, LightHandle, ModelHandle};
use crate::scene::light::LightType;
use crate::scene::transform::Transform;
use crate::settings::{RenderTarget, RenderTopology};

#[derive(Debug, Clone)]
pub enum SceneCommand {
    /// Instantiate a loaded model under a unique name derived from `name`.
    AddEntity { model: ModelHandle, name: String },
    AddLight { ty: LightType, name: String },
    SetTransform {
        entity: EntityHandle,
        transform: Transform,
    },
    RemoveEntity(EntityHandle),
    RemoveLight(LightHandle),
    SetRenderTopology(RenderTopology),
    SetInspectedTarget(RenderTarget),
}

/// What applying a [`SceneCommand`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Entity(EntityHandle),
    Light(LightHandle),
    Applied,
}
