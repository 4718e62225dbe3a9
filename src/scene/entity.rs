use glam::Mat4;

use crate::resources::handle::ModelHandle;
use crate::scene::transform::Transform;

/// A model instance placed in the scene.
///
/// The world matrix is cached and only recomputed by [`Entity::set_transform`].
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub model: ModelHandle,
    transform: Transform,
    world_matrix: Mat4,
}

impl Entity {
    #[must_use]
    pub fn new(name: impl Into<String>, model: ModelHandle, transform: Transform) -> Self {
        Self {
            name: name.into(),
            model,
            world_matrix: transform.matrix(),
            transform,
        }
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.world_matrix = transform.matrix();
    }
}
