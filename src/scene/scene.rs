use crate::errors::Result;
use crate::resources::handle::{EntityHandle, LightHandle, ModelHandle};
use crate::scene::entity::Entity;
use crate::scene::light::{Light, LightType};
use crate::scene::transform::Transform;

/// Entities and lights of the edited scene.
///
/// Both lists are index-stable: removal leaves a tombstone so handles held by
/// the editor never shift.
#[derive(Debug, Default, Clone)]
pub struct Scene {
    entities: Vec<Option<Entity>>,
    lights: Vec<Option<Light>>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Entities
    // ========================================================================

    pub fn add_entity(
        &mut self,
        name: impl Into<String>,
        model: ModelHandle,
        transform: Transform,
    ) -> EntityHandle {
        let handle = EntityHandle::from_index(self.entities.len());
        self.entities.push(Some(Entity::new(name, model, transform)));
        handle
    }

    /// Adds an entity named `"<base> N"`, N counting existing names that
    /// contain `base`.
    pub fn spawn_entity(&mut self, base: &str, model: ModelHandle) -> EntityHandle {
        let name = numbered_name(base, self.entities().map(|(_, e)| e.name.as_str()));
        self.add_entity(name, model, Transform::default())
    }

    pub fn entity(&self, handle: EntityHandle) -> Result<&Entity> {
        self.entities
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| handle.invalid())
    }

    pub fn set_transform(&mut self, handle: EntityHandle, transform: Transform) -> Result<()> {
        let entity = self
            .entities
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| handle.invalid())?;
        entity.set_transform(transform);
        Ok(())
    }

    pub fn remove_entity(&mut self, handle: EntityHandle) -> Result<Entity> {
        self.entities
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or_else(|| handle.invalid())
    }

    /// Live entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (EntityHandle::from_index(i), e)))
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities().count()
    }

    // ========================================================================
    // Lights
    // ========================================================================

    pub fn add_light(&mut self, light: Light) -> LightHandle {
        let handle = LightHandle::from_index(self.lights.len());
        self.lights.push(Some(light));
        handle
    }

    /// Adds a default light named `"<base> N"`.
    pub fn spawn_light(&mut self, ty: LightType, base: &str) -> LightHandle {
        let name = numbered_name(base, self.lights().map(|(_, l)| l.name.as_str()));
        self.add_light(Light::instance(ty, name))
    }

    pub fn light(&self, handle: LightHandle) -> Result<&Light> {
        self.lights
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| handle.invalid())
    }

    pub fn light_mut(&mut self, handle: LightHandle) -> Result<&mut Light> {
        self.lights
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| handle.invalid())
    }

    pub fn remove_light(&mut self, handle: LightHandle) -> Result<Light> {
        self.lights
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or_else(|| handle.invalid())
    }

    /// Live lights in insertion order.
    pub fn lights(&self) -> impl Iterator<Item = (LightHandle, &Light)> {
        self.lights
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_ref().map(|l| (LightHandle::from_index(i), l)))
    }

    #[must_use]
    pub fn light_count(&self) -> usize {
        self.lights().count()
    }
}

fn numbered_name<'a>(base: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let repeats = existing.filter(|name| name.contains(base)).count();
    format!("{base} {repeats}")
}
