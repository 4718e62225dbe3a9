//! Materials
//!
//! [`MaterialData`] is the parser-side description (texture *paths*);
//! [`Material`] is the store-side record (texture *handles*). An absent
//! handle resolves to a neutral default texture at draw time.

use std::path::PathBuf;

use glam::Vec3;

use crate::resources::handle::TextureHandle;

/// The texture slots a material can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    Emissive,
    Specular,
    Normal,
    Bump,
}

impl TextureSlot {
    pub const ALL: [Self; 5] = [
        Self::Albedo,
        Self::Emissive,
        Self::Specular,
        Self::Normal,
        Self::Bump,
    ];
}

/// Material description as produced by a model parser.
#[derive(Debug, Clone)]
pub struct MaterialData {
    pub name: String,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub albedo: Option<PathBuf>,
    pub emissive: Option<PathBuf>,
    pub specular_map: Option<PathBuf>,
    pub normal: Option<PathBuf>,
    pub bump: Option<PathBuf>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec3::ONE,
            specular: Vec3::splat(0.5),
            shininess: 32.0,
            albedo: None,
            emissive: None,
            specular_map: None,
            normal: None,
            bump: None,
        }
    }
}

impl MaterialData {
    #[must_use]
    pub fn texture_path(&self, slot: TextureSlot) -> Option<&PathBuf> {
        match slot {
            TextureSlot::Albedo => self.albedo.as_ref(),
            TextureSlot::Emissive => self.emissive.as_ref(),
            TextureSlot::Specular => self.specular_map.as_ref(),
            TextureSlot::Normal => self.normal.as_ref(),
            TextureSlot::Bump => self.bump.as_ref(),
        }
    }
}

/// Material as stored in the geometry store.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub albedo: Option<TextureHandle>,
    pub emissive: Option<TextureHandle>,
    pub specular_map: Option<TextureHandle>,
    pub normal: Option<TextureHandle>,
    pub bump: Option<TextureHandle>,
}

impl Material {
    /// Material with the given parameters and no textures.
    #[must_use]
    pub fn untextured(data: &MaterialData) -> Self {
        Self {
            name: data.name.clone(),
            diffuse: data.diffuse,
            specular: data.specular,
            shininess: data.shininess,
            albedo: None,
            emissive: None,
            specular_map: None,
            normal: None,
            bump: None,
        }
    }

    #[must_use]
    pub fn texture(&self, slot: TextureSlot) -> Option<TextureHandle> {
        match slot {
            TextureSlot::Albedo => self.albedo,
            TextureSlot::Emissive => self.emissive,
            TextureSlot::Specular => self.specular_map,
            TextureSlot::Normal => self.normal,
            TextureSlot::Bump => self.bump,
        }
    }

    pub fn set_texture(&mut self, slot: TextureSlot, handle: Option<TextureHandle>) {
        let target = match slot {
            TextureSlot::Albedo => &mut self.albedo,
            TextureSlot::Emissive => &mut self.emissive,
            TextureSlot::Specular => &mut self.specular_map,
            TextureSlot::Normal => &mut self.normal,
            TextureSlot::Bump => &mut self.bump,
        };
        *target = handle;
    }
}
