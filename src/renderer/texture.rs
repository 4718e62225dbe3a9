//! Texture Store
//!
//! Owns GPU textures created from decoded images, render targets and
//! cubemaps, plus four 1×1 defaults that stand in for absent material
//! textures.
//!
//! - [`TextureStore::load_texture_2d`] is cached by path: a second load of
//!   the same path returns the same handle without decoding again.
//! - Loaded textures get a full mip chain built on the CPU; render targets
//!   get none and use nearest filtering.
//! - A cubemap face that fails to decode is logged and skipped.

use std::path::{Path, PathBuf};

use glam::UVec2;
use image::imageops::FilterType;
use rustc_hash::FxHashMap;

use crate::errors::{Result, StrataError};
use crate::renderer::backend::{
    FilterMode, GpuBackend, PixelFormat, TextureDesc, TextureId, TextureKind,
};
use crate::resources::handle::TextureHandle;
use crate::resources::image::{Image, ImageDecoder};
use crate::resources::material::TextureSlot;

/// A live GPU texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub id: TextureId,
    /// Source file; `None` for procedural textures and render targets.
    pub path: Option<PathBuf>,
    pub size: UVec2,
    pub format: PixelFormat,
    pub kind: TextureKind,
    pub mip_levels: u32,
}

/// Neutral textures created with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTextures {
    pub white: TextureHandle,
    pub black: TextureHandle,
    /// Flat tangent-space normal (0.5, 0.5, 1).
    pub normal: TextureHandle,
    /// Marks content that failed to load when used explicitly.
    pub magenta: TextureHandle,
}

impl DefaultTextures {
    /// Fallback used when a material leaves `slot` empty.
    #[must_use]
    pub fn for_slot(&self, slot: TextureSlot) -> TextureHandle {
        match slot {
            TextureSlot::Albedo | TextureSlot::Specular => self.white,
            TextureSlot::Emissive => self.black,
            TextureSlot::Normal | TextureSlot::Bump => self.normal,
        }
    }
}

#[derive(Debug)]
pub struct TextureStore {
    textures: Vec<Option<Texture>>,
    by_path: FxHashMap<PathBuf, TextureHandle>,
    defaults: DefaultTextures,
}

impl TextureStore {
    pub fn new(backend: &mut dyn GpuBackend) -> Self {
        let mut store = Self {
            textures: Vec::new(),
            by_path: FxHashMap::default(),
            defaults: DefaultTextures {
                white: TextureHandle(0),
                black: TextureHandle(0),
                normal: TextureHandle(0),
                magenta: TextureHandle(0),
            },
        };
        store.defaults = DefaultTextures {
            white: store.create_solid(backend, "default white", [255, 255, 255, 255]),
            black: store.create_solid(backend, "default black", [0, 0, 0, 255]),
            normal: store.create_solid(backend, "default normal", [128, 128, 255, 255]),
            magenta: store.create_solid(backend, "default magenta", [255, 0, 255, 255]),
        };
        store
    }

    #[inline]
    #[must_use]
    pub fn defaults(&self) -> &DefaultTextures {
        &self.defaults
    }

    /// Decodes and uploads an image, or returns the handle of the previous
    /// load of the same path.
    pub fn load_texture_2d(
        &mut self,
        backend: &mut dyn GpuBackend,
        decoder: &dyn ImageDecoder,
        path: impl AsRef<Path>,
    ) -> Result<TextureHandle> {
        let path = path.as_ref();
        if let Some(&handle) = self.by_path.get(path) {
            return Ok(handle);
        }

        let image = decoder.decode(path).map_err(|e| {
            log::warn!("Could not load texture {}: {e}", path.display());
            StrataError::AssetMissing(path.to_path_buf())
        })?;
        let format = match image.channels {
            3 => PixelFormat::Rgb8,
            4 => PixelFormat::Rgba8,
            channels => {
                log::warn!(
                    "Texture {} has {channels} channels, only RGB and RGBA are supported",
                    path.display()
                );
                return Err(StrataError::UnsupportedChannelCount {
                    path: path.to_path_buf(),
                    channels,
                });
            }
        };

        let chain = build_mip_chain(&image);
        let levels: Vec<&[u8]> = chain.iter().map(Vec::as_slice).collect();
        let size = UVec2::new(image.width, image.height);
        let id = backend.create_texture(
            &TextureDesc {
                label: &path.to_string_lossy(),
                size,
                format,
                kind: TextureKind::D2,
                filter: FilterMode::Linear,
                mip_levels: levels.len() as u32,
                render_target: false,
            },
            &levels,
        );
        log::debug!(
            "Loaded texture {} ({}x{}, {} mips)",
            path.display(),
            size.x,
            size.y,
            levels.len()
        );

        let handle = self.push(Texture {
            id,
            path: Some(path.to_path_buf()),
            size,
            format,
            kind: TextureKind::D2,
            mip_levels: levels.len() as u32,
        });
        self.by_path.insert(path.to_path_buf(), handle);
        Ok(handle)
    }

    /// Uninitialised attachment texture: no mips, nearest filtering.
    pub fn create_render_target(
        &mut self,
        backend: &mut dyn GpuBackend,
        label: &str,
        size: UVec2,
        format: PixelFormat,
    ) -> TextureHandle {
        let id = backend.create_texture(
            &TextureDesc {
                label,
                size,
                format,
                kind: TextureKind::D2,
                filter: FilterMode::Nearest,
                mip_levels: 1,
                render_target: true,
            },
            &[],
        );
        self.push(Texture {
            id,
            path: None,
            size,
            format,
            kind: TextureKind::D2,
            mip_levels: 1,
        })
    }

    /// Uploads six faces (+X −X +Y −Y +Z −Z) into one cubemap.
    ///
    /// The first face that decodes fixes the cubemap size; faces that fail
    /// to decode or do not match it are logged and left untouched.
    pub fn create_cubemap(
        &mut self,
        backend: &mut dyn GpuBackend,
        decoder: &dyn ImageDecoder,
        faces: &[PathBuf; 6],
    ) -> TextureHandle {
        let decoded: Vec<Option<Image>> = faces
            .iter()
            .map(|path| match decoder.decode(path) {
                Ok(img) if matches!(img.channels, 3 | 4) => Some(img.into_rgba()),
                Ok(img) => {
                    log::error!(
                        "Cubemap face {} has {} channels, skipping",
                        path.display(),
                        img.channels
                    );
                    None
                }
                Err(e) => {
                    log::error!("Cubemap face {} failed to load: {e}", path.display());
                    None
                }
            })
            .collect();

        let size = decoded
            .iter()
            .flatten()
            .next()
            .map_or(UVec2::ONE, |img| UVec2::new(img.width, img.height));

        let id = backend.create_texture(
            &TextureDesc {
                label: "cubemap",
                size,
                format: PixelFormat::Rgba8,
                kind: TextureKind::Cube,
                filter: FilterMode::Linear,
                mip_levels: 1,
                render_target: false,
            },
            &[],
        );

        for (face, image) in decoded.iter().enumerate() {
            let Some(image) = image else { continue };
            if UVec2::new(image.width, image.height) != size {
                log::error!(
                    "Cubemap face {} is {}x{}, expected {}x{}; skipping",
                    faces[face].display(),
                    image.width,
                    image.height,
                    size.x,
                    size.y
                );
                continue;
            }
            backend.write_cubemap_face(id, face as u32, &image.pixels);
        }

        self.push(Texture {
            id,
            path: None,
            size,
            format: PixelFormat::Rgba8,
            kind: TextureKind::Cube,
            mip_levels: 1,
        })
    }

    /// Destroys a texture; its handle becomes invalid.
    pub fn release(&mut self, backend: &mut dyn GpuBackend, handle: TextureHandle) {
        if let Some(texture) = self.textures.get_mut(handle.index()).and_then(Option::take) {
            if let Some(path) = &texture.path {
                self.by_path.remove(path);
            }
            backend.destroy_texture(texture.id);
        }
    }

    pub fn get(&self, handle: TextureHandle) -> Result<&Texture> {
        self.textures
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| handle.invalid())
    }

    /// Backend id of `handle`, or of `fallback` when `handle` is absent.
    pub fn resolve(&self, handle: Option<TextureHandle>, fallback: TextureHandle) -> Result<TextureId> {
        Ok(self.get(handle.unwrap_or(fallback))?.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, texture: Texture) -> TextureHandle {
        let handle = TextureHandle::from_index(self.textures.len());
        self.textures.push(Some(texture));
        handle
    }

    fn create_solid(&mut self, backend: &mut dyn GpuBackend, label: &str, rgba: [u8; 4]) -> TextureHandle {
        let size = UVec2::ONE;
        let id = backend.create_texture(
            &TextureDesc {
                label,
                size,
                format: PixelFormat::Rgba8,
                kind: TextureKind::D2,
                filter: FilterMode::Linear,
                mip_levels: 1,
                render_target: false,
            },
            &[&rgba],
        );
        self.push(Texture {
            id,
            path: None,
            size,
            format: PixelFormat::Rgba8,
            kind: TextureKind::D2,
            mip_levels: 1,
        })
    }
}

/// Full mip chain down to 1×1, level 0 first.
fn build_mip_chain(image: &Image) -> Vec<Vec<u8>> {
    let levels = mip_level_count(image.width, image.height);
    let chain = match image.channels {
        3 => image::RgbImage::from_raw(image.width, image.height, image.pixels.clone())
            .map(|base| downsample_chain(base, levels)),
        _ => image::RgbaImage::from_raw(image.width, image.height, image.pixels.clone())
            .map(|base| downsample_chain(base, levels)),
    };
    // A pixel buffer that does not match its dimensions uploads level 0 only.
    chain.unwrap_or_else(|| vec![image.pixels.clone()])
}

fn downsample_chain<P>(base: image::ImageBuffer<P, Vec<u8>>, levels: u32) -> Vec<Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    let mut chain = Vec::with_capacity(levels as usize);
    let (mut width, mut height) = base.dimensions();
    for _ in 1..levels {
        width = (width / 2).max(1);
        height = (height / 2).max(1);
        chain.push(image::imageops::resize(&base, width, height, FilterType::Triangle).into_raw());
    }
    chain.insert(0, base.into_raw());
    chain
}

#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}
