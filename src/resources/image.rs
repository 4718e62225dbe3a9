//! Decoded images and the image decoding collaborator.

use std::path::Path;

use image::DynamicImage;

use crate::errors::{Result, StrataError};

/// Decoded 8-bit pixels, scanlines stored bottom-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl Image {
    #[must_use]
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// A `width × height` image filled with one RGBA colour.
    #[must_use]
    pub fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self::new(width, height, 4, pixels)
    }

    /// Same pixels with RGB expanded to RGBA (opaque alpha).
    #[must_use]
    pub fn into_rgba(self) -> Self {
        if self.channels != 3 {
            return self;
        }
        let mut pixels = Vec::with_capacity(self.pixels.len() / 3 * 4);
        for rgb in self.pixels.chunks_exact(3) {
            pixels.extend_from_slice(rgb);
            pixels.push(u8::MAX);
        }
        Self::new(self.width, self.height, 4, pixels)
    }
}

/// Image decoding collaborator.
///
/// Implementations return vertically flipped scanlines and report the
/// native channel count; the texture store decides which counts it accepts.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<Image>;
}

/// Decodes files from disk with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageDecoder;

impl ImageDecoder for FileImageDecoder {
    fn decode(&self, path: &Path) -> Result<Image> {
        let decoded = image::open(path)
            .map_err(|e| StrataError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .flipv();

        let (width, height) = (decoded.width(), decoded.height());
        let (channels, pixels) = match decoded {
            DynamicImage::ImageLuma8(img) => (1, img.into_raw()),
            DynamicImage::ImageLumaA8(img) => (2, img.into_raw()),
            DynamicImage::ImageRgb8(img) => (3, img.into_raw()),
            DynamicImage::ImageRgba8(img) => (4, img.into_raw()),
            other => (4, other.to_rgba8().into_raw()),
        };

        Ok(Image::new(width, height, channels, pixels))
    }
}
