//! Shader source loading
//!
//! The program registry reads template text through a [`ShaderSourceLoader`]
//! so built-in shaders, a shader directory on disk and in-memory test
//! sources all look the same to it.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;

use crate::errors::{Result, StrataError};

#[derive(RustEmbed)]
#[folder = "src/renderer/shaders"]
struct ShaderAssets;

/// Source of shader template text.
pub trait ShaderSourceLoader {
    fn read_source(&self, path: &Path) -> Result<String>;

    /// Last write time, `None` when the source cannot change at runtime.
    fn last_modified(&self, path: &Path) -> Option<SystemTime>;
}

fn missing(path: &Path) -> StrataError {
    StrataError::AssetMissing(path.to_path_buf())
}

/// Built-in shaders compiled into the binary.
///
/// With an override directory set, a file of the same name there wins, which
/// is what makes hot-reloading the built-in shaders possible.
#[derive(Debug, Default, Clone)]
pub struct EmbeddedShaderLoader {
    override_dir: Option<PathBuf>,
}

impl EmbeddedShaderLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    fn override_path(&self, path: &Path) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|dir| dir.join(path))
            .filter(|p| p.is_file())
    }
}

impl ShaderSourceLoader for EmbeddedShaderLoader {
    fn read_source(&self, path: &Path) -> Result<String> {
        if let Some(file) = self.override_path(path) {
            return Ok(std::fs::read_to_string(file)?);
        }
        let name = path.to_string_lossy();
        let file = ShaderAssets::get(&name).ok_or_else(|| missing(path))?;
        String::from_utf8(file.data.into_owned()).map_err(|_| missing(path))
    }

    fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        self.override_path(path)
            .and_then(|p| std::fs::metadata(p).ok())
            .and_then(|m| m.modified().ok())
    }
}

/// Shaders read from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsShaderLoader {
    root: PathBuf,
}

impl FsShaderLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderSourceLoader for FsShaderLoader {
    fn read_source(&self, path: &Path) -> Result<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                missing(&full)
            } else {
                StrataError::Io(e)
            }
        })
    }

    fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(self.root.join(path))
            .and_then(|m| m.modified())
            .ok()
    }
}

/// In-memory sources with a revision counter as modification time.
#[derive(Debug, Default, Clone)]
pub struct MemoryShaderLoader {
    sources: FxHashMap<PathBuf, (String, u64)>,
    revision: u64,
}

impl MemoryShaderLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    /// Adds or replaces a source, bumping its modification time.
    pub fn insert(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.revision += 1;
        self.sources
            .insert(path.into(), (source.into(), self.revision));
    }
}

impl ShaderSourceLoader for MemoryShaderLoader {
    fn read_source(&self, path: &Path) -> Result<String> {
        self.sources
            .get(path)
            .map(|(source, _)| source.clone())
            .ok_or_else(|| missing(path))
    }

    fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        self.sources
            .get(path)
            .map(|&(_, rev)| SystemTime::UNIX_EPOCH + Duration::from_secs(rev))
    }
}
