//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`StrataError`] separates two families of failure:
//!
//! - **Structural** failures (shader compile, framebuffer completeness,
//!   attribute binding, uniform overflow) abort render setup. They are
//!   always returned to the caller.
//! - **Content** failures (missing texture, bad cubemap face) are logged and
//!   degraded by the store that hit them; they only surface as an `Err` from
//!   the direct load call so the caller can pick a fallback.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, StrataError>`.
//!
//! ```rust,ignore
//! use strata::errors::{StrataError, Result};
//!
//! fn setup() -> Result<()> {
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::renderer::backend::FramebufferStatus;

/// Shader stage named in compile diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Template variable injected while rendering this stage.
    #[must_use]
    pub const fn define(self) -> &'static str {
        match self {
            Self::Vertex => "VERTEX",
            Self::Fragment => "FRAGMENT",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// The main error type for the Strata engine.
#[derive(Error, Debug)]
pub enum StrataError {
    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// A stage failed to preprocess, parse or validate.
    #[error("Failed to compile {stage} stage of program '{program}': {message}")]
    Compile {
        program: String,
        stage: ShaderStage,
        message: String,
    },

    /// The two stages do not form a usable program.
    #[error("Failed to link program '{program}': {message}")]
    Link { program: String, message: String },

    /// The shader template could not be rendered.
    #[error("Shader template error: {0}")]
    Template(String),

    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset could not be read or decoded.
    #[error("Asset missing: {0}")]
    AssetMissing(PathBuf),

    /// The asset parsed but contains no geometry.
    #[error("Asset contains no geometry: {0}")]
    AssetEmpty(PathBuf),

    /// The model parser rejected the file.
    #[error("Failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// The image decoder rejected the file.
    #[error("Failed to decode '{path}': {message}")]
    Decode { path: PathBuf, message: String },

    /// Decoded image has a channel layout the texture store cannot upload.
    #[error("Unsupported channel count {channels} in '{path}'")]
    UnsupportedChannelCount { path: PathBuf, channels: u8 },

    // ========================================================================
    // Render Setup Errors
    // ========================================================================
    /// A program input has no matching attribute in the submesh layout.
    #[error("Program '{program}' requires attribute location {location} which the mesh does not provide")]
    AttributeUnresolved { program: String, location: u32 },

    /// The backend rejected a framebuffer.
    #[error("Framebuffer '{target}' is incomplete: {status}")]
    FramebufferIncomplete {
        target: &'static str,
        status: FramebufferStatus,
    },

    /// The frame's uniform data does not fit the uniform block.
    #[error("Uniform arena overflow: {requested} bytes requested, capacity is {capacity}")]
    UniformOverflow { requested: u64, capacity: u64 },

    /// `begin_frame`/`end_frame` bracketing was violated.
    #[error("Uniform arena misuse: {0}")]
    FrameState(&'static str),

    /// A handle does not refer to a live entry.
    #[error("Invalid {kind} handle: {index}")]
    InvalidHandle { kind: &'static str, index: u32 },

    // ========================================================================
    // I/O & Serialization Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<minijinja::Error> for StrataError {
    fn from(err: minijinja::Error) -> Self {
        Self::Template(err.to_string())
    }
}

/// Alias for `Result<T, StrataError>`.
pub type Result<T> = std::result::Result<T, StrataError>;
