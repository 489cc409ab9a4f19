//! Error Types
//!
//! This module defines the error types used throughout the post-processing
//! pipeline.
//!
//! # Overview
//!
//! The main error type [`PostFxError`] covers every failure mode of the
//! orchestration layer:
//! - Configuration errors (missing materials, undeclared shader bindings)
//! - Invalid resource requests (zero-sized render targets)
//! - Stale history requests (cameras that are no longer tracked)
//! - Backend failures reported by the graphics substrate
//!
//! # Containment
//!
//! None of these errors is fatal. The scheduler contains every error at the
//! pass level: a failing pass is logged and skipped, the remaining passes and
//! cameras keep rendering.
//!
//! ```rust,ignore
//! use myth_postfx::errors::{PostFxError, Result};
//!
//! fn execute() -> Result<()> {
//!     Err(PostFxError::configuration("Tone Mapping", "material not bound"))
//! }
//! ```

use thiserror::Error;

use crate::renderer::graph::history::HistorySlotId;
use crate::renderer::registry::CameraKey;

/// The main error type for the post-processing pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostFxError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A shader, material or compute kernel reference is missing or invalid.
    ///
    /// The affected pass produces no visual change for the frame.
    #[error("Configuration error in '{pass}': {reason}")]
    Configuration {
        /// Name of the pass that hit the error
        pass: String,
        /// Human-readable description
        reason: String,
    },

    /// A shader binding name was resolved without being declared at build time.
    #[error("Shader binding '{0}' was not declared in the binding table")]
    MissingBinding(String),

    /// Two passes were registered for the same settings kind.
    #[error("A pass is already registered for settings kind {0}")]
    DuplicatePass(String),

    /// Pipeline settings could not be parsed.
    #[error("Settings parse error: {0}")]
    Config(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A render target was requested with a zero dimension.
    #[error("Invalid resource '{label}': requested {width}x{height}")]
    InvalidResource {
        /// Debug label of the requested resource
        label: String,
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// A texture handle does not refer to a live backend texture.
    #[error("Unknown texture handle")]
    UnknownTexture,

    /// A history slot was requested for a camera that is not tracked.
    ///
    /// Callers treat this as "no history available" and disable their
    /// temporal path for the frame.
    #[error("Stale history request: camera {camera:?} slot '{slot}'")]
    StaleHistoryRequest {
        /// Camera the request was made for
        camera: CameraKey,
        /// Requested slot
        slot: HistorySlotId,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The graphics backend rejected a command.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl PostFxError {
    /// Shorthand for [`PostFxError::Configuration`].
    pub fn configuration(pass: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            pass: pass.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`PostFxError::InvalidResource`].
    pub fn invalid_resource(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self::InvalidResource {
            label: label.into(),
            width,
            height,
        }
    }

    /// Returns `true` for configuration problems (logged once per pass).
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::MissingBinding(_))
    }
}

impl From<serde_json::Error> for PostFxError {
    fn from(err: serde_json::Error) -> Self {
        PostFxError::Config(err.to_string())
    }
}

/// Alias for `Result<T, PostFxError>`.
pub type Result<T> = std::result::Result<T, PostFxError>;
