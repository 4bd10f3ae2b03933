//! # Error Types
//!
//! This module defines error types used throughout the envelope-templates library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for template operations
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template or document file could not be read or written
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template source is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A required key is absent from the loaded data
    #[error("{context}: missing required key '{key}'")]
    MissingKey {
        context: &'static str,
        key: &'static str,
    },

    /// Loaded data has the wrong shape
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The PDF overlay renderer failed or is not available
    #[error("PDF overlay error: {0}")]
    Overlay(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TemplateError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TemplateError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, TemplateError>;
