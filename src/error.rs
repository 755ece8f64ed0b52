//! Error types shared across the crate.

use std::io;
use std::path::PathBuf;

/// Errors produced by route optimization and hyperparameter tuning.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was invoked before its inputs were in place.
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// The route optimizer was used before its road network was loaded.
    #[error("Unconfigured state: road network graph has not been loaded")]
    UnconfiguredState,
    #[error("Could not load graph cache {path}: {reason}")]
    CacheLoadFailure { path: PathBuf, reason: String },
    #[error("Surrogate model not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("Invalid coordinate: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
    #[error("Graph provider error: {0}")]
    Provider(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }
}
