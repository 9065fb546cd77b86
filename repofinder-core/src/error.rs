//! Configuration errors, raised before any network call is made

use std::path::PathBuf;
use thiserror::Error;

/// Problems with user-supplied configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Custom metric weights must sum to 100, got {0}")]
    WeightSum(f64),

    #[error("Weight for {metric} must be a non-negative number, got {value}")]
    InvalidWeight { metric: String, value: f64 },

    #[error("Ceiling for {metric} must be a non-negative number, got {value}")]
    InvalidCeiling { metric: String, value: f64 },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Organization identity has no searchable attribute")]
    EmptyIdentity,

    #[error("Activity window must be at least one month")]
    EmptyWindow,

    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing required setting: {0}")]
    Missing(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
