//! Errors that end a run

use std::path::PathBuf;
use thiserror::Error;

use repofinder_agents::AgentError;
use repofinder_core::ConfigError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write CSV rows: {0}")]
    Csv(#[from] csv::Error),
}
