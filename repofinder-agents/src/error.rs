//! Errors from pipeline stages

use repofinder_core::RepoId;
use repofinder_github::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("No usable search queries")]
    NoQueries,

    #[error("Search API unreachable: all {attempted} queries failed (last: {last})")]
    SearchUnavailable { attempted: usize, last: String },

    #[error("Run aborted: {0}")]
    Fatal(#[source] ApiError),

    #[error("{id} skipped: {reason}")]
    Skipped { id: RepoId, reason: String },

    #[error("{id} failed: {source}")]
    Failed {
        id: RepoId,
        #[source]
        source: ApiError,
    },
}

impl AgentError {
    /// Classify an error on the fetch a candidate cannot be scored without
    pub fn for_candidate(id: &RepoId, err: ApiError) -> Self {
        if err.is_fatal() {
            AgentError::Fatal(err)
        } else if err.is_permanent() {
            AgentError::Skipped {
                id: id.clone(),
                reason: err.to_string(),
            }
        } else {
            AgentError::Failed {
                id: id.clone(),
                source: err,
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Fatal(_) | AgentError::SearchUnavailable { .. } | AgentError::NoQueries
        )
    }
}
