//! repofinder GitHub layer
//!
//! Provides the source-hosting API client:
//! - Token-authenticated REST requests with retry and backoff
//! - Rate-limit suspension until the advertised reset
//! - Link-header pagination
//! - Wire payloads mapped into repofinder-core types
//! - The [`HostApi`] trait the pipeline stages are written against

pub mod error;
pub mod client;
pub mod models;
pub mod api;

pub use error::*;
pub use client::*;
pub use api::*;
pub use models::{
    CommentEvent, CommitEvent, ContributorRef, IssueEvent, PullEvent, RateBucket, RateLimitStatus,
    ReleaseEvent, ReviewEvent, SearchPage,
};
