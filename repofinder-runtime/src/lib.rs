//! repofinder runtime
//!
//! Coordinates a full run:
//! - Discovery of candidates from the identity queries
//! - Bounded-concurrency extraction and scoring
//! - Cancellation with partial results
//! - Export of the scored records

pub mod error;
pub mod context;
pub mod pipeline;
pub mod export;

pub use error::*;
pub use context::*;
pub use pipeline::*;
pub use export::*;
