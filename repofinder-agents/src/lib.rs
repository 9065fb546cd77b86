//! repofinder pipeline stages
//!
//! Each stage talks to the hosting service through [`repofinder_github::HostApi`]:
//! - **Discovery**: runs the identity queries and folds matches into candidates
//! - **Extractor**: gathers every signal about one candidate
//! - **Contributors**: contributor profiles with a per-run cache
//! - **Activity**: event counts over the activity window

pub mod error;
pub mod discovery;
pub mod contributors;
pub mod activity;
pub mod extractor;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::*;
pub use discovery::*;
pub use contributors::*;
pub use activity::*;
pub use extractor::*;
