//! repofinder core - domain model and scoring for repository discovery
//!
//! This crate provides the foundational primitives:
//! - Organization identity and search query construction
//! - Candidates and the signals gathered about them
//! - Confidence rubric and windowed activity scoring
//! - Issue and pull request handling figures
//! - Hierarchical keyword taxonomies and the classifier
//! - Scored records and run configuration

pub mod error;
pub mod identity;
pub mod query;
pub mod candidate;
pub mod signals;
pub mod evidence;
pub mod confidence;
pub mod activity;
pub mod engagement;
pub mod taxonomy;
pub mod classifier;
pub mod record;
pub mod config;

pub use error::*;
pub use identity::*;
pub use query::*;
pub use candidate::*;
pub use signals::*;
pub use evidence::*;
pub use confidence::*;
pub use activity::*;
pub use engagement::*;
pub use taxonomy::*;
pub use classifier::*;
pub use record::*;
pub use config::*;

/// Rubric total that maps to a confidence of 100
pub const MAX_CONFIDENCE_POINTS: f64 = 500.0;

/// Lowest activity score a scored repository can receive
pub const MIN_ACTIVITY_SCORE: f64 = 1.0;

/// Highest activity or confidence score
pub const MAX_SCORE: f64 = 100.0;

/// Label used when a classification level has no keyword hits
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Days counted per month of activity window
pub const DAYS_PER_MONTH: i64 = 30;

/// Default activity window in months
pub const DEFAULT_WINDOW_MONTHS: u32 = 6;
