//! A Rust library for constructing comparable treatment and control groups
//! from observational data, via greedy nearest-neighbor matching on
//! propensity scores or Mahalanobis distance, with inverse-probability
//! weighting as a thin collaborator.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod iptw;
pub mod propensity;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use algorithm::matching::{Cluster, MatchOutput, Matcher};
pub use config::{DistanceMetric, MatchConfig, MatchConfigBuilder, ModelSpec, TreatedOrder};
pub use error::{MatchError, Result};
pub use propensity::PropensityFit;

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;
