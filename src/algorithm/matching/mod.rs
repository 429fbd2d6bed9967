//! Greedy nearest-neighbor matching for observational studies
//!
//! This module implements propensity-score and Mahalanobis-distance
//! nearest-neighbor matching with calipers, ratio control, and
//! replacement/no-replacement semantics. It includes:
//!
//! 1. Input validation against the matching configuration
//! 2. Unit pool partitioning and treated-pool ordering
//! 3. The greedy matching engine with caliper filtering
//! 4. Post-match assembly with matching weights
//!
//! Matching without replacement is order sensitive by construction: the
//! configured treated-unit ordering determines which controls remain
//! available for later treated units.

pub mod assembler;
pub mod caliper;
pub mod distance;
pub mod engine;
pub mod extraction;
pub mod matcher;
pub mod parallel;
pub mod pool;
pub mod types;
pub mod validation;

// Re-export key types
pub use distance::{CovariateMatrix, DistanceKernel};
pub use matcher::Matcher;
pub use pool::{UnitPool, UnitPools};
pub use types::{Cluster, MatchOutput};
