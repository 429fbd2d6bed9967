//! Configuration types for the matching workflow
//!
//! This module defines the distance metric, treated-unit ordering policy,
//! model specification, and the matching configuration with its builder.

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Distance metric used to compare treated and control units
///
/// Using an enum rather than a string-keyed option makes the allowed-value
/// check exhaustive at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Predicted treatment probability from an external binomial regression
    Probability,
    /// Logit transform of the predicted treatment probability
    Logit,
    /// Covariate-space distance scaled by the inverse control-group covariance
    Mahalanobis,
}

impl DistanceMetric {
    /// Whether the metric operates on a scalar per-unit score
    #[must_use]
    pub const fn is_score_based(self) -> bool {
        matches!(self, Self::Probability | Self::Logit)
    }
}

/// Ordering policy for the treated pool
///
/// Greedy matching without replacement is order sensitive, so the policy
/// observably changes the outcome. This is a documented property of greedy
/// nearest-neighbor matching, not an implementation accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreatedOrder {
    /// Descending by distance, ties broken by original row order
    Largest,
    /// Ascending by distance, ties broken by original row order
    Smallest,
    /// Uniform random permutation from a seeded generator
    Random,
}

/// Model specification naming the treatment column and covariates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Name of the binary treatment column
    pub treatment: String,
    /// Names of the covariate columns
    pub covariates: Vec<String>,
}

impl ModelSpec {
    /// Create a new model specification
    #[must_use]
    pub fn new(treatment: impl Into<String>, covariates: Vec<String>) -> Self {
        Self {
            treatment: treatment.into(),
            covariates,
        }
    }
}

/// Configuration for the matching process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Distance metric to match on
    pub distance: DistanceMetric,

    /// Number of controls to match to each treated unit
    pub ratio: usize,

    /// Whether controls may be matched to more than one treated unit
    pub replacement: bool,

    /// Caliper in standard-deviation units of the logit-scale distance;
    /// `f64::INFINITY` disables the caliper. JSON cannot express infinity,
    /// so a disabled caliper is written as `null` and read back from `null`
    /// or a missing field.
    #[serde(with = "caliper_serde", default = "no_caliper")]
    pub caliper: f64,

    /// Ordering policy for the treated pool
    pub order: TreatedOrder,

    /// Seed for the random permutation (used only when `order` is `Random`)
    pub seed: u64,

    /// Whether to drop clusters with fewer than `ratio` controls entirely
    /// (only meaningful without replacement)
    pub discard_incomplete: bool,

    /// Whether to use parallel processing for replacement-mode matching
    pub use_parallel: bool,
}

const fn no_caliper() -> f64 {
    f64::INFINITY
}

/// Maps the non-finite "no caliper" sentinel to JSON `null` and back
mod caliper_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(caliper: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if caliper.is_finite() {
            serializer.serialize_some(caliper)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            distance: DistanceMetric::Probability,
            ratio: 1,
            replacement: false,
            caliper: f64::INFINITY,
            order: TreatedOrder::Largest,
            seed: 0,
            discard_incomplete: false,
            use_parallel: true,
        }
    }
}

impl MatchConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for constructing a matching configuration
    #[must_use]
    pub fn builder() -> MatchConfigBuilder {
        MatchConfigBuilder::new()
    }

    /// Check the numeric fields for consistency
    ///
    /// The metric, ordering policy, and boolean flags are well-typed by
    /// construction, so only ratio and caliper can hold bad values.
    pub fn validate(&self) -> Result<()> {
        if self.ratio == 0 {
            return Err(MatchError::InvalidConfiguration(
                "ratio must be a positive integer, got 0".to_string(),
            ));
        }
        if self.caliper.is_nan() || self.caliper < 0.0 {
            return Err(MatchError::InvalidConfiguration(format!(
                "caliper must be a non-negative number or infinity, got {}",
                self.caliper
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a matching configuration
#[derive(Debug, Clone, Default)]
pub struct MatchConfigBuilder {
    config: MatchConfig,
}

impl MatchConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: MatchConfig::default(),
        }
    }

    /// Set the distance metric
    #[must_use]
    pub const fn distance(mut self, distance: DistanceMetric) -> Self {
        self.config.distance = distance;
        self
    }

    /// Set the matching ratio
    #[must_use]
    pub const fn ratio(mut self, ratio: usize) -> Self {
        self.config.ratio = ratio;
        self
    }

    /// Set whether controls may be reused across clusters
    #[must_use]
    pub const fn replacement(mut self, replacement: bool) -> Self {
        self.config.replacement = replacement;
        self
    }

    /// Set the caliper in standard-deviation units
    #[must_use]
    pub const fn caliper(mut self, caliper: f64) -> Self {
        self.config.caliper = caliper;
        self
    }

    /// Set the treated-pool ordering policy
    #[must_use]
    pub const fn order(mut self, order: TreatedOrder) -> Self {
        self.config.order = order;
        self
    }

    /// Set the random seed
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set whether incomplete clusters are discarded
    #[must_use]
    pub const fn discard_incomplete(mut self, discard: bool) -> Self {
        self.config.discard_incomplete = discard;
        self
    }

    /// Set whether to use parallel processing for replacement-mode matching
    #[must_use]
    pub const fn use_parallel(mut self, parallel: bool) -> Self {
        self.config.use_parallel = parallel;
        self
    }

    /// Build the matching configuration
    #[must_use]
    pub const fn build(self) -> MatchConfig {
        self.config
    }
}
