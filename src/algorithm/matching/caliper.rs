//! Caliper calculation
//!
//! A caliper is expressed in standard-deviation units of the logit-scale
//! distance. This module converts it into an absolute threshold once, before
//! matching begins; the threshold is never recomputed as the control pool
//! shrinks.

use log::warn;

use crate::config::MatchConfig;

/// Convert the configured caliper into an absolute logit-scale threshold
///
/// The standard deviation is taken over the logit-transformed distance of
/// the entire dataset (both pools, before any removal). An infinite caliper
/// disables filtering. The caliper has no meaning for Mahalanobis matching;
/// a finite value there is accepted but ignored with a warning.
#[must_use]
pub fn caliper_threshold(config: &MatchConfig, all_logits: &[f64]) -> Option<f64> {
    if !config.distance.is_score_based() {
        if config.caliper.is_finite() {
            warn!("caliper is ignored for Mahalanobis matching");
        }
        return None;
    }
    if config.caliper.is_infinite() {
        return None;
    }
    Some(config.caliper * sample_std_dev(all_logits))
}

/// Sample standard deviation (n-1 denominator)
fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    (ss / (n - 1) as f64).sqrt()
}
