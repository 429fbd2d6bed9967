//! Inverse-probability-of-treatment weighting
//!
//! IPTW is a closed-form vectorized formula over the propensity scores, not
//! a matching algorithm. It is provided here as a thin collaborator next to
//! the matching core.

use crate::error::{MatchError, Result};
use crate::propensity::validate_scores;

fn check_lengths(treatment: &[bool], scores: &[f64]) -> Result<()> {
    if treatment.len() != scores.len() {
        return Err(MatchError::InvalidConfiguration(format!(
            "treatment and score lengths differ: {} vs {}",
            treatment.len(),
            scores.len()
        )));
    }
    validate_scores(scores, treatment.len())
}

/// Average-treatment-effect weights: `1/e` for treated, `1/(1-e)` for controls
pub fn ate_weights(treatment: &[bool], scores: &[f64]) -> Result<Vec<f64>> {
    check_lengths(treatment, scores)?;
    Ok(treatment
        .iter()
        .zip(scores)
        .map(|(&t, &e)| if t { 1.0 / e } else { 1.0 / (1.0 - e) })
        .collect())
}

/// Average-treatment-effect-on-the-treated weights: `1` for treated,
/// `e/(1-e)` for controls
pub fn att_weights(treatment: &[bool], scores: &[f64]) -> Result<Vec<f64>> {
    check_lengths(treatment, scores)?;
    Ok(treatment
        .iter()
        .zip(scores)
        .map(|(&t, &e)| if t { 1.0 } else { e / (1.0 - e) })
        .collect())
}

/// Stabilized ATE weights: the marginal treatment probability replaces the
/// constant numerator, which bounds the weight variance
pub fn stabilized_ate_weights(treatment: &[bool], scores: &[f64]) -> Result<Vec<f64>> {
    check_lengths(treatment, scores)?;
    let n = treatment.len() as f64;
    let p_treated = treatment.iter().filter(|&&t| t).count() as f64 / n;
    Ok(treatment
        .iter()
        .zip(scores)
        .map(|(&t, &e)| {
            if t {
                p_treated / e
            } else {
                (1.0 - p_treated) / (1.0 - e)
            }
        })
        .collect())
}
