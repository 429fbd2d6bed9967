//! Collaborator boundary for propensity-score estimation
//!
//! Fitting the binomial regression that produces propensity scores is
//! delegated to an external statistical-modeling library. The matching core
//! only consumes the resulting per-unit predicted probabilities, either as a
//! plain slice or through the [`PropensityFit`] trait implemented by the
//! external collaborator.

use arrow::record_batch::RecordBatch;

use crate::config::ModelSpec;
use crate::error::{MatchError, Result};

/// Interface consumed from an external regression collaborator
///
/// An implementation fits a binomial regression of the treatment column on
/// the covariates named in the model specification and returns one predicted
/// treatment probability per row, in row order.
pub trait PropensityFit {
    /// Fit the model once on the full dataset and predict per-unit
    /// treatment probabilities
    fn fit_predict(&self, data: &RecordBatch, spec: &ModelSpec) -> Result<Vec<f64>>;
}

/// Check that predicted probabilities are usable as distances
///
/// Scores must be finite and strictly inside (0, 1) so the logit transform
/// is defined for every unit.
pub(crate) fn validate_scores(scores: &[f64], num_rows: usize) -> Result<()> {
    if scores.len() != num_rows {
        return Err(MatchError::InvalidConfiguration(format!(
            "expected one score per row ({num_rows}), got {}",
            scores.len()
        )));
    }
    for (i, &p) in scores.iter().enumerate() {
        if !p.is_finite() || p <= 0.0 || p >= 1.0 {
            return Err(MatchError::InvalidConfiguration(format!(
                "predicted probability at row {i} must lie strictly in (0, 1), got {p}"
            )));
        }
    }
    Ok(())
}

/// Logit transform of a probability
#[inline]
#[must_use]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}
