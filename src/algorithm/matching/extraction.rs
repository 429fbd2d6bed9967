//! Data extraction for the matching algorithm
//!
//! Reads the treatment flags, per-unit distance scores, and the covariate
//! matrix out of the input record batch ahead of partitioning.

use arrow::record_batch::RecordBatch;

use crate::algorithm::matching::distance::CovariateMatrix;
use crate::config::{DistanceMetric, ModelSpec};
use crate::error::{MatchError, Result};
use crate::propensity::logit;
use crate::utils::arrow_utils;

/// Per-unit distances on the metric scale and on the logit scale
///
/// The logit-scale values back the caliper check; the metric-scale values
/// drive nearest-neighbor selection.
#[derive(Debug, Clone)]
pub struct ScoreSet {
    /// Distance on the configured metric's scale
    pub metric: Vec<f64>,
    /// Logit transform of the predicted probability
    pub logit: Vec<f64>,
}

/// Transform predicted probabilities onto the configured metric scale
///
/// Defined only for score-based metrics; covariate matching never computes
/// per-unit scores, and asking for them is a dispatch error.
pub fn score_set(metric: DistanceMetric, probabilities: &[f64]) -> Result<ScoreSet> {
    if !metric.is_score_based() {
        return Err(MatchError::InvalidConfiguration(format!(
            "per-unit scores are not defined for {metric:?} matching"
        )));
    }
    let logits: Vec<f64> = probabilities.iter().map(|&p| logit(p)).collect();
    let metric_scale = match metric {
        DistanceMetric::Probability => probabilities.to_vec(),
        _ => logits.clone(),
    };
    Ok(ScoreSet {
        metric: metric_scale,
        logit: logits,
    })
}

/// Read the treatment column into boolean flags
///
/// Validation has already established that the column exists, holds a
/// supported type, and contains only {0, 1}; this re-checks while reading so
/// the function is safe to call on its own.
pub fn extract_treatment(batch: &RecordBatch, spec: &ModelSpec) -> Result<Vec<bool>> {
    let idx = batch.schema().index_of(&spec.treatment)?;
    let col = batch.column(idx);

    let mut flags = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        match arrow_utils::value_as_f64(col.as_ref(), row) {
            Some(v) if v == 1.0 => flags.push(true),
            Some(v) if v == 0.0 => flags.push(false),
            Some(v) => {
                return Err(MatchError::NonBinaryTreatment(format!(
                    "treatment column '{}' contains {v} at row {row}",
                    spec.treatment
                )));
            }
            None => {
                return Err(MatchError::MissingData(format!(
                    "treatment column '{}' has a missing value at row {row}",
                    spec.treatment
                )));
            }
        }
    }
    Ok(flags)
}

/// Read the covariate columns into a row-major matrix
///
/// Used for Mahalanobis matching only. Null covariate values cannot enter a
/// distance computation and are reported as `MissingCovariates`.
pub fn extract_covariates(batch: &RecordBatch, spec: &ModelSpec) -> Result<CovariateMatrix> {
    let mut columns = Vec::with_capacity(spec.covariates.len());
    for name in &spec.covariates {
        let idx = batch.schema().index_of(name).map_err(|_| {
            MatchError::MissingCovariates(format!("covariate column '{name}' not found in dataset"))
        })?;
        columns.push((name, batch.column(idx)));
    }

    let ncols = columns.len();
    let mut data = Vec::with_capacity(batch.num_rows() * ncols);
    for row in 0..batch.num_rows() {
        for (name, col) in &columns {
            let value = arrow_utils::value_as_f64(col.as_ref(), row).ok_or_else(|| {
                MatchError::MissingCovariates(format!(
                    "covariate column '{name}' has a missing value at row {row}"
                ))
            })?;
            data.push(value);
        }
    }

    Ok(CovariateMatrix::new(data, ncols))
}
