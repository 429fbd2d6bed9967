//! Validation functions for the matching algorithm
//!
//! Input validation runs before any matching work and fails fast with a
//! descriptive error. Validation is pure: it never mutates the batch or the
//! configuration.

use arrow::record_batch::RecordBatch;

use crate::config::{DistanceMetric, MatchConfig, ModelSpec};
use crate::error::{MatchError, Result};
use crate::utils::arrow_utils;

/// Validate the configuration and the input batch before matching
///
/// Checks, in order: the numeric configuration fields, the treatment column
/// (present, supported type, no nulls, values in {0, 1}), and — for
/// Mahalanobis matching — that every covariate named in the model
/// specification exists and is numeric.
pub fn validate_inputs(batch: &RecordBatch, spec: &ModelSpec, config: &MatchConfig) -> Result<()> {
    config.validate()?;

    let treatment_idx = batch.schema().index_of(&spec.treatment).map_err(|_| {
        MatchError::InvalidConfiguration(format!(
            "treatment column '{}' not found in dataset",
            spec.treatment
        ))
    })?;

    let treatment_col = batch.column(treatment_idx);
    if !arrow_utils::is_supported_numeric(treatment_col.data_type()) {
        return Err(MatchError::NonBinaryTreatment(format!(
            "treatment column '{}' has unsupported type {}",
            spec.treatment,
            treatment_col.data_type()
        )));
    }

    for row in 0..batch.num_rows() {
        match arrow_utils::value_as_f64(treatment_col.as_ref(), row) {
            None => {
                return Err(MatchError::MissingData(format!(
                    "treatment column '{}' has a missing value at row {row}",
                    spec.treatment
                )));
            }
            Some(v) if v != 0.0 && v != 1.0 => {
                return Err(MatchError::NonBinaryTreatment(format!(
                    "treatment column '{}' contains {v} at row {row}; only 0/1 or boolean \
                     values are allowed",
                    spec.treatment
                )));
            }
            Some(_) => {}
        }
    }

    if config.distance == DistanceMetric::Mahalanobis {
        let schema = batch.schema();
        for name in &spec.covariates {
            let field = schema.field_with_name(name).map_err(|_| {
                MatchError::MissingCovariates(format!(
                    "covariate column '{name}' not found in dataset"
                ))
            })?;
            if !field.data_type().is_numeric() {
                return Err(MatchError::MissingCovariates(format!(
                    "covariate column '{name}' has non-numeric type {}",
                    field.data_type()
                )));
            }
        }
        if spec.covariates.is_empty() {
            return Err(MatchError::MissingCovariates(
                "Mahalanobis matching requires at least one covariate".to_string(),
            ));
        }
    }

    Ok(())
}
