//! Scenario tests for the matching workflow

use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use psmatch::{
    DistanceMetric, MatchConfig, MatchError, Matcher, ModelSpec, PropensityFit, RecordBatch,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a dataset with a treatment column and one numeric covariate
fn make_batch(treatment: &[i64], x: &[f64]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("treat", DataType::Int64, false),
        Field::new("x", DataType::Float64, false),
    ]));
    let treat: ArrayRef = Arc::new(Int64Array::from(treatment.to_vec()));
    let x: ArrayRef = Arc::new(Float64Array::from(x.to_vec()));
    RecordBatch::try_new(schema, vec![treat, x]).unwrap()
}

fn make_covariate_batch(treatment: &[i64], x: &[f64], y: &[f64]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("treat", DataType::Int64, false),
        Field::new("x", DataType::Float64, false),
        Field::new("y", DataType::Float64, false),
    ]));
    let treat: ArrayRef = Arc::new(Int64Array::from(treatment.to_vec()));
    let x: ArrayRef = Arc::new(Float64Array::from(x.to_vec()));
    let y: ArrayRef = Arc::new(Float64Array::from(y.to_vec()));
    RecordBatch::try_new(schema, vec![treat, x, y]).unwrap()
}

fn spec() -> ModelSpec {
    ModelSpec::new("treat", vec!["x".to_string()])
}

fn column_i64(batch: &RecordBatch, name: &str) -> Vec<i64> {
    let idx = batch.schema().index_of(name).unwrap();
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap()
        .values()
        .to_vec()
}

fn column_f64(batch: &RecordBatch, name: &str) -> Vec<f64> {
    let idx = batch.schema().index_of(name).unwrap();
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap()
        .values()
        .to_vec()
}

#[test]
fn test_largest_order_pairs_by_descending_score() -> Result<()> {
    init_logging();
    // Treated at 0.9, 0.5, 0.1 interleaved with controls at 0.8, 0.4, 0.2
    let batch = make_batch(&[1, 0, 1, 0, 1, 0], &[0.0; 6]);
    let scores = [0.9, 0.8, 0.5, 0.4, 0.1, 0.2];

    let matcher = Matcher::new(MatchConfig::builder().ratio(1).build());
    let out = matcher.perform_matching(&batch, &spec(), Some(&scores))?;

    assert!(out.unmatched_ids.is_empty());
    assert_eq!(column_i64(&out.dataset, "id"), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(column_i64(&out.dataset, "cluster"), vec![1, 1, 2, 2, 3, 3]);
    assert_eq!(out.matched_treated, 3);
    assert_eq!(out.matched_controls, 3);
    Ok(())
}

#[test]
fn test_tight_caliper_leaves_isolated_treated_unmatched() -> Result<()> {
    init_logging();
    let batch = make_batch(&[1, 0, 1, 0, 1, 0], &[0.0; 6]);
    let scores = [0.9, 0.8, 0.5, 0.4, 0.1, 0.2];

    // A caliper of 0.03 SD units is roughly 0.05 on the logit scale for
    // this score distribution; no control is that close to the treated
    // unit at 0.1
    let matcher = Matcher::new(MatchConfig::builder().ratio(1).caliper(0.03).build());
    let out = matcher.perform_matching(&batch, &spec(), Some(&scores))?;

    assert!(out.unmatched_ids.contains(&5));
    Ok(())
}

#[test]
fn test_replacement_aggregates_control_weights() -> Result<()> {
    init_logging();
    // Two treated units and a single control: both clusters reuse it
    let batch = make_batch(&[1, 1, 0], &[0.0; 3]);
    let scores = [0.6, 0.5, 0.55];

    let matcher = Matcher::new(
        MatchConfig::builder()
            .ratio(2)
            .replacement(true)
            .build(),
    );
    let out = matcher.perform_matching(&batch, &spec(), Some(&scores))?;

    // One row per identifier: two treated plus the deduplicated control
    assert_eq!(out.dataset.num_rows(), 3);
    assert_eq!(column_i64(&out.dataset, "id"), vec![1, 3, 2]);
    assert_eq!(column_i64(&out.dataset, "cluster"), vec![1, 1, 2]);

    // Each cluster has one control, so each contributes weight 1; the
    // control's total is the sum, normalized by the mean treated weight
    let weights = column_f64(&out.dataset, "total_weight");
    assert!((weights[0] - 1.0).abs() < 1e-12);
    assert!((weights[1] - 2.0).abs() < 1e-12);
    assert!((weights[2] - 1.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_mahalanobis_matches_in_covariate_space() -> Result<()> {
    init_logging();
    // Two treated points inside a square of four controls
    let batch = make_covariate_batch(
        &[1, 1, 0, 0, 0, 0],
        &[0.5, 3.5, 0.0, 0.0, 4.0, 4.0],
        &[0.5, 3.9, 0.0, 4.0, 0.0, 4.0],
    );
    let spec = ModelSpec::new("treat", vec!["x".to_string(), "y".to_string()]);

    let matcher = Matcher::new(
        MatchConfig::builder()
            .distance(DistanceMetric::Mahalanobis)
            .ratio(1)
            .build(),
    );
    let out = matcher.perform_matching(&batch, &spec, None)?;

    assert!(out.unmatched_ids.is_empty());
    // Control covariates are uncorrelated here, so the nearest corner wins
    assert_eq!(column_i64(&out.dataset, "id"), vec![1, 3, 2, 6]);
    assert_eq!(column_i64(&out.dataset, "cluster"), vec![1, 1, 2, 2]);
    Ok(())
}

#[test]
fn test_mahalanobis_exhausted_pool_stops_round_early() -> Result<()> {
    init_logging();
    // Three treated units, two controls: the last treated unit in the
    // round finds the pool empty
    let batch = make_covariate_batch(
        &[1, 1, 1, 0, 0],
        &[0.0, 1.0, 2.0, 0.1, 1.1],
        &[0.0, 1.0, 2.0, 0.1, 1.1],
    );
    let spec = ModelSpec::new("treat", vec!["x".to_string(), "y".to_string()]);

    let matcher = Matcher::new(
        MatchConfig::builder()
            .distance(DistanceMetric::Mahalanobis)
            .ratio(1)
            .build(),
    );
    let out = matcher.perform_matching(&batch, &spec, None)?;

    assert_eq!(out.unmatched_ids.len(), 1);
    assert_eq!(out.matched_treated, 2);
    Ok(())
}

#[test]
fn test_scores_are_required_for_score_based_matching() {
    init_logging();
    let batch = make_batch(&[1, 0], &[0.0; 2]);
    let matcher = Matcher::new(MatchConfig::default());
    assert!(matches!(
        matcher.perform_matching(&batch, &spec(), None),
        Err(MatchError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_empty_pool_is_an_error() {
    init_logging();
    let batch = make_batch(&[1, 1], &[0.0; 2]);
    let matcher = Matcher::new(MatchConfig::default());
    assert!(matches!(
        matcher.perform_matching(&batch, &spec(), Some(&[0.5, 0.6])),
        Err(MatchError::EmptyPool(_))
    ));
}

struct FixedScores(Vec<f64>);

impl PropensityFit for FixedScores {
    fn fit_predict(&self, _data: &RecordBatch, _spec: &ModelSpec) -> psmatch::Result<Vec<f64>> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_matching_through_the_fit_collaborator() -> Result<()> {
    init_logging();
    let batch = make_batch(&[1, 0, 1, 0], &[0.0; 4]);
    let model = FixedScores(vec![0.8, 0.7, 0.3, 0.2]);

    let matcher = Matcher::new(MatchConfig::builder().ratio(1).build());
    let out = matcher.perform_matching_with_model(&batch, &spec(), &model)?;

    assert!(out.unmatched_ids.is_empty());
    assert_eq!(column_i64(&out.dataset, "cluster"), vec![1, 1, 2, 2]);
    Ok(())
}
