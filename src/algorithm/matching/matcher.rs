//! Core matching orchestration
//!
//! This module implements the `Matcher` struct which runs validation,
//! partitioning, caliper calculation, the matching engine, and post-match
//! assembly in order. Each invocation snapshots its inputs, so concurrent
//! invocations with different configurations on the same source dataset are
//! safe.

use arrow::record_batch::RecordBatch;
use log::{info, warn};
use std::time::Instant;

use crate::algorithm::matching::assembler::assemble;
use crate::algorithm::matching::caliper::caliper_threshold;
use crate::algorithm::matching::distance::{DistanceKernel, control_covariance_inverse};
use crate::algorithm::matching::engine::{
    match_with_replacement, match_without_replacement, unmatched_ids,
};
use crate::algorithm::matching::extraction::{extract_covariates, extract_treatment, score_set};
use crate::algorithm::matching::parallel::match_with_replacement_parallel;
use crate::algorithm::matching::pool::UnitPools;
use crate::algorithm::matching::types::{Cluster, MatchOutput};
use crate::algorithm::matching::validation::validate_inputs;
use crate::config::{DistanceMetric, MatchConfig, ModelSpec};
use crate::error::{MatchError, Result};
use crate::propensity::{PropensityFit, validate_scores};

/// Matcher for pairing treated units with controls
#[derive(Debug)]
pub struct Matcher {
    /// Matching configuration
    config: MatchConfig,
}

impl Matcher {
    /// Treated-pool size at which replacement-mode matching switches to
    /// parallel processing
    const PARALLEL_THRESHOLD: usize = 1000;

    /// Create a new matcher with the given configuration
    #[must_use]
    pub const fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Perform matching between treated and control units
    ///
    /// # Arguments
    ///
    /// * `data` - the full dataset, one unit per row
    /// * `spec` - model specification naming the treatment column and
    ///   covariates
    /// * `scores` - per-unit predicted treatment probabilities from the
    ///   external regression collaborator; required for probability/logit
    ///   matching, ignored for Mahalanobis
    pub fn perform_matching(
        &self,
        data: &RecordBatch,
        spec: &ModelSpec,
        scores: Option<&[f64]>,
    ) -> Result<MatchOutput> {
        let start_time = Instant::now();

        validate_inputs(data, spec, &self.config)?;
        let treatment = extract_treatment(data, spec)?;

        let (mut pools, scoreset) = match self.config.distance {
            DistanceMetric::Probability | DistanceMetric::Logit => {
                let probabilities = scores.ok_or_else(|| {
                    MatchError::InvalidConfiguration(
                        "predicted probabilities are required for probability/logit matching"
                            .to_string(),
                    )
                })?;
                validate_scores(probabilities, data.num_rows())?;
                let set = score_set(self.config.distance, probabilities)?;
                let pools = UnitPools::partition(&treatment, Some(&set))?;
                (pools, Some(set))
            }
            DistanceMetric::Mahalanobis => {
                let pools = UnitPools::partition(&treatment, None)?;
                (pools, None)
            }
        };

        info!(
            "Matching {} treated units against a control pool of {} candidates",
            pools.treated.len(),
            pools.controls.len()
        );

        pools.order_treated(
            self.config.order,
            self.config.seed,
            self.config.distance.is_score_based(),
        );

        // The caliper SD is taken over the whole dataset's logit
        // distribution, before any pool shrinks
        let threshold = caliper_threshold(
            &self.config,
            scoreset.as_ref().map_or(&[], |set| set.logit.as_slice()),
        );

        let covariates;
        let kernel = match self.config.distance {
            DistanceMetric::Probability | DistanceMetric::Logit => {
                DistanceKernel::Score { pools: &pools }
            }
            DistanceMetric::Mahalanobis => {
                covariates = extract_covariates(data, spec)?;
                let inverse = control_covariance_inverse(&covariates, &pools.controls.rows)?;
                DistanceKernel::Mahalanobis {
                    pools: &pools,
                    covariates: &covariates,
                    inverse,
                }
            }
        };

        let clusters = self.run_engine(&pools, &kernel, threshold);
        let unmatched = unmatched_ids(&clusters);
        if !unmatched.is_empty() {
            warn!(
                "{} treated unit(s) left unmatched under the caliper",
                unmatched.len()
            );
        }

        let dataset = assemble(data, &clusters, &self.config)?;
        let matched_treated = clusters
            .iter()
            .filter(|c| !c.is_empty())
            .filter(|c| {
                self.config.replacement
                    || !self.config.discard_incomplete
                    || c.members() == self.config.ratio + 1
            })
            .count();
        let matched_controls = dataset.num_rows() - matched_treated;
        let elapsed = start_time.elapsed();

        info!(
            "Matching complete: {matched_treated} treated matched with {matched_controls} \
             control rows in {elapsed:.2?}"
        );

        Ok(MatchOutput {
            dataset,
            unmatched_ids: unmatched,
            distance: self.config.distance,
            ratio: self.config.ratio,
            replacement: self.config.replacement,
            matched_treated,
            matched_controls,
            matching_time: elapsed,
        })
    }

    /// Perform matching, obtaining scores from the regression collaborator
    pub fn perform_matching_with_model(
        &self,
        data: &RecordBatch,
        spec: &ModelSpec,
        model: &dyn PropensityFit,
    ) -> Result<MatchOutput> {
        if self.config.distance.is_score_based() {
            let scores = model.fit_predict(data, spec)?;
            self.perform_matching(data, spec, Some(&scores))
        } else {
            self.perform_matching(data, spec, None)
        }
    }

    fn run_engine(
        &self,
        pools: &UnitPools,
        kernel: &DistanceKernel<'_>,
        threshold: Option<f64>,
    ) -> Vec<Cluster> {
        if self.config.replacement {
            let use_parallel =
                self.config.use_parallel && pools.treated.len() >= Self::PARALLEL_THRESHOLD;
            if use_parallel {
                match_with_replacement_parallel(pools, kernel, threshold, self.config.ratio)
            } else {
                match_with_replacement(pools, kernel, threshold, self.config.ratio)
            }
        } else {
            match_without_replacement(pools, kernel, threshold, self.config.ratio)
        }
    }
}
