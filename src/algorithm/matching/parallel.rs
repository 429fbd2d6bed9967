//! Parallel matching implementation
//!
//! Replacement-mode matching has no shared mutable state: each treated unit
//! draws its nearest controls from the immutable control pool. That makes
//! the per-unit selection embarrassingly parallel, and the output is
//! identical to the sequential path. Matching without replacement stays
//! strictly sequential; parallelizing it would race on the available set
//! and break the each-control-used-at-most-once invariant.

use log::info;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::algorithm::matching::distance::DistanceKernel;
use crate::algorithm::matching::engine::select_with_replacement;
use crate::algorithm::matching::pool::UnitPools;
use crate::algorithm::matching::types::Cluster;
use crate::utils::progress;

/// Match with replacement across the rayon thread pool
pub fn match_with_replacement_parallel(
    pools: &UnitPools,
    kernel: &DistanceKernel<'_>,
    threshold: Option<f64>,
    ratio: usize,
) -> Vec<Cluster> {
    info!(
        "Using parallel processing with {} threads for {} treated units",
        rayon::current_num_threads(),
        pools.treated.len()
    );

    let pb = progress::create_main_progress_bar(
        pools.treated.len() as u64,
        Some("Matching with replacement"),
    );

    let selections: Vec<SmallVec<[usize; 4]>> = (0..pools.treated.len())
        .into_par_iter()
        .map(|t_pos| {
            let selected = select_with_replacement(pools, kernel, threshold, ratio, t_pos);
            pb.inc(1);
            selected
        })
        .collect();

    progress::finish_progress_bar(&pb, Some("Matching complete"));

    selections
        .into_iter()
        .enumerate()
        .map(|(pos, selected)| {
            let mut cluster = Cluster {
                id: pos as i64 + 1,
                treated_id: pools.treated.ids[pos],
                treated_row: pools.treated.rows[pos],
                control_ids: SmallVec::new(),
                control_rows: SmallVec::new(),
            };
            for c_pos in selected {
                cluster.control_ids.push(pools.controls.ids[c_pos]);
                cluster.control_rows.push(pools.controls.rows[c_pos]);
            }
            cluster
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::matching::engine::match_with_replacement;
    use crate::algorithm::matching::extraction::score_set;
    use crate::config::DistanceMetric;

    #[test]
    fn test_parallel_output_equals_sequential() {
        let n = 64;
        let treatment: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();
        let probabilities: Vec<f64> = (0..n).map(|i| 0.05 + 0.9 * (i as f64) / n as f64).collect();
        let set = score_set(DistanceMetric::Probability, &probabilities).unwrap();
        let pools = UnitPools::partition(&treatment, Some(&set)).unwrap();
        let kernel = DistanceKernel::Score { pools: &pools };

        let sequential = match_with_replacement(&pools, &kernel, None, 2);
        let parallel = match_with_replacement_parallel(&pools, &kernel, None, 2);

        assert_eq!(sequential.len(), parallel.len());
        for (s, p) in sequential.iter().zip(&parallel) {
            assert_eq!(s.treated_id, p.treated_id);
            assert_eq!(s.control_ids, p.control_ids);
        }
    }
}
