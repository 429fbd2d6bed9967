//! Greedy nearest-neighbor matching engine
//!
//! The core algorithm. Matching without replacement runs one round per unit
//! of ratio: each round walks the ordered treated pool and commits the
//! nearest still-available control immediately, without backtracking. The
//! set of still-eligible controls is threaded through the rounds as an
//! explicit available set rather than mutated in place on a shared pool.
//!
//! Round-by-round selection (rather than taking the k nearest at once) is
//! what makes the treated-unit ordering observably change the outcome under
//! no-replacement; this order sensitivity is a documented property of
//! greedy matching.

use log::{debug, warn};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::cmp::Ordering;

use itertools::Itertools;

use crate::algorithm::matching::distance::DistanceKernel;
use crate::algorithm::matching::pool::UnitPools;
use crate::algorithm::matching::types::Cluster;
use crate::utils::progress;

/// Empty clusters seeded from the ordered treated pool, one per treated unit
fn seed_clusters(pools: &UnitPools) -> Vec<Cluster> {
    (0..pools.treated.len())
        .map(|pos| Cluster {
            id: pos as i64 + 1,
            treated_id: pools.treated.ids[pos],
            treated_row: pools.treated.rows[pos],
            control_ids: SmallVec::new(),
            control_rows: SmallVec::new(),
        })
        .collect()
}

/// Nearest eligible candidate, ties broken by smaller control id
fn nearest<'a>(
    kernel: &DistanceKernel<'_>,
    pools: &UnitPools,
    t_pos: usize,
    threshold: Option<f64>,
    candidates: impl Iterator<Item = &'a usize>,
) -> Option<usize> {
    let mut best: Option<(f64, i64, usize)> = None;
    for &c_pos in candidates {
        if !kernel.within_caliper(t_pos, c_pos, threshold) {
            continue;
        }
        let dist = kernel.pair_distance(t_pos, c_pos);
        let id = pools.controls.ids[c_pos];
        let better = match &best {
            None => true,
            Some((best_dist, best_id, _)) => {
                match dist.partial_cmp(best_dist).unwrap_or(Ordering::Greater) {
                    Ordering::Less => true,
                    Ordering::Equal => id < *best_id,
                    Ordering::Greater => false,
                }
            }
        };
        if better {
            best = Some((dist, id, c_pos));
        }
    }
    best.map(|(_, _, c_pos)| c_pos)
}

/// Match without replacement, one round per unit of ratio
///
/// Every selected control is removed from the available set and never
/// selected again, in this or a later round. Returns one cluster per
/// treated unit; clusters left without controls correspond to globally
/// unmatched treated units.
pub fn match_without_replacement(
    pools: &UnitPools,
    kernel: &DistanceKernel<'_>,
    threshold: Option<f64>,
    ratio: usize,
) -> Vec<Cluster> {
    let mut clusters = seed_clusters(pools);
    let mut available: FxHashSet<usize> = (0..pools.controls.len()).collect();

    let pb = progress::create_main_progress_bar(
        (pools.treated.len() * ratio) as u64,
        Some("Greedy nearest-neighbor matching"),
    );

    'rounds: for round in 1..=ratio {
        let mut misses = 0usize;
        for t_pos in 0..pools.treated.len() {
            pb.inc(1);
            match nearest(kernel, pools, t_pos, threshold, available.iter()) {
                Some(c_pos) => {
                    clusters[t_pos].control_ids.push(pools.controls.ids[c_pos]);
                    clusters[t_pos].control_rows.push(pools.controls.rows[c_pos]);
                    available.remove(&c_pos);
                }
                None => {
                    if kernel.is_score_based() {
                        // Caliper eliminated every candidate for this unit
                        // in this round; the unit stays in play for the
                        // result reconciliation
                        misses += 1;
                    } else {
                        // Mahalanobis has no caliper, so an empty candidate
                        // set means the control pool ran out
                        warn!(
                            "control pool exhausted in round {round}; stopping the round early"
                        );
                        break 'rounds;
                    }
                }
            }
        }
        if misses > 0 {
            warn!("round {round}: {misses} treated unit(s) had no eligible control inside the caliper");
        } else {
            debug!("round {round}: every treated unit found a control");
        }
    }

    progress::finish_progress_bar(&pb, Some("Matching complete"));
    clusters
}

/// Select up to `ratio` nearest eligible controls for one treated unit
///
/// Used by replacement-mode matching, where the control pool is never
/// mutated and each treated unit draws from the full pool.
pub(crate) fn select_with_replacement(
    pools: &UnitPools,
    kernel: &DistanceKernel<'_>,
    threshold: Option<f64>,
    ratio: usize,
    t_pos: usize,
) -> SmallVec<[usize; 4]> {
    (0..pools.controls.len())
        .filter(|&c_pos| kernel.within_caliper(t_pos, c_pos, threshold))
        .map(|c_pos| (kernel.pair_distance(t_pos, c_pos), pools.controls.ids[c_pos], c_pos))
        .sorted_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        })
        .take(ratio)
        .map(|(_, _, c_pos)| c_pos)
        .collect()
}

/// Match with replacement, sequentially
///
/// One pass over the treated pool taking `min(ratio, eligible)` nearest
/// candidates at once; the control pool is shared read-only state.
pub fn match_with_replacement(
    pools: &UnitPools,
    kernel: &DistanceKernel<'_>,
    threshold: Option<f64>,
    ratio: usize,
) -> Vec<Cluster> {
    let mut clusters = seed_clusters(pools);

    let pb = progress::create_main_progress_bar(
        pools.treated.len() as u64,
        Some("Matching with replacement"),
    );

    for (t_pos, cluster) in clusters.iter_mut().enumerate() {
        for c_pos in select_with_replacement(pools, kernel, threshold, ratio, t_pos) {
            cluster.control_ids.push(pools.controls.ids[c_pos]);
            cluster.control_rows.push(pools.controls.rows[c_pos]);
        }
        pb.inc(1);
    }

    progress::finish_progress_bar(&pb, Some("Matching complete"));
    clusters
}

/// Identifiers of treated units left without any control across all rounds
pub fn unmatched_ids(clusters: &[Cluster]) -> Vec<i64> {
    let mut ids: Vec<i64> = clusters
        .iter()
        .filter(|c| c.is_empty())
        .map(|c| c.treated_id)
        .collect();
    ids.sort_unstable();
    ids
}
