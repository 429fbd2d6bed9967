//! Type definitions for the matching algorithm

use arrow::record_batch::RecordBatch;
use smallvec::SmallVec;
use std::time::Duration;

use crate::config::DistanceMetric;

/// One treated unit together with the controls matched to it
///
/// Cluster ids follow the treated unit's position in the ordered treated
/// pool, starting at 1. A cluster holds at most `ratio` controls; without
/// replacement a control id appears in at most one cluster across the whole
/// result.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Cluster identifier (1-based position in the ordered treated pool)
    pub id: i64,
    /// Identifier of the treated unit
    pub treated_id: i64,
    /// Row of the treated unit in the input batch
    pub(crate) treated_row: usize,
    /// Identifiers of the matched controls, in matching order
    pub control_ids: SmallVec<[i64; 4]>,
    /// Rows of the matched controls in the input batch
    pub(crate) control_rows: SmallVec<[usize; 4]>,
}

impl Cluster {
    /// A cluster with no controls corresponds to an unmatched treated unit
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.control_ids.is_empty()
    }

    /// Number of members including the treated unit
    #[must_use]
    pub fn members(&self) -> usize {
        self.control_ids.len() + 1
    }
}

/// Result of the matching process
#[derive(Debug, Clone)]
pub struct MatchOutput {
    /// All original columns plus `id` and `cluster` (and `total_weight`
    /// when replacement is enabled), one row per matched unit
    pub dataset: RecordBatch,
    /// Identifiers of treated units with no match under the caliper
    pub unmatched_ids: Vec<i64>,
    /// Distance metric the result was produced under
    pub distance: DistanceMetric,
    /// Configured matching ratio
    pub ratio: usize,
    /// Whether controls could be reused across clusters
    pub replacement: bool,
    /// Number of treated units in the matched dataset
    pub matched_treated: usize,
    /// Number of control rows in the matched dataset
    pub matched_controls: usize,
    /// Time taken for matching
    pub matching_time: Duration,
}
