//! Post-match assembly
//!
//! Merges cluster assignments back onto the original covariate rows and
//! produces the final dataset: every original column plus `id` and
//! `cluster`, and a normalized `total_weight` column when replacement is
//! enabled. Globally unmatched treated units are excluded from the dataset
//! but retained in the unmatched-id list.

use arrow::array::{ArrayRef, Float64Array, Int64Array, UInt32Array};
use arrow::compute;
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::algorithm::matching::types::Cluster;
use crate::config::MatchConfig;
use crate::error::Result;

/// One output row before column materialization
struct OutputRow {
    batch_row: usize,
    id: i64,
    cluster: i64,
    weight: f64,
}

/// Assemble the matched dataset from the cluster assignments
///
/// Clusters without controls (unmatched treated units) never contribute
/// rows. Without replacement and with `discard_incomplete`, clusters whose
/// member count is not exactly `ratio + 1` are removed entirely. Clusters
/// are emitted in ascending cluster-id order.
pub fn assemble(
    batch: &RecordBatch,
    clusters: &[Cluster],
    config: &MatchConfig,
) -> Result<RecordBatch> {
    let mut kept: Vec<&Cluster> = clusters.iter().filter(|c| !c.is_empty()).collect();
    if !config.replacement && config.discard_incomplete {
        kept.retain(|c| c.members() == config.ratio + 1);
    }
    kept.sort_by_key(|c| c.id);

    let rows = if config.replacement {
        rows_with_replacement(&kept)
    } else {
        rows_without_replacement(&kept)
    };

    materialize(batch, &rows, config.replacement)
}

/// Emit treated and control rows cluster by cluster; no control row can
/// repeat because each control belongs to at most one cluster
fn rows_without_replacement(clusters: &[&Cluster]) -> Vec<OutputRow> {
    let mut rows = Vec::new();
    for cluster in clusters {
        rows.push(OutputRow {
            batch_row: cluster.treated_row,
            id: cluster.treated_id,
            cluster: cluster.id,
            weight: 1.0,
        });
        for (&id, &row) in cluster.control_ids.iter().zip(&cluster.control_rows) {
            rows.push(OutputRow {
                batch_row: row,
                id,
                cluster: cluster.id,
                weight: 1.0,
            });
        }
    }
    rows
}

/// Emit one row per identifier with aggregated, normalized weights
///
/// Each control appearance contributes `1 / (members - 1)` of its cluster;
/// a control reused across clusters sums its contributions and keeps the
/// smallest cluster id it appears in. Every total weight is then divided by
/// the mean total weight among treated units, so the treated average is 1.
fn rows_with_replacement(clusters: &[&Cluster]) -> Vec<OutputRow> {
    // id -> (batch row, first cluster id, accumulated weight)
    let mut control_totals: FxHashMap<i64, (usize, i64, f64)> = FxHashMap::default();
    for cluster in clusters {
        let contribution = 1.0 / (cluster.members() - 1) as f64;
        for (&id, &row) in cluster.control_ids.iter().zip(&cluster.control_rows) {
            control_totals
                .entry(id)
                .and_modify(|(_, _, w)| *w += contribution)
                .or_insert((row, cluster.id, contribution));
        }
    }

    let treated_total: f64 = clusters.len() as f64;
    let mean_treated = treated_total / clusters.len().max(1) as f64;

    let mut rows = Vec::new();
    let mut emitted: FxHashSet<i64> = FxHashSet::default();
    for cluster in clusters {
        rows.push(OutputRow {
            batch_row: cluster.treated_row,
            id: cluster.treated_id,
            cluster: cluster.id,
            weight: 1.0 / mean_treated,
        });
        for &id in &cluster.control_ids {
            if emitted.insert(id) {
                let (row, first_cluster, total) = control_totals[&id];
                rows.push(OutputRow {
                    batch_row: row,
                    id,
                    cluster: first_cluster,
                    weight: total / mean_treated,
                });
            }
        }
    }
    rows
}

/// Gather the selected batch rows and append the result columns
fn materialize(batch: &RecordBatch, rows: &[OutputRow], replacement: bool) -> Result<RecordBatch> {
    let indices =
        UInt32Array::from(rows.iter().map(|r| r.batch_row as u32).collect::<Vec<_>>());

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns() + 3);
    for column in batch.columns() {
        columns.push(compute::take(column.as_ref(), &indices, None)?);
    }

    let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new("id", DataType::Int64, false)));
    fields.push(Arc::new(Field::new("cluster", DataType::Int64, false)));
    columns.push(Arc::new(Int64Array::from(
        rows.iter().map(|r| r.id).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(Int64Array::from(
        rows.iter().map(|r| r.cluster).collect::<Vec<_>>(),
    )));

    if replacement {
        fields.push(Arc::new(Field::new("total_weight", DataType::Float64, false)));
        columns.push(Arc::new(Float64Array::from(
            rows.iter().map(|r| r.weight).collect::<Vec<_>>(),
        )));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
