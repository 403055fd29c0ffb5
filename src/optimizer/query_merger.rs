//! Phase 6 — query merger (`SPEC_FULL.md` §4.11.6): applies the global
//! query plan's textual-then-semantic sharing rule (§4.10) across a batch
//! of queries submitted together.

use crate::common::{OperatorId, QueryId};
use crate::plan::{GlobalQueryPlan, LogicalPlan, MergeOutcome, PhysicalPlan};

/// One query as submitted for merging: its logical plan and root, and the
/// physical plan already lowered from it plus that physical plan's sink
/// operator id.
pub struct MergeCandidate<'a> {
    pub logical: &'a LogicalPlan,
    pub logical_sink: OperatorId,
    pub physical: PhysicalPlan,
    pub physical_sink: OperatorId,
}

/// Submits every candidate to `gqp` in order, returning the shared query
/// id and merge outcome for each.
pub fn merge_batch(gqp: &GlobalQueryPlan, candidates: Vec<MergeCandidate>) -> Vec<(QueryId, MergeOutcome)> {
    candidates
        .into_iter()
        .map(|c| gqp.merge_or_create(c.logical, c.logical_sink, c.physical, c.physical_sink))
        .collect()
}
