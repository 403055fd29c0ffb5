//! The seven sequenced optimizer phases (`SPEC_FULL.md` §4.11): type
//! inference, layout selection, query rewrite, signature inference,
//! topology-aware rewrite, query merger, origin-id inference.
//!
//! Each phase is independently usable (and independently tested); this
//! module additionally offers `run_logical_phases`, which drives phases
//! 1, 2 (recorded only), 3, 4 and 5 over one freshly submitted query, up
//! to the point where it's ready to be handed to the query merger
//! (phase 6) alongside the rest of its batch.

pub mod layout_selection;
pub mod origin_inference;
pub mod query_merger;
pub mod rewrite;
pub mod topology_rewrite;
pub mod type_inference;

pub use layout_selection::select_layouts;
pub use origin_inference::assign_origin_ids;
pub use query_merger::{merge_batch, MergeCandidate};
pub use rewrite::rewrite as canonicalize;
pub use topology_rewrite::expand_sources;
pub use type_inference::infer_types;

use crate::common::{OperatorId, Schema};
use crate::error::Result;
use crate::plan::{semantic_signature, textual_signature, LogicalPlan, MemoryLayoutKind};
use std::collections::HashMap;

/// Output of running the per-query logical phases (1,2,3,4,5), ready to
/// be folded into the global query plan by phase 6.
pub struct LogicalOptimizationResult {
    pub root_schema: Schema,
    pub layouts: HashMap<OperatorId, MemoryLayoutKind>,
    pub textual_signature: String,
    pub semantic_signature: String,
}

/// Runs phases 1 through 5 over `plan` rooted at `root`, mutating it in
/// place (type annotations, canonicalized predicates, expanded sources)
/// and returning the artifacts phases 6 and 7 need.
pub fn run_logical_phases(
    plan: &mut LogicalPlan,
    root: OperatorId,
    source_schemas: &HashMap<String, Schema>,
    physical_sources: &HashMap<String, Vec<String>>,
) -> Result<LogicalOptimizationResult> {
    let root_schema = type_inference::infer_types(plan, root, source_schemas)?;
    let layouts = layout_selection::select_layouts(plan, root);
    rewrite::rewrite(plan, root);
    let textual = textual_signature(plan, root);
    let semantic = semantic_signature(plan, root);
    topology_rewrite::expand_sources(plan, physical_sources);

    Ok(LogicalOptimizationResult {
        root_schema,
        layouts,
        textual_signature: textual,
        semantic_signature: semantic,
    })
}
