//! Logical/physical plan representation, topology modeling, signature
//! computation, and the coordinator's global query plan
//! (`SPEC_FULL.md` §4.10-§4.14).

mod global_query_plan;
mod logical;
mod physical;
mod signature;
mod topology;

pub use global_query_plan::{ChangelogEntry, GlobalQueryPlan, MergeOutcome, SharedPlanState, SharedQueryPlan};
pub use logical::{LogicalNode, LogicalPlan, OperatorKind};
pub use physical::{MemoryLayoutKind, PhysicalNode, PhysicalPlan};
pub use signature::{semantic_signature, textual_signature};
pub use topology::Topology;
