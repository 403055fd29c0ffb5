//! Global query plan: the coordinator's shared-subplan catalog
//! (`SPEC_FULL.md` §4.10). Incoming queries are matched against already
//! running ones by textual signature first, then by semantic signature,
//! so that two textually different but semantically equivalent queries
//! (e.g. differing only by AND-conjunct order) still share execution.

use super::logical::LogicalPlan;
use super::physical::{PhysicalNode, PhysicalPlan};
use super::signature::{semantic_signature, textual_signature};
use crate::common::{OperatorId, QueryId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharedPlanState {
    Created,
    Deployed,
    Updated,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub from: SharedPlanState,
    pub to: SharedPlanState,
    pub at: SystemTime,
    pub reason: String,
}

/// One entry in the global query plan: a physical plan shared by one or
/// more originally submitted queries, plus the state-machine history that
/// drives deployment (`SPEC_FULL.md` §4.14).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedQueryPlan {
    pub id: QueryId,
    pub physical_plan: PhysicalPlan,
    /// Sink operators, in the order queries were merged into this plan —
    /// preserved rather than re-sorted so that `unregisterQuery` can
    /// remove exactly the one it added without disturbing its siblings.
    pub sink_roots: Vec<OperatorId>,
    pub state: SharedPlanState,
    pub changelog: Vec<ChangelogEntry>,
}

impl SharedQueryPlan {
    fn new(id: QueryId, physical_plan: PhysicalPlan, sink_root: OperatorId) -> Self {
        Self {
            id,
            physical_plan,
            sink_roots: vec![sink_root],
            state: SharedPlanState::Created,
            changelog: Vec::new(),
        }
    }

    pub fn transition(&mut self, to: SharedPlanState, reason: impl Into<String>) {
        self.changelog.push(ChangelogEntry {
            from: self.state,
            to,
            at: SystemTime::now(),
            reason: reason.into(),
        });
        self.state = to;
    }
}

/// Outcome of submitting a query to the global query plan: either it was
/// folded into an existing shared plan (`Shared`), or it started a new
/// one (`Created`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Shared,
    Created,
}

/// Coordinator-resident catalog of shared query plans, indexed by both
/// signature flavors for O(1) average lookup on submission.
#[derive(Default)]
pub struct GlobalQueryPlan {
    shared_plans: DashMap<QueryId, SharedQueryPlan>,
    textual_index: DashMap<String, QueryId>,
    semantic_index: DashMap<String, QueryId>,
    next_id: AtomicU64,
}

impl GlobalQueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submits `logical` (whose root is `sink`), folding it into an
    /// existing shared plan when its signature matches one already
    /// running. Returns the shared plan's id and whether it was newly
    /// created. Textual match is tried first (exact, cheaper to reason
    /// about); semantic match is the fallback so that queries equivalent
    /// only up to commutative reordering still share (Scenario 6).
    pub fn merge_or_create(
        &self,
        logical: &LogicalPlan,
        sink: OperatorId,
        physical_plan: PhysicalPlan,
        physical_sink: OperatorId,
    ) -> (QueryId, MergeOutcome) {
        let textual = textual_signature(logical, sink);
        if let Some(existing) = self.textual_index.get(&textual) {
            let id = *existing;
            drop(existing);
            self.attach(id, &physical_plan, physical_sink);
            return (id, MergeOutcome::Shared);
        }

        let semantic = semantic_signature(logical, sink);
        if let Some(existing) = self.semantic_index.get(&semantic) {
            let id = *existing;
            drop(existing);
            self.textual_index.insert(textual, id);
            self.attach(id, &physical_plan, physical_sink);
            return (id, MergeOutcome::Shared);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let plan = SharedQueryPlan::new(id, physical_plan, physical_sink);
        self.shared_plans.insert(id, plan);
        self.textual_index.insert(textual, id);
        self.semantic_index.insert(semantic, id);
        (id, MergeOutcome::Created)
    }

    /// Splices the newly matched query's sink into the shared plan: since a
    /// textual or semantic signature match means `candidate` is
    /// structurally identical (up to commutative reorder) to a query
    /// already sharing this plan, the new sink is re-parented onto whatever
    /// children an existing sink already reads from — not onto a fresh
    /// copy of the upstream subtree — so only the sink operator itself is
    /// duplicated (`SPEC_FULL.md` §4.10, "the target's sinks' children are
    /// re-parented to the shared plan's equivalent children").
    fn attach(&self, id: QueryId, candidate: &PhysicalPlan, physical_sink: OperatorId) {
        if let Some(mut plan) = self.shared_plans.get_mut(&id) {
            if !plan.sink_roots.contains(&physical_sink) {
                let equivalent_children = plan
                    .sink_roots
                    .first()
                    .and_then(|&existing_sink| plan.physical_plan.node(existing_sink))
                    .map(|node| node.children.clone());

                if let (Some(children), Some(sink_node)) = (equivalent_children, candidate.node(physical_sink)) {
                    plan.physical_plan.insert(PhysicalNode { children, ..sink_node.clone() });
                    plan.sink_roots.push(physical_sink);
                }
            }
            plan.transition(SharedPlanState::Updated, "query merged into existing shared plan");
        }
    }

    /// Removes one sink from a shared plan; the plan itself is only
    /// dropped (and its index entries reclaimed) once its last sink is
    /// gone.
    pub fn unregister(&self, id: QueryId, sink: OperatorId) -> bool {
        let Some(mut plan) = self.shared_plans.get_mut(&id) else {
            return false;
        };
        plan.sink_roots.retain(|&s| s != sink);
        let emptied = plan.sink_roots.is_empty();
        if emptied {
            plan.transition(SharedPlanState::Stopped, "last sharing query unregistered");
        }
        drop(plan);
        if emptied {
            self.shared_plans.remove(&id);
            self.textual_index.retain(|_, v| *v != id);
            self.semantic_index.retain(|_, v| *v != id);
        }
        true
    }

    pub fn get(&self, id: QueryId) -> Option<SharedQueryPlan> {
        self.shared_plans.get(&id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.shared_plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared_plans.is_empty()
    }
}
