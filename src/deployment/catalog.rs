//! Query catalog (`SPEC_FULL.md` §6): lifecycle state and last-error
//! message per registered query.

use crate::common::QueryId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryLifecycleState {
    Registered,
    Deploying,
    Running,
    Stopping,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub query_id: QueryId,
    pub state: QueryLifecycleState,
    pub last_error: Option<String>,
}

/// Coordinator-resident catalog of every registered query's lifecycle
/// state, keyed by query id.
#[derive(Default)]
pub struct QueryCatalog {
    entries: DashMap<QueryId, CatalogEntry>,
}

impl QueryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, query_id: QueryId) {
        self.entries.insert(
            query_id,
            CatalogEntry { query_id, state: QueryLifecycleState::Registered, last_error: None },
        );
    }

    pub fn set_state(&self, query_id: QueryId, state: QueryLifecycleState) {
        if let Some(mut entry) = self.entries.get_mut(&query_id) {
            entry.state = state;
        }
    }

    pub fn fail(&self, query_id: QueryId, error: impl Into<String>) {
        if let Some(mut entry) = self.entries.get_mut(&query_id) {
            entry.state = QueryLifecycleState::Failed;
            entry.last_error = Some(error.into());
        }
    }

    pub fn get(&self, query_id: QueryId) -> Option<CatalogEntry> {
        self.entries.get(&query_id).map(|e| e.clone())
    }

    pub fn remove(&self, query_id: QueryId) -> Option<CatalogEntry> {
        self.entries.remove(&query_id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders every entry as a JSON array, in the shape the coordinator's
    /// REST status endpoint would hand back for `GET /v1/queries`
    /// (`SPEC_FULL.md` §6 REST surface).
    pub fn to_json(&self) -> crate::error::Result<String> {
        let entries: Vec<CatalogEntry> = self.entries.iter().map(|e| e.clone()).collect();
        Ok(serde_json::to_string(&entries)?)
    }
}
