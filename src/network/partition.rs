use crate::common::{OperatorId, QueryId};
use serde::{Deserialize, Serialize};

/// Names one logical channel end: a `(queryId, operatorId, subPartitionId)`
/// triple (`SPEC_FULL.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkPartition {
    pub query_id: QueryId,
    pub operator_id: OperatorId,
    pub sub_partition_id: u64,
}

impl NetworkPartition {
    pub fn new(query_id: QueryId, operator_id: OperatorId, sub_partition_id: u64) -> Self {
        Self { query_id, operator_id, sub_partition_id }
    }
}

impl std::fmt::Display for NetworkPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.query_id, self.operator_id, self.sub_partition_id)
    }
}
