//! Shared value types used across the buffer, layout, runtime, windowing,
//! network and plan modules: schema/data-type descriptors, origin and
//! sequence identifiers, and timestamps (`SPEC_FULL.md` §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive field types a `Schema` can describe, grounded on
/// `rusty_db::catalog::DataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Fixed-width char array of the given length.
    Char(usize),
}

impl DataType {
    /// Size in bytes of one value of this type, used by memory layouts to
    /// compute field offsets.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::Bool | DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
            DataType::Char(len) => len,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::Int8 => write!(f, "INT8"),
            DataType::Int16 => write!(f, "INT16"),
            DataType::Int32 => write!(f, "INT32"),
            DataType::Int64 => write!(f, "INT64"),
            DataType::UInt8 => write!(f, "UINT8"),
            DataType::UInt16 => write!(f, "UINT16"),
            DataType::UInt32 => write!(f, "UINT32"),
            DataType::UInt64 => write!(f, "UINT64"),
            DataType::Float32 => write!(f, "FLOAT32"),
            DataType::Float64 => write!(f, "FLOAT64"),
            DataType::Char(len) => write!(f, "CHAR({len})"),
        }
    }
}

/// A single named, typed field in a `Schema`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type }
    }
}

/// An ordered, named list of fields describing the layout of one logical
/// tuple. Schemas are compared structurally, which is what signature
/// inference (`SPEC_FULL.md` §4.10/§4.11) relies on for plan sharing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Total byte size of one row under a row-major layout (no padding).
    pub fn row_size(&self) -> usize {
        self.fields.iter().map(|f| f.data_type.byte_size()).sum()
    }

    /// Builds the joined schema used by `StreamJoinOperator`-style joins:
    /// every field of `self` prefixed `left_`, every field of `other`
    /// prefixed `right_`, grounded on
    /// `event_processing::operators::join_operators`.
    pub fn joined_with(&self, other: &Schema) -> Schema {
        let mut fields = Vec::with_capacity(self.fields.len() + other.fields.len());
        fields.extend(self.fields.iter().map(|f| Field::new(format!("left_{}", f.name), f.data_type)));
        fields.extend(other.fields.iter().map(|f| Field::new(format!("right_{}", f.name), f.data_type)));
        Schema::new(fields)
    }
}

/// Identifies the source that produced a tuple buffer, used by the
/// multi-origin watermark processor to track per-origin progress.
pub type OriginId = u64;

/// Monotonic per-origin sequence number, used to detect gaps/duplicates on
/// the network source ingestion path.
pub type SequenceNumber = u64;

/// Event-time or ingestion-time timestamp, milliseconds since epoch unless
/// a pipeline stage documents otherwise.
pub type Timestamp = i64;

/// Numeric id of a logical/physical operator node within a plan graph.
pub type OperatorId = u64;

/// Numeric id of a node in the physical topology.
pub type TopologyNodeId = u64;

/// Numeric id of a registered query.
pub type QueryId = u64;

/// How a query (or a network channel backing one) is being torn down.
/// Shared between `stopQuery` (`SPEC_FULL.md` §6) and the network sink's
/// EOS marker (`SPEC_FULL.md` §4.8), since both describe the same
/// underlying event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationType {
    Graceful,
    HardStop,
    Failure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_size_sums_field_sizes() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("value", DataType::Float32),
        ]);
        assert_eq!(schema.row_size(), 12);
    }

    #[test]
    fn joined_schema_prefixes_fields() {
        let left = Schema::new(vec![Field::new("id", DataType::Int64)]);
        let right = Schema::new(vec![Field::new("id", DataType::Int64)]);
        let joined = left.joined_with(&right);
        assert_eq!(joined.fields[0].name, "left_id");
        assert_eq!(joined.fields[1].name, "right_id");
    }
}
