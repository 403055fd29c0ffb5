//! Crate-wide error type and `Result` alias.
//!
//! Error kinds mirror the taxonomy in `SPEC_FULL.md` §7: validation,
//! type inference, placement, pool exhaustion, channel, not-implemented and
//! invariant violations. Operators return `Result`s; invariant violations
//! that the original engine treats as fatal (`NES_THROW_RUNTIME_ERROR`) panic
//! here instead, consistent with "Panic / invariant" in the error taxonomy.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum NebulaError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("type inference failed: {0}")]
    TypeInference(String),

    #[error("placement failed: {0}")]
    Placement(String),

    #[error("buffer pool shut down")]
    PoolShutDown,

    #[error("buffer allocation failed: pool exhausted")]
    BufferAllocationFailure,

    #[error("channel unavailable after {retries} retries: {reason}")]
    ChannelUnavailable { retries: u32, reason: String },

    #[error("channel broken: {0}")]
    ChannelBroken(String),

    #[error("partition already registered: {0:?}")]
    PartitionAlreadyRegistered(String),

    #[error("field type mismatch: expected {expected}, found {found}")]
    FieldTypeMismatch { expected: String, found: String },

    #[error("out of bounds: record {record} >= numberOfTuples {len}")]
    OutOfBounds { record: usize, len: usize },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for NebulaError {
    fn from(e: std::io::Error) -> Self {
        NebulaError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for NebulaError {
    fn from(e: serde_json::Error) -> Self {
        NebulaError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for NebulaError {
    fn from(e: toml::de::Error) -> Self {
        NebulaError::Configuration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NebulaError>;
