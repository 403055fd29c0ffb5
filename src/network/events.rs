use crate::common::QueryId;

/// The reverse, event-only channel carries control messages from a
/// network source back toward its producer (`SPEC_FULL.md` §4.8): start
/// requests, epoch propagation for watermark alignment across a network
/// bridge, and opaque application events.
#[derive(Debug, Clone)]
pub enum Event {
    StartSource,
    PropagateEpoch { epoch: u64, query_id: QueryId },
    Custom(Vec<u8>),
}

/// The data-plane wire frame exchanged sink → source: either a tuple
/// buffer's `(tupleCount, payload)` pair or a single end-of-stream marker
/// (`SPEC_FULL.md` §6).
#[derive(Debug, Clone)]
pub enum NetworkFrame {
    Data { tuple_count: u64, payload: Vec<u8> },
    Eos(crate::common::TerminationType),
}
