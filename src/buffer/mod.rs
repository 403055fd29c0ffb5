//! Tuple buffer pool: pre-allocated, reference-counted, pooled/unpooled
//! memory segments (`SPEC_FULL.md` §4.1), grounded on
//! `examples/original_source/iotdb/impl/NodeEngine/BufferManager.cpp` and on
//! `rusty_db::buffer::manager` for the Rust-idiomatic shape (partitioned
//! free list under a `parking_lot::Mutex`, `Arc`-backed control blocks).

mod local_pool;
mod pool;
mod tuple_buffer;

pub use local_pool::LocalBufferPool;
pub use pool::BufferPool;
pub use tuple_buffer::TupleBuffer;

use crate::common::{OriginId, SequenceNumber, Timestamp};

/// Mutable metadata carried by every tuple buffer, cleared on recycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct BufferMetadata {
    pub origin_id: OriginId,
    pub sequence_number: SequenceNumber,
    pub watermark: Timestamp,
    pub number_of_tuples: usize,
}

impl BufferMetadata {
    pub fn reset(&mut self) {
        *self = BufferMetadata::default();
    }
}
