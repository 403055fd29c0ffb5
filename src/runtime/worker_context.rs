use crate::buffer::{BufferPool, LocalBufferPool, TupleBuffer};
use crate::common::{OperatorId, Timestamp};
use crate::error::Result;
use crate::network::{Event, NetworkPartition, NetworkSink};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Snapshot of the per-thread telemetry sink (`SPEC_FULL.md` §4.3),
/// adapted from `WorkerContext::printStatistics`'s CSV output to an
/// in-memory counter struct surfaced via `tracing` events rather than a
/// file sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStatistics {
    pub tasks_processed: u64,
    pub buffers_emitted: u64,
    pub queue_depth_high_watermark: u64,
}

/// Per-worker-thread state (`SPEC_FULL.md` §4.3). Single-owner: never
/// shared across threads except via the handle the worker pool retains
/// for shutdown bookkeeping.
pub struct WorkerContext {
    pub worker_id: u64,
    local_pool: LocalBufferPool,
    data_channels: DashMap<OperatorId, Arc<NetworkSink>>,
    reverse_channels: DashMap<OperatorId, crossbeam::channel::Sender<Event>>,
    object_ref_counts: DashMap<u64, AtomicUsize>,
    partition_storage: Mutex<DashMap<NetworkPartition, BTreeMap<Timestamp, VecDeque<TupleBuffer>>>>,
    tasks_processed: AtomicUsize,
    buffers_emitted: AtomicUsize,
    queue_depth_high_watermark: AtomicI64,
}

impl WorkerContext {
    pub fn new(worker_id: u64, global_pool: BufferPool, buffers_per_worker: usize) -> Self {
        Self {
            worker_id,
            local_pool: LocalBufferPool::new(global_pool, buffers_per_worker),
            data_channels: DashMap::new(),
            reverse_channels: DashMap::new(),
            object_ref_counts: DashMap::new(),
            partition_storage: Mutex::new(DashMap::new()),
            tasks_processed: AtomicUsize::new(0),
            buffers_emitted: AtomicUsize::new(0),
            queue_depth_high_watermark: AtomicI64::new(0),
        }
    }

    /// Acquisition MUST try the local sub-pool before the global pool
    /// (`SPEC_FULL.md` §4.3).
    pub fn get_buffer_blocking(&self) -> Result<TupleBuffer> {
        self.local_pool.get_buffer_blocking()
    }

    pub fn get_buffer_no_blocking(&self) -> Result<Option<TupleBuffer>> {
        self.local_pool.get_buffer_no_blocking()
    }

    pub fn register_data_channel(&self, operator_id: OperatorId, sink: Arc<NetworkSink>) {
        self.data_channels.insert(operator_id, sink);
    }

    pub fn data_channel(&self, operator_id: OperatorId) -> Option<Arc<NetworkSink>> {
        self.data_channels.get(&operator_id).map(|entry| entry.clone())
    }

    pub fn register_reverse_channel(&self, operator_id: OperatorId, sender: crossbeam::channel::Sender<Event>) {
        self.reverse_channels.insert(operator_id, sender);
    }

    pub fn send_reverse_event(&self, operator_id: OperatorId, event: Event) -> Result<()> {
        match self.reverse_channels.get(&operator_id) {
            Some(sender) => sender
                .send(event)
                .map_err(|e| crate::error::NebulaError::ChannelBroken(e.to_string())),
            None => Err(crate::error::NebulaError::NotFound(format!(
                "no reverse channel registered for operator {operator_id}"
            ))),
        }
    }

    /// Reference-counts operator-level objects that share lifetime with
    /// in-flight buffers, grounded on `WorkerContext::objectRefCounters`.
    pub fn set_object_ref_count(&self, object_id: u64, count: usize) {
        self.object_ref_counts.insert(object_id, AtomicUsize::new(count));
    }

    pub fn increase_object_ref_count(&self, object_id: u64) {
        if let Some(counter) = self.object_ref_counts.get(&object_id) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Decrements the refcount and returns the value after decrement; the
    /// caller releases the object when this reaches zero.
    pub fn decrease_object_ref_count(&self, object_id: u64) -> Option<usize> {
        let counter = self.object_ref_counts.get(&object_id)?;
        let previous = counter.fetch_sub(1, Ordering::SeqCst);
        Some(previous.saturating_sub(1))
    }

    /// Stages a buffer addressed to `partition`, ordered by watermark, for
    /// a consumer that has not registered yet (`SPEC_FULL.md` §3).
    pub fn insert_into_storage(&self, partition: NetworkPartition, buffer: TupleBuffer) {
        let storage = self.partition_storage.lock();
        let mut entry = storage.entry(partition).or_default();
        let watermark = buffer.metadata().watermark;
        entry.entry(watermark).or_default().push_back(buffer);
    }

    /// Pops every buffer staged for `partition` whose watermark is
    /// `<= ts`, in ascending watermark order.
    pub fn trim_storage(&self, partition: NetworkPartition, ts: Timestamp) -> Vec<TupleBuffer> {
        let storage = self.partition_storage.lock();
        let Some(mut entry) = storage.get_mut(&partition) else {
            return Vec::new();
        };
        let mut drained = Vec::new();
        let keys_to_drain: Vec<Timestamp> = entry.range(..=ts).map(|(k, _)| *k).collect();
        for key in keys_to_drain {
            if let Some(buffers) = entry.remove(&key) {
                drained.extend(buffers);
            }
        }
        drained
    }

    pub fn record_task_processed(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_buffer_emitted(&self) {
        self.buffers_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_depth(&self, depth: usize) {
        let depth = depth as i64;
        let mut current = self.queue_depth_high_watermark.load(Ordering::Relaxed);
        while depth > current {
            match self.queue_depth_high_watermark.compare_exchange_weak(
                current,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn statistics(&self) -> WorkerStatistics {
        let stats = WorkerStatistics {
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed) as u64,
            buffers_emitted: self.buffers_emitted.load(Ordering::Relaxed) as u64,
            queue_depth_high_watermark: self.queue_depth_high_watermark.load(Ordering::Relaxed) as u64,
        };
        trace!(worker_id = self.worker_id, ?stats, "worker statistics snapshot");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;

    fn test_context() -> WorkerContext {
        WorkerContext::new(0, BufferPool::new(64, 4), 2)
    }

    #[test]
    fn object_ref_count_decrements_to_zero() {
        let ctx = test_context();
        ctx.set_object_ref_count(1, 2);
        assert_eq!(ctx.decrease_object_ref_count(1), Some(1));
        assert_eq!(ctx.decrease_object_ref_count(1), Some(0));
    }

    #[test]
    fn trim_storage_drains_only_watermarks_at_or_below_ts() {
        let ctx = test_context();
        let partition = NetworkPartition::new(1, 2, 0);
        let pool = BufferPool::new(64, 3);
        for watermark in [10, 20, 30] {
            let buf = pool.get_buffer_blocking().unwrap();
            buf.set_watermark(watermark);
            ctx.insert_into_storage(partition, buf);
        }
        let drained = ctx.trim_storage(partition, 20);
        assert_eq!(drained.len(), 2);
        let remaining = ctx.trim_storage(partition, 100);
        assert_eq!(remaining.len(), 1);
    }
}
