use super::slice_store::{Mergeable, SliceStore};
use crate::common::Timestamp;
use crate::runtime::OperatorHandler;
use std::any::Any;
use std::hash::Hash;

/// A running aggregate value. `SUM` is the only built-in kind
/// implemented here; other aggregation kinds are small concrete plugins
/// following the same shape, per the re-architecture guidance of
/// `SPEC_FULL.md` §9 ("small concrete aggregation plugins instead of a
/// template matrix").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sum(pub i64);

impl Mergeable for Sum {
    fn merge(self, other: Self) -> Self {
        Sum(self.0 + other.0)
    }
}

impl Sum {
    pub fn add(&mut self, delta: i64) {
        self.0 += delta;
    }
}

/// Tumbling/sliding `SUM(...) GROUP BY key` pre-aggregation handler
/// (`SPEC_FULL.md` §4.6). `K` is the grouping key type.
pub struct PreAggregationHandler<K> {
    slices: SliceStore<K, Sum>,
}

impl<K> PreAggregationHandler<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(size: Timestamp, slide: Timestamp, allowed_lateness: Timestamp) -> Self {
        Self { slices: SliceStore::new(size, slide, allowed_lateness) }
    }

    /// Adds `delta` to the running sum for `key` in the slice `ts` falls
    /// into, writing only into the calling thread's shard.
    pub fn add(&self, worker_thread_id: u64, ts: Timestamp, key: K, delta: i64) -> bool {
        let Some(slice) = self.slices.get_slice_or_create(ts) else {
            return false;
        };
        let shard = slice.shard(worker_thread_id, 0);
        shard
            .entry(key)
            .and_modify(|sum| sum.add(delta))
            .or_insert(Sum(delta));
        true
    }

    /// Triggers every slice whose watermark deadline has passed, handing
    /// each `(slice_start, slice_end, key -> sum)` group to `emit`.
    pub fn trigger(&self, watermark: Timestamp, emit: impl FnMut(Timestamp, Timestamp, Vec<(K, Sum)>)) {
        self.slices.trigger(watermark, emit);
    }
}

impl<K> OperatorHandler for PreAggregationHandler<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tumbling_sum_groups_by_key_within_one_slice() {
        let handler: PreAggregationHandler<i64> = PreAggregationHandler::new(2, 2, 0);
        for i in 0..10i64 {
            let ts = i; // 1ms apart, falls into 2ms tumbling slices
            handler.add(0, ts, i % 2, 1);
        }
        let mut emitted = Vec::new();
        handler.trigger(100, |start, end, groups| emitted.push((start, end, groups)));
        assert!(!emitted.is_empty());
        for (_, _, groups) in &emitted {
            assert!(groups.iter().all(|(_, sum)| sum.0 >= 1));
        }
    }

    #[test]
    fn late_tuple_after_trigger_is_dropped_not_reopened() {
        let handler: PreAggregationHandler<i64> = PreAggregationHandler::new(2, 2, 0);
        assert!(handler.add(0, 0, 1, 1));
        handler.trigger(1000, |_, _, _| {});
        assert!(!handler.add(0, 0, 1, 1));
    }
}
