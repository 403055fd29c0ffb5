use crate::common::Timestamp;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Values stored per key in a slice's shard must know how to combine with
/// another instance for the same key from a different thread's shard
/// (`SPEC_FULL.md` §4.6/§5: "merging happens at trigger time under a
/// single-writer rule").
pub trait Mergeable {
    fn merge(self, other: Self) -> Self;
}

/// `floor(ts / slide) * slide`: the start of the slice `ts` falls into
/// (`SPEC_FULL.md` §4.6). Tumbling windows are the `size == slide` case.
pub fn slice_start(ts: Timestamp, slide: Timestamp) -> Timestamp {
    (ts.div_euclid(slide)) * slide
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceLifecycle {
    Building,
    Triggered,
    Released,
}

/// One time-indexed slice: a chained hash map per `(worker thread, side)`
/// shard, combined only at trigger time.
pub struct Slice<K, V> {
    pub start: Timestamp,
    pub end: Timestamp,
    shards: DashMap<(u64, u8), DashMap<K, V>>,
    lifecycle: parking_lot::Mutex<SliceLifecycle>,
}

impl<K, V> Slice<K, V>
where
    K: Eq + Hash + Clone,
    V: Mergeable + Clone,
{
    fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
            shards: DashMap::new(),
            lifecycle: parking_lot::Mutex::new(SliceLifecycle::Building),
        }
    }

    /// The per-`(thread, side)` shard this caller should write into. No
    /// cross-thread writes happen on the hot path.
    pub fn shard(&self, worker_thread_id: u64, side: u8) -> dashmap::mapref::one::Ref<'_, (u64, u8), DashMap<K, V>> {
        self.shards.entry((worker_thread_id, side)).or_insert_with(DashMap::new);
        self.shards.get(&(worker_thread_id, side)).expect("just inserted")
    }

    pub fn lifecycle(&self) -> SliceLifecycle {
        *self.lifecycle.lock()
    }

    fn set_lifecycle(&self, state: SliceLifecycle) {
        *self.lifecycle.lock() = state;
    }

    /// Merges every shard into one key→state map. Called exactly once,
    /// when the slice is triggered.
    fn merge_all_shards(&self) -> Vec<(K, V)> {
        self.merge_shards(|_side| true)
    }

    /// Merges only the shards belonging to one side, leaving the other
    /// side's map untouched. Used by the hash-join build/probe state
    /// machine, where the two sides must stay separate until probing
    /// (`SPEC_FULL.md` §4.7).
    pub fn merge_side(&self, side: u8) -> Vec<(K, V)> {
        self.merge_shards(move |s| s == side)
    }

    fn merge_shards(&self, predicate: impl Fn(u8) -> bool) -> Vec<(K, V)> {
        let mut merged: std::collections::HashMap<K, V> = std::collections::HashMap::new();
        for shard in self.shards.iter().filter(|entry| predicate(entry.key().1)) {
            for entry in shard.value().iter() {
                let key = entry.key().clone();
                let value = entry.value().clone();
                match merged.remove(&key) {
                    Some(existing) => {
                        merged.insert(key, existing.merge(value));
                    }
                    None => {
                        merged.insert(key, value);
                    }
                }
            }
        }
        merged.into_iter().collect()
    }

    /// Whether any shard has been written for `side`.
    pub fn has_side(&self, side: u8) -> bool {
        self.shards.iter().any(|entry| entry.key().1 == side && !entry.value().is_empty())
    }
}

/// Time-based slice store for one windowing operator (`SPEC_FULL.md`
/// §4.6). Slices are created lazily on first access to a timestamp and
/// released once triggered; this spec only implements the "slicing" mode
/// (one hash map per slice, combined on trigger), not pre-combined
/// multi-level slicing.
pub struct SliceStore<K, V> {
    size: Timestamp,
    slide: Timestamp,
    allowed_lateness: Timestamp,
    slices: DashMap<Timestamp, Arc<Slice<K, V>>>,
    released_starts: dashmap::DashSet<Timestamp>,
}

impl<K, V> SliceStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Mergeable + Clone,
{
    pub fn new(size: Timestamp, slide: Timestamp, allowed_lateness: Timestamp) -> Self {
        Self {
            size,
            slide,
            allowed_lateness,
            slices: DashMap::new(),
            released_starts: dashmap::DashSet::new(),
        }
    }

    pub fn is_tumbling(&self) -> bool {
        self.size == self.slide
    }

    /// Locates or creates the slice `ts` belongs to. Returns `None` for a
    /// late tuple whose slice has already been triggered and released —
    /// per `SPEC_FULL.md` §9, such tuples are dropped silently rather than
    /// re-opening the slice.
    pub fn get_slice_or_create(&self, ts: Timestamp) -> Option<Arc<Slice<K, V>>> {
        let start = slice_start(ts, self.slide);
        if let Some(existing) = self.slices.get(&start) {
            return Some(existing.clone());
        }
        // No record of this slice: either genuinely new, or already
        // triggered-and-released. Track released starts separately so we
        // don't silently resurrect them.
        if self.released_starts.contains(&start) {
            return None;
        }
        let slice = Arc::new(Slice::new(start, start + self.size));
        self.slices.insert(start, slice.clone());
        Some(slice)
    }

    /// Triggers every slice whose `end + allowed_lateness <= watermark`:
    /// merges shards, hands the result to `emit`, and releases the slice.
    pub fn trigger(&self, watermark: Timestamp, mut emit: impl FnMut(Timestamp, Timestamp, Vec<(K, V)>)) {
        for slice in self.take_ready(watermark) {
            slice.set_lifecycle(SliceLifecycle::Triggered);
            let merged = slice.merge_all_shards();
            emit(slice.start, slice.end, merged);
            slice.set_lifecycle(SliceLifecycle::Released);
        }
    }

    /// Slices whose trigger deadline has passed, relative to `watermark`.
    pub fn ready_starts(&self, watermark: Timestamp) -> Vec<Timestamp> {
        self.slices
            .iter()
            .filter(|entry| entry.value().end + self.allowed_lateness <= watermark)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Removes and returns every ready slice, marking its start released so
    /// a late tuple for it is dropped rather than re-opening it.
    pub fn take_ready(&self, watermark: Timestamp) -> Vec<Arc<Slice<K, V>>> {
        self.ready_starts(watermark)
            .into_iter()
            .filter_map(|start| self.release(start))
            .collect()
    }

    /// Removes one slice by its start, marking it released.
    pub fn release(&self, start: Timestamp) -> Option<Arc<Slice<K, V>>> {
        let (_, slice) = self.slices.remove(&start)?;
        self.released_starts.insert(start);
        Some(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Mergeable for i64 {
        fn merge(self, other: Self) -> Self {
            self + other
        }
    }

    #[test]
    fn slice_start_floors_to_slide_boundary() {
        assert_eq!(slice_start(0, 2), 0);
        assert_eq!(slice_start(1, 2), 0);
        assert_eq!(slice_start(2, 2), 2);
        assert_eq!(slice_start(3, 2), 2);
    }

    #[test]
    fn late_tuple_after_release_returns_none() {
        let store: SliceStore<i64, i64> = SliceStore::new(10, 10, 0);
        let slice = store.get_slice_or_create(5).unwrap();
        slice.shard(0, 0).insert(1, 7);
        store.release(0);
        assert!(store.get_slice_or_create(5).is_none());
    }

    #[test]
    fn merge_side_keeps_sides_independent() {
        let slice: Slice<i64, i64> = Slice::new(0, 10);
        slice.shard(0, 0).insert(1, 5);
        slice.shard(1, 1).insert(1, 9);
        assert_eq!(slice.merge_side(0), vec![(1, 5)]);
        assert_eq!(slice.merge_side(1), vec![(1, 9)]);
    }
}
