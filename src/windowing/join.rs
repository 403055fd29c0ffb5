use super::slice_store::{Mergeable, Slice, SliceStore};
use crate::common::Timestamp;
use crate::runtime::OperatorHandler;
use std::any::Any;
use std::hash::Hash;
use std::sync::Arc;

pub const LEFT: u8 = 0;
pub const RIGHT: u8 = 1;

/// An appendable run of full tuples sharing one join key, the Rust
/// stand-in for the original engine's `PagedVector` (`SPEC_FULL.md` §4.7).
/// Explicit destruction of the paged vector in the original C++ has no
/// counterpart here: dropping the `Vec` is enough, since Rust's ownership
/// model already destructs it exactly once.
#[derive(Debug, Clone, Default)]
pub struct RecordRun<R>(pub Vec<R>);

impl<R: Clone> Mergeable for RecordRun<R> {
    fn merge(mut self, mut other: Self) -> Self {
        self.0.append(&mut other.0);
        self
    }
}

/// Per-slice build/probe state machine (`SPEC_FULL.md` §4.7): `Empty ->
/// BuildingLeft | BuildingRight -> BuildingBoth -> (watermark trigger) ->
/// Probing -> Emitted -> Released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSliceState {
    Empty,
    BuildingLeft,
    BuildingRight,
    BuildingBoth,
    Probing,
    Emitted,
    Released,
}

fn advance_build_state(current: JoinSliceState, side: u8) -> JoinSliceState {
    use JoinSliceState::*;
    match (current, side) {
        (Empty, LEFT) => BuildingLeft,
        (Empty, RIGHT) => BuildingRight,
        (BuildingLeft, RIGHT) | (BuildingRight, LEFT) => BuildingBoth,
        (other, _) => other,
    }
}

/// Streaming hash-join build/probe handler shared by the two
/// co-operators. `K` is the join key; `R` is the record/row representation
/// carried on either side.
pub struct HashJoinHandler<K, R> {
    slices: SliceStore<K, RecordRun<R>>,
    states: dashmap::DashMap<Timestamp, JoinSliceState>,
}

impl<K, R> HashJoinHandler<K, R>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new(size: Timestamp, slide: Timestamp, allowed_lateness: Timestamp) -> Self {
        Self { slices: SliceStore::new(size, slide, allowed_lateness), states: dashmap::DashMap::new() }
    }

    /// Build-side insert: locates or creates the slice for `ts`, appends
    /// `record` to the per-`(thread, side)` shard keyed by `key`, and
    /// advances the slice's state machine. Returns `false` for a late
    /// tuple whose slice has already triggered (`SPEC_FULL.md` §9).
    pub fn build(&self, worker_thread_id: u64, side: u8, ts: Timestamp, key: K, record: R) -> bool {
        let Some(slice) = self.slices.get_slice_or_create(ts) else {
            return false;
        };
        slice.shard(worker_thread_id, side).entry(key).or_default().0.push(record);
        self.states
            .entry(slice.start)
            .and_modify(|state| *state = advance_build_state(*state, side))
            .or_insert_with(|| advance_build_state(JoinSliceState::Empty, side));
        true
    }

    /// When the watermark advances past a slice's trigger point, probes
    /// every ready slice whose both sides have state (`BuildingBoth`):
    /// iterates the smaller side's map, looks the key up on the other
    /// side, and hands every matching `(left, right)` pair to `emit`.
    /// Slices that never received both sides (only one origin ever
    /// produced data) are released without emitting, since there is
    /// nothing to join against.
    pub fn probe(&self, watermark: Timestamp, mut emit: impl FnMut(Timestamp, Timestamp, &K, &R, &R)) {
        for slice in self.slices.take_ready(watermark) {
            let state = self.states.get(&slice.start).map(|s| *s).unwrap_or(JoinSliceState::Empty);
            if state != JoinSliceState::BuildingBoth {
                self.states.insert(slice.start, JoinSliceState::Released);
                continue;
            }
            self.states.insert(slice.start, JoinSliceState::Probing);
            self.probe_slice(&slice, &mut emit);
            self.states.insert(slice.start, JoinSliceState::Emitted);
            self.states.insert(slice.start, JoinSliceState::Released);
        }
    }

    fn probe_slice(&self, slice: &Arc<Slice<K, RecordRun<R>>>, emit: &mut impl FnMut(Timestamp, Timestamp, &K, &R, &R)) {
        let left = slice.merge_side(LEFT);
        let right = slice.merge_side(RIGHT);
        let (probe_side, build_side, swapped) = if left.len() <= right.len() {
            (left, right, false)
        } else {
            (right, left, true)
        };
        let build_map: std::collections::HashMap<K, RecordRun<R>> = build_side.into_iter().collect();
        for (key, run) in probe_side {
            let Some(other_run) = build_map.get(&key) else { continue };
            for probe_record in &run.0 {
                for build_record in &other_run.0 {
                    if swapped {
                        emit(slice.start, slice.end, &key, build_record, probe_record);
                    } else {
                        emit(slice.start, slice.end, &key, probe_record, build_record);
                    }
                }
            }
        }
    }
}

impl<K, R> OperatorHandler for HashJoinHandler<K, R>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
