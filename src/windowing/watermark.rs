use crate::common::{OriginId, SequenceNumber, Timestamp};
use dashmap::DashMap;
use parking_lot::Mutex;

/// `seq` and `ts` are updated together under one lock so a reader can never
/// observe one without the other having caught up — the two can't be raced
/// independently the way two separate atomics could.
struct SlotState {
    max_seq: u64,
    max_ts_for_max_seq: Timestamp,
    reported: bool,
}

struct OriginSlot {
    state: Mutex<SlotState>,
}

impl OriginSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState { max_seq: 0, max_ts_for_max_seq: i64::MIN, reported: false }),
        }
    }
}

/// Tracks per-origin progress and combines it into one global watermark
/// (`SPEC_FULL.md` §4.5), grounded on
/// `MultiOriginWatermarkProcessorTest.cpp`'s single- and multi-origin test
/// shapes. Each origin's `(seq, ts, reported)` triple sits behind its own
/// lock rather than three separate atomics, so concurrent updates to the
/// same origin can't observe or store a seq/ts pair that never existed
/// together.
pub struct MultiOriginWatermarkProcessor {
    origins: DashMap<OriginId, OriginSlot>,
}

impl MultiOriginWatermarkProcessor {
    pub fn new(origin_ids: impl IntoIterator<Item = OriginId>) -> Self {
        let origins = DashMap::new();
        for origin in origin_ids {
            origins.insert(origin, OriginSlot::new());
        }
        Self { origins }
    }

    /// Idempotent: an update whose `seq` is not greater than the
    /// currently-recorded sequence number for `origin_id` is ignored.
    /// Unknown origin ids are treated as a validation error — the set of
    /// origins is fixed at construction.
    pub fn update_watermark(&self, ts: Timestamp, seq: SequenceNumber, origin_id: OriginId) -> crate::error::Result<()> {
        let slot = self
            .origins
            .get(&origin_id)
            .ok_or_else(|| crate::error::NebulaError::Validation(format!("unknown origin id {origin_id}")))?;
        let mut state = slot.state.lock();
        if seq <= state.max_seq && state.reported {
            return Ok(());
        }
        state.max_seq = seq;
        state.max_ts_for_max_seq = ts;
        state.reported = true;
        Ok(())
    }

    /// `None` until every configured origin has reported at least once;
    /// otherwise the minimum of every origin's current max timestamp.
    /// Never decreases across calls, since each origin's stored timestamp
    /// only changes when its sequence number strictly increases.
    pub fn current_watermark(&self) -> Option<Timestamp> {
        let mut min_ts: Option<Timestamp> = None;
        for entry in self.origins.iter() {
            let state = entry.state.lock();
            if !state.reported {
                return None;
            }
            min_ts = Some(match min_ts {
                Some(current) => current.min(state.max_ts_for_max_seq),
                None => state.max_ts_for_max_seq,
            });
        }
        min_ts
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }
}
