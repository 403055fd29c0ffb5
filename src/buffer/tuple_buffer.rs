use super::BufferMetadata;
use parking_lot::Mutex;
use std::sync::Arc;

/// Invoked when the last handle to a segment is dropped. Returns the
/// segment's bytes to whichever pool it came from.
pub(super) type Recycler = Arc<dyn Fn(usize, Vec<u8>) + Send + Sync>;

struct Inner {
    data: Mutex<Vec<u8>>,
    metadata: Mutex<BufferMetadata>,
    slot: usize,
    recycler: Option<Recycler>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(recycler) = self.recycler.take() {
            let data = std::mem::take(&mut *self.data.lock());
            recycler(self.slot, data);
        }
    }
}

/// A handle to one pooled (or unpooled) memory segment plus its mutable
/// metadata (origin, sequence number, watermark, tuple count).
///
/// Cloning bumps the handle count (`Arc::clone`); dropping the last handle
/// runs the recycler, which is exactly the refcount discipline of
/// `SPEC_FULL.md` §4.1. Unlike the original C++ engine, "recycling a
/// still-referenced segment" cannot happen here: the recycler only runs
/// once `Arc`'s strong count reaches zero, so the invariant is enforced by
/// the type system rather than a runtime check.
#[derive(Clone)]
pub struct TupleBuffer {
    inner: Arc<Inner>,
}

impl TupleBuffer {
    /// `reuse`, when given, is a previously recycled segment's bytes
    /// (resized to `size` if it came from a different-sized slot); when
    /// `None`, a fresh zeroed segment is allocated. This is the only path
    /// that allocates — every recycle-then-reacquire cycle reuses the same
    /// backing `Vec<u8>`.
    pub(super) fn new(slot: usize, size: usize, recycler: Option<Recycler>, reuse: Option<Vec<u8>>) -> Self {
        let mut data = reuse.unwrap_or_else(|| vec![0u8; size]);
        data.resize(size, 0);
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(data),
                metadata: Mutex::new(BufferMetadata::default()),
                slot,
                recycler,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.data.lock().len()
    }

    pub fn slot(&self) -> usize {
        self.inner.slot
    }

    /// Number of live handles to this segment, including `self`.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn metadata(&self) -> BufferMetadata {
        *self.inner.metadata.lock()
    }

    pub fn set_origin_id(&self, origin_id: crate::common::OriginId) {
        self.inner.metadata.lock().origin_id = origin_id;
    }

    pub fn set_sequence_number(&self, seq: crate::common::SequenceNumber) {
        self.inner.metadata.lock().sequence_number = seq;
    }

    pub fn set_watermark(&self, watermark: crate::common::Timestamp) {
        self.inner.metadata.lock().watermark = watermark;
    }

    pub fn set_number_of_tuples(&self, n: usize) {
        self.inner.metadata.lock().number_of_tuples = n;
    }

    pub fn number_of_tuples(&self) -> usize {
        self.inner.metadata.lock().number_of_tuples
    }

    /// Read-only access to the raw bytes of the segment.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.inner.data.lock())
    }

    /// Exclusive access to the raw bytes of the segment. Callers are
    /// expected to respect the single-writer-per-pipeline-stage discipline
    /// of `SPEC_FULL.md` §5; the lock only guards against data races, not
    /// against logically concurrent writers.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.inner.data.lock())
    }
}

impl std::fmt::Debug for TupleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleBuffer")
            .field("slot", &self.inner.slot)
            .field("size", &self.size())
            .field("ref_count", &self.ref_count())
            .field("metadata", &self.metadata())
            .finish()
    }
}
