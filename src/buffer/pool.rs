use super::tuple_buffer::Recycler;
use super::TupleBuffer;
use crate::error::{NebulaError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

struct UnpooledEntry {
    id: usize,
    size: usize,
    data: Option<Vec<u8>>,
}

struct PoolInner {
    buffer_size: usize,
    total_buffers: usize,
    available: Mutex<VecDeque<usize>>,
    /// One pre-allocated segment per slot, indexed by slot id. `None` while
    /// the slot is checked out; the recycler moves the bytes back in.
    storage: Mutex<Vec<Option<Vec<u8>>>>,
    condvar: Condvar,
    shut_down: AtomicBool,
    unpooled: Mutex<Vec<UnpooledEntry>>,
    next_unpooled_id: AtomicUsize,
}

/// Global, pre-allocated pool of fixed-size tuple buffers plus an overflow
/// cache of variable-sized "unpooled" segments (`SPEC_FULL.md` §4.1),
/// grounded on `BufferManager.cpp`'s `availableBuffers` free list and
/// size-sorted `unpooledBuffers` cache.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(buffer_size: usize, number_of_buffers: usize) -> Self {
        let available = (0..number_of_buffers).collect();
        let storage = (0..number_of_buffers).map(|_| Some(vec![0u8; buffer_size])).collect();
        debug!(buffer_size, number_of_buffers, "allocating tuple buffer pool");
        Self {
            inner: Arc::new(PoolInner {
                buffer_size,
                total_buffers: number_of_buffers,
                available: Mutex::new(available),
                storage: Mutex::new(storage),
                condvar: Condvar::new(),
                shut_down: AtomicBool::new(false),
                unpooled: Mutex::new(Vec::new()),
                next_unpooled_id: AtomicUsize::new(0),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    pub fn total_buffers(&self) -> usize {
        self.inner.total_buffers
    }

    /// Number of pooled buffers currently free. Used by the buffer
    /// conservation test (`SPEC_FULL.md` §8): `free + checked_out ==
    /// total_buffers`.
    pub fn available_buffers(&self) -> usize {
        self.inner.available.lock().len()
    }

    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        self.inner.condvar.notify_all();
    }

    fn pooled_recycler(&self) -> Recycler {
        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        Arc::new(move |slot, data| {
            if let Some(inner) = weak.upgrade() {
                inner.storage.lock()[slot] = Some(data);
                let mut available = inner.available.lock();
                available.push_back(slot);
                inner.condvar.notify_one();
            }
        })
    }

    fn take_slot(&self, slot: usize) -> TupleBuffer {
        let reuse = self.inner.storage.lock()[slot].take();
        TupleBuffer::new(slot, self.inner.buffer_size, Some(self.pooled_recycler()), reuse)
    }

    /// Blocks until a buffer is free. Fails with `PoolShutDown` if the pool
    /// has been shut down and will never produce another buffer.
    pub fn get_buffer_blocking(&self) -> Result<TupleBuffer> {
        let mut available = self.inner.available.lock();
        loop {
            if let Some(slot) = available.pop_front() {
                return Ok(self.take_slot(slot));
            }
            if self.inner.shut_down.load(Ordering::SeqCst) {
                return Err(NebulaError::PoolShutDown);
            }
            self.inner.condvar.wait(&mut available);
        }
    }

    /// Returns `None` rather than waiting when no buffer is immediately
    /// available.
    pub fn get_buffer_no_blocking(&self) -> Result<Option<TupleBuffer>> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(NebulaError::PoolShutDown);
        }
        let mut available = self.inner.available.lock();
        Ok(available.pop_front().map(|slot| self.take_slot(slot)))
    }

    /// Blocks up to `timeout`, then behaves like `get_buffer_no_blocking`.
    pub fn get_buffer_timeout(&self, timeout: Duration) -> Result<Option<TupleBuffer>> {
        let mut available = self.inner.available.lock();
        if available.is_empty() && !self.inner.shut_down.load(Ordering::SeqCst) {
            let result = self.inner.condvar.wait_for(&mut available, timeout);
            if result.timed_out() && available.is_empty() {
                return Ok(None);
            }
        }
        if self.inner.shut_down.load(Ordering::SeqCst) && available.is_empty() {
            return Err(NebulaError::PoolShutDown);
        }
        Ok(available.pop_front().map(|slot| self.take_slot(slot)))
    }

    /// Overflow allocation for sizes the fixed pool doesn't cover. Reuses a
    /// freed segment of the exact requested size before allocating a fresh
    /// one, mirroring the sorted-cache lookup in `BufferManager::
    /// getUnpooledBuffer`.
    pub fn get_unpooled_buffer(&self, size: usize) -> Result<TupleBuffer> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(NebulaError::PoolShutDown);
        }
        let mut unpooled = self.inner.unpooled.lock();
        let start = unpooled.partition_point(|entry| entry.size < size);
        if let Some(entry) = unpooled[start..]
            .iter_mut()
            .take_while(|entry| entry.size == size)
            .find(|entry| entry.data.is_some())
        {
            let id = entry.id;
            let reuse = entry.data.take();
            trace!(size, id, "reusing unpooled segment");
            return Ok(TupleBuffer::new(id, size, Some(self.unpooled_recycler()), reuse));
        }
        let id = self.inner.next_unpooled_id.fetch_add(1, Ordering::SeqCst);
        let insert_at = unpooled.partition_point(|entry| entry.size < size);
        unpooled.insert(insert_at, UnpooledEntry { id, size, data: None });
        trace!(size, id, "allocating new unpooled segment");
        Ok(TupleBuffer::new(id, size, Some(self.unpooled_recycler()), None))
    }

    pub fn num_unpooled_buffers(&self) -> usize {
        self.inner.unpooled.lock().len()
    }

    fn unpooled_recycler(&self) -> Recycler {
        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        Arc::new(move |id, data| {
            let Some(inner) = weak.upgrade() else { return };
            let mut unpooled = inner.unpooled.lock();
            if let Some(entry) = unpooled.iter_mut().find(|entry| entry.id == id) {
                entry.data = Some(data);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_acquire_recycles_back_to_pool() {
        let pool = BufferPool::new(128, 2);
        assert_eq!(pool.available_buffers(), 2);
        let a = pool.get_buffer_blocking().unwrap();
        assert_eq!(pool.available_buffers(), 1);
        drop(a);
        assert_eq!(pool.available_buffers(), 2);
    }

    #[test]
    fn no_blocking_returns_none_when_exhausted() {
        let pool = BufferPool::new(64, 1);
        let _a = pool.get_buffer_blocking().unwrap();
        assert!(pool.get_buffer_no_blocking().unwrap().is_none());
    }

    #[test]
    fn shutdown_fails_further_acquisitions() {
        let pool = BufferPool::new(64, 1);
        pool.shutdown();
        assert!(matches!(pool.get_buffer_blocking(), Err(NebulaError::PoolShutDown)));
    }

    #[test]
    fn unpooled_buffer_is_reused_after_recycle() {
        let pool = BufferPool::new(64, 0);
        let a = pool.get_unpooled_buffer(500).unwrap();
        assert_eq!(pool.num_unpooled_buffers(), 1);
        drop(a);
        let _b = pool.get_unpooled_buffer(500).unwrap();
        assert_eq!(pool.num_unpooled_buffers(), 1);
    }

    #[test]
    fn recycled_segment_bytes_are_actually_reused_not_reallocated() {
        let pool = BufferPool::new(64, 1);
        let a = pool.get_buffer_blocking().unwrap();
        a.with_bytes_mut(|bytes| bytes[0] = 0xAB);
        drop(a);

        let b = pool.get_buffer_blocking().unwrap();
        b.with_bytes(|bytes| assert_eq!(bytes[0], 0xAB));
    }

    #[test]
    fn unpooled_segment_bytes_are_reused_not_reallocated() {
        let pool = BufferPool::new(64, 0);
        let a = pool.get_unpooled_buffer(32).unwrap();
        a.with_bytes_mut(|bytes| bytes[0] = 0xCD);
        drop(a);

        let b = pool.get_unpooled_buffer(32).unwrap();
        b.with_bytes(|bytes| assert_eq!(bytes[0], 0xCD));
    }

    #[test]
    fn timeout_returns_none_when_nothing_frees_in_time() {
        let pool = BufferPool::new(64, 1);
        let _a = pool.get_buffer_blocking().unwrap();
        let result = pool.get_buffer_timeout(Duration::from_millis(20)).unwrap();
        assert!(result.is_none());
    }
}
