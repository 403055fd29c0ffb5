use super::pipeline::PipelineStage;
use crate::buffer::TupleBuffer;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

/// One unit of work: a stage, the buffer to run it on, and which worker
/// thread it is destined for (`SPEC_FULL.md` §4.4). `target_worker` is
/// advisory — any worker may pop any task off the shared MPMC queue — and
/// is only used for telemetry/affinity hints.
pub struct Task {
    pub stage: Arc<dyn PipelineStage>,
    pub buffer: TupleBuffer,
    pub target_worker: Option<u64>,
}

/// Shared MPMC task queue backed by `crossbeam::channel`, grounded on the
/// API shape of `rusty_db::concurrent::queue` (enqueue/dequeue, bounded
/// variant) but using a real lock-free channel rather than a hand-rolled
/// epoch-reclaimed one.
#[derive(Clone)]
pub struct TaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, task: Task) {
        // An unbounded channel's sender never fails while a receiver
        // exists; the queue and its workers share the same lifetime.
        let _ = self.sender.send(task);
    }

    /// Blocks until a task is available or the queue is closed (graceful
    /// stop: process everything queued, then exit).
    pub fn pop_blocking(&self) -> Option<Task> {
        self.receiver.recv().ok()
    }

    pub fn try_pop(&self) -> Option<Task> {
        self.receiver.try_recv().ok()
    }

    /// Blocks for up to `timeout` waiting for a task; `None` on timeout as
    /// well as on an empty, disconnected queue, letting a worker loop wake
    /// periodically to re-check its shutdown flag without spinning.
    pub fn pop_blocking_timeout(&self, timeout: Duration) -> Option<Task> {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => Some(task),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Hard stop: drops every unprocessed task without running it
    /// (`SPEC_FULL.md` §4.4, §9).
    pub fn drain_without_executing(&self) -> usize {
        let mut dropped = 0;
        while self.receiver.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::error::Result;
    use crate::runtime::pipeline::{ExecutionResult, PipelineExecutionContext};

    struct NoopStage;
    impl PipelineStage for NoopStage {
        fn execute(&self, _buffer: TupleBuffer, _ctx: &PipelineExecutionContext) -> Result<ExecutionResult> {
            Ok(ExecutionResult::Ok)
        }
    }

    #[test]
    fn hard_stop_drops_unprocessed_tasks() {
        let queue = TaskQueue::new();
        let pool = BufferPool::new(16, 3);
        for _ in 0..3 {
            queue.push(Task {
                stage: Arc::new(NoopStage),
                buffer: pool.get_buffer_blocking().unwrap(),
                target_worker: None,
            });
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain_without_executing(), 3);
        assert!(queue.is_empty());
    }
}
