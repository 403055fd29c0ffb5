use super::pipeline::{ExecutionResult, OperatorHandler, OperatorHandlerId, PipelineExecutionContext};
use super::task_queue::TaskQueue;
use super::worker_context::WorkerContext;
use crate::buffer::BufferPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, trace, warn};

/// How long `pop_blocking_timeout` waits before a worker re-checks its
/// `running` flag; bounds graceful-stop latency without busy-polling.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Worker {
    context: Arc<PipelineExecutionContext>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed-size pool of OS threads, one `WorkerContext` each, consuming from
/// a single shared MPMC `TaskQueue` (`SPEC_FULL.md` §5: "Parallel
/// OS-threads managed as a worker pool; N workers where N is configured").
pub struct WorkerPool {
    queue: TaskQueue,
    workers: Vec<Worker>,
    running: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(num_workers: usize, global_pool: BufferPool, buffers_per_worker: usize) -> Self {
        let queue = TaskQueue::new();
        let running = Arc::new(AtomicBool::new(true));
        let workers = (0..num_workers)
            .map(|worker_id| {
                let worker_context = Arc::new(WorkerContext::new(worker_id as u64, global_pool.clone(), buffers_per_worker));
                let exec_context = Arc::new(PipelineExecutionContext::new(worker_context));
                let queue = queue.clone();
                let running = running.clone();
                let exec_context_thread = exec_context.clone();
                let handle = std::thread::Builder::new()
                    .name(format!("nebula-worker-{worker_id}"))
                    .spawn(move || run_worker_loop(worker_id as u64, queue, exec_context_thread, running))
                    .expect("failed to spawn worker thread");
                Worker { context: exec_context, handle: Some(handle) }
            })
            .collect();
        Self { queue, workers, running }
    }

    pub fn task_queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Broadcasts a shared operator handler into every worker's execution
    /// context under `id`. Operators whose state must be visible across
    /// worker threads (slice stores, join handlers) register the same
    /// `Arc` on every worker rather than one instance per thread, and rely
    /// on the handler's own internal per-thread sharding
    /// (`SPEC_FULL.md` §5).
    pub fn register_handler(&self, id: OperatorHandlerId, handler: Arc<dyn OperatorHandler>) {
        for worker in &self.workers {
            worker.context.register_handler(id, handler.clone());
        }
    }

    pub fn context_for(&self, worker_id: u64) -> Option<Arc<PipelineExecutionContext>> {
        self.workers.get(worker_id as usize).map(|w| w.context.clone())
    }

    /// Graceful stop: let the queue drain naturally, then join.
    pub fn stop_graceful(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join_all();
    }

    /// Hard stop: drop everything still queued, then join
    /// (`SPEC_FULL.md` §4.4, §9 — "hard stop does not wait for in-flight
    /// network sends; it drops queued-but-unsent frames").
    pub fn stop_hard(&mut self) {
        let dropped = self.queue.drain_without_executing();
        if dropped > 0 {
            warn!(dropped, "hard stop dropped unprocessed tasks");
        }
        self.running.store(false, Ordering::SeqCst);
        self.join_all();
    }

    fn join_all(&mut self) {
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn run_worker_loop(
    worker_id: u64,
    queue: TaskQueue,
    ctx: Arc<PipelineExecutionContext>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::SeqCst) && queue.is_empty() {
            break;
        }
        let Some(task) = queue.pop_blocking_timeout(SHUTDOWN_POLL_INTERVAL) else {
            continue;
        };
        ctx.worker_context().record_queue_depth(queue.len());
        match task.stage.execute(task.buffer, &ctx) {
            Ok(ExecutionResult::Ok) => {}
            Ok(ExecutionResult::Finished) => {
                if let Err(err) = task.stage.stop(&ctx) {
                    error!(worker_id, ?err, "stage stop() failed");
                }
            }
            Ok(ExecutionResult::Error) => {
                warn!(worker_id, "stage reported ExecutionResult::Error");
            }
            Err(err) => {
                error!(worker_id, ?err, "stage execute() returned an error");
            }
        }
        ctx.worker_context().record_task_processed();
        trace!(worker_id, "task processed");
    }
}
