use super::worker_context::WorkerContext;
use crate::buffer::TupleBuffer;
use crate::error::Result;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

/// Result of one `execute()` invocation (`SPEC_FULL.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    Ok,
    Error,
    Finished,
}

/// Decides what happens to a buffer a stage has just emitted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationPolicy {
    /// Deliver downstream, do not re-enqueue.
    Never,
    /// Deliver downstream; may also re-enqueue for backpressure.
    Possible,
    /// Re-invoke the current stage on the same input.
    Repeat,
}

/// Stable id of one operator's mutable handler state within a pipeline.
pub type OperatorHandlerId = u64;

/// Per-operator mutable state that outlives a single `execute()` call
/// (slice stores, join handlers, ...). Stored type-erased in the
/// pipeline's handler table and downcast by the stage that owns it.
pub trait OperatorHandler: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Holds per-operator handlers, a reference to the enclosing worker
/// context, and the emission sink downstream stages write into
/// (`SPEC_FULL.md` §4.4).
pub struct PipelineExecutionContext {
    handlers: DashMap<OperatorHandlerId, Arc<dyn OperatorHandler>>,
    worker_context: Arc<WorkerContext>,
    emitted: parking_lot::Mutex<Vec<(TupleBuffer, ContinuationPolicy)>>,
}

impl PipelineExecutionContext {
    pub fn new(worker_context: Arc<WorkerContext>) -> Self {
        Self {
            handlers: DashMap::new(),
            worker_context,
            emitted: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn worker_context(&self) -> &Arc<WorkerContext> {
        &self.worker_context
    }

    pub fn register_handler(&self, id: OperatorHandlerId, handler: Arc<dyn OperatorHandler>) {
        self.handlers.insert(id, handler);
    }

    pub fn handler(&self, id: OperatorHandlerId) -> Option<Arc<dyn OperatorHandler>> {
        self.handlers.get(&id).map(|entry| entry.clone())
    }

    pub fn emit(&self, buffer: TupleBuffer, policy: ContinuationPolicy) {
        self.emitted.lock().push((buffer, policy));
    }

    /// Drains everything emitted during the current `execute()` call.
    pub fn take_emitted(&self) -> Vec<(TupleBuffer, ContinuationPolicy)> {
        std::mem::take(&mut self.emitted.lock())
    }
}

/// The executable form of one physical operator stage
/// (`SPEC_FULL.md` §4.9): the runtime only knows this trait boundary, not
/// how the code behind it was produced.
pub trait PipelineStage: Send + Sync {
    fn setup(&self, _ctx: &PipelineExecutionContext) -> Result<()> {
        Ok(())
    }

    fn execute(&self, buffer: TupleBuffer, ctx: &PipelineExecutionContext) -> Result<ExecutionResult>;

    fn stop(&self, _ctx: &PipelineExecutionContext) -> Result<()> {
        Ok(())
    }
}
