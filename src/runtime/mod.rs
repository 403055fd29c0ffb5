//! Execution runtime: worker contexts, pipeline stage trait, the shared
//! task queue, and the worker thread pool (`SPEC_FULL.md` §4.3-§4.4,
//! §4.9, §5), grounded on `rusty_db::concurrent::queue` for the MPMC
//! shape and `rusty_db::event_processing` for the stage/handler split.

mod pipeline;
mod task_queue;
mod worker_context;
mod worker_pool;

pub use pipeline::{
    ContinuationPolicy, ExecutionResult, OperatorHandler, OperatorHandlerId, PipelineExecutionContext, PipelineStage,
};
pub use task_queue::{Task, TaskQueue};
pub use worker_context::{WorkerContext, WorkerStatistics};
pub use worker_pool::WorkerPool;
