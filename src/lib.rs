//! NebulaStream runtime core: a distributed stream-processing engine's
//! worker-side execution path (buffer pool, memory layouts, runtime
//! scheduling, windowing/join, network transport) and coordinator-side
//! query lifecycle (plan representation, optimizer, placement,
//! decomposition, deployment, plugin registry).
//!
//! See `SPEC_FULL.md` for the module-by-module specification this crate
//! implements and `DESIGN.md` for how each part is grounded.

pub mod buffer;
pub mod common;
pub mod compiler;
pub mod config;
pub mod decomposition;
pub mod deployment;
pub mod error;
pub mod layout;
pub mod network;
pub mod optimizer;
pub mod placement;
pub mod plan;
pub mod registry;
pub mod runtime;
pub mod windowing;

pub use error::{NebulaError, Result};
