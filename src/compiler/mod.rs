//! Pipeline compiler boundary (`SPEC_FULL.md` §4.9). The runtime only
//! knows the `PipelineStage` trait; how a stage's code was produced is
//! opaque to it. This module lowers a physical plan into a sequence of
//! stages plus an operator-handler table, and offers an optional artifact
//! cache keyed on a canonical signature of the compiled unit.
//!
//! There is no real code generator backing this (the Nautilus JIT and SQL
//! front end are named-only external collaborators per the spec's
//! Non-goals); `compile` always rebuilds the stage chain via the closure
//! the caller supplies, but exercises the real cache-key/hit/miss path so
//! a future code generator only has to plug into `build`.

use crate::runtime::{OperatorHandler, OperatorHandlerId, PipelineStage};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// One lowered pipeline: an ordered stage chain plus the operator handlers
/// it needs registered before it can run.
pub struct CompiledPipeline {
    pub stages: Vec<Arc<dyn PipelineStage>>,
    pub handlers: Vec<(OperatorHandlerId, Arc<dyn OperatorHandler>)>,
}

/// Inputs to the cache key: the original SQL text, execution-mode flags,
/// the operator buffer size, and a canonical signature of each physical
/// operator (`SPEC_FULL.md` §4.9).
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub sql: String,
    pub execution_mode_flags: u32,
    pub buffer_size: usize,
    pub operator_signature: String,
}

impl CompilationUnit {
    fn cache_key(&self) -> String {
        format!("{}|{:#x}|{}|{}", self.sql, self.execution_mode_flags, self.buffer_size, self.operator_signature)
    }
}

/// Compiled-artifact cache. Stores an opaque blob per key; a real code
/// generator would store its compiled object code here instead of the
/// placeholder used by `PipelineCompiler::compile`.
#[derive(Default)]
pub struct CompiledArtifactCache {
    blobs: DashMap<String, Vec<u8>>,
}

impl CompiledArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).map(|entry| entry.clone())
    }

    pub fn insert(&self, key: String, blob: Vec<u8>) {
        self.blobs.insert(key, blob);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Lowers physical plans into `CompiledPipeline`s, consulting the artifact
/// cache first.
pub struct PipelineCompiler {
    cache: CompiledArtifactCache,
}

impl Default for PipelineCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineCompiler {
    pub fn new() -> Self {
        Self { cache: CompiledArtifactCache::new() }
    }

    /// Builds the pipeline via `build`, consulting/populating the cache by
    /// `unit`'s canonical key. `build` always runs in this implementation
    /// (no real code generator to skip); the cache hit/miss is still
    /// tracked so the key derivation and storage path are exercised.
    pub fn compile(&self, unit: &CompilationUnit, build: impl FnOnce() -> CompiledPipeline) -> CompiledPipeline {
        let key = unit.cache_key();
        if self.cache.get(&key).is_some() {
            debug!(key, "compiled artifact cache hit");
        } else {
            trace!(key, "compiled artifact cache miss");
            self.cache.insert(key, unit.operator_signature.clone().into_bytes());
        }
        build()
    }

    pub fn cache(&self) -> &CompiledArtifactCache {
        &self.cache
    }
}
