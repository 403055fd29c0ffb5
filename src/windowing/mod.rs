//! Watermarking, time-based slicing, pre-aggregation and streaming
//! hash-join build/probe (`SPEC_FULL.md` §4.5-§4.7), grounded on
//! `original_source/nes-runtime/.../MultiOriginWatermarkProcessorTest.cpp`,
//! `original_source/nes-execution/.../HJBuild.cpp`, and
//! `rusty_db::event_processing::windows` / `join_operators` for the
//! Rust-idiomatic API shape.

mod join;
mod pre_aggregation;
mod slice_store;
mod watermark;

pub use join::{HashJoinHandler, JoinSliceState, RecordRun, LEFT, RIGHT};
pub use pre_aggregation::{PreAggregationHandler, Sum};
pub use slice_store::{slice_start, Mergeable, Slice, SliceLifecycle, SliceStore};
pub use watermark::MultiOriginWatermarkProcessor;
