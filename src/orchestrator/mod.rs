//! Orchestration of multi-step work into consistent snapshot streams.
//!
//! - [`Pipeline`] a [`StreamingOperation`](crate::StreamingOperation) built from ordered stages
//! - [`PipelineBuilder`] fluent construction, failing with [`BuildError`](crate::BuildError) when empty
//! - [`Part`] and [`Patch`] branches of a parallel stage and their partial results
//!
//! Callers trigger one pipeline invocation per user action; all sequencing of
//! sub-operations lives inside the pipeline.

mod pipeline;
mod stage;

pub use pipeline::{Pipeline, PipelineBuilder};
pub use stage::{Part, Patch};
