//! Caller-facing session facade for annotation pipelines
//!
//! Wraps the core execution engine in a [`PipelineRunner`] with a scoped
//! lifecycle: build a registry, submit documents, extract results, shut
//! down. The engine is guaranteed to be released when the runner is dropped.

mod runner;

pub use runner::PipelineRunner;
