// src/exec/mod.rs

//! Execution layer between the rebuild runtime and the pipeline.
//!
//! [`backend`] provides the `ExecutorBackend` trait and the production
//! `PipelineExecutor`; tests replace it with a fake implementation.

pub mod backend;

pub use backend::{ExecutorBackend, PipelineExecutor};
