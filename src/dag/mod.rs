// src/dag/mod.rs

//! Task graph: registration, validation and execution planning.
//!
//! - [`graph`] holds the named tasks and their dependency lists, detects
//!   unknown dependencies and cycles, and resolves a deterministic plan.
//! - [`TaskRunner`] is the seam through which a plan is executed.

pub mod graph;

pub use graph::{TaskGraph, TaskRunner};
