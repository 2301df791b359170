// src/exec/mod.rs

//! Stage execution layer.
//!
//! Runs the [`Stage`](crate::stage::Stage) behind each scheduled task on its
//! own Tokio task and reports back to the engine via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the loop that receives scheduled tasks.
//! - [`task_runner`] runs one stage and converts its result to an outcome.
//! - [`backend`] provides the `ExecutorBackend` trait used by the runtime,
//!   and the production `StageExecutorBackend`.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, StageExecutorBackend};
pub use executor_loop::spawn_executor;
