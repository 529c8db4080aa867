//! # mcbot-task
//!
//! Task registry and script sandbox for mcbot.
//! Handles evaluation requests, background task lifecycle and the
//! interpreter that runs submitted behavior code.
//!
//! ## Features
//!
//! - Synchronous evaluation with a wall-clock timeout
//! - Background tasks with exactly-once terminal transitions
//! - Cooperative cancellation threaded through every suspension point
//! - Capability-scoped script interpreter with a step budget

pub mod executor;
pub mod registry;
pub mod state;
pub mod task;

// Execution
pub use executor::{run_script, Executor, ScriptSandbox, DEFAULT_STEP_BUDGET};

// Task system
pub use registry::{Submission, TaskCounts, TaskRegistry};
pub use state::{StatusFilter, TaskStatus};
pub use task::{format_duration, Task, TaskError, TaskId, TaskOutcome, TaskSnapshot, TaskSource};
