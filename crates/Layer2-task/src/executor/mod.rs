//! Task executors
//!
//! - `ScriptSandbox` - runs behavior scripts in the in-process interpreter,
//!   bound to the capability set of the current session

pub mod sandbox;
pub mod script;
pub mod r#trait;

pub use r#trait::Executor;
pub use sandbox::ScriptSandbox;
pub use script::{run_script, DEFAULT_STEP_BUDGET};
