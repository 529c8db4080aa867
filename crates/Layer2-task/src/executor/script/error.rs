//! Script errors

use super::ast::Pos;
use super::value::Value;
use thiserror::Error;

/// Parse-time failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("SyntaxError: {message} ({pos})")]
pub struct SyntaxError {
    pub message: String,
    pub pos: Pos,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

/// Run-time failure
///
/// Only `Thrown` can be caught by `try/catch`.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    /// A thrown value plus the trace captured where it was thrown
    #[error("{}", .value.error_message())]
    Thrown { value: Value, trace: String },

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Script exceeded its step budget of {0} steps")]
    BudgetExceeded(u64),
}
