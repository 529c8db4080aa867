//! Behavior script engine
//!
//! Submitted code is a small JavaScript-flavoured language run by an
//! in-process interpreter. Scripts see only the capability set bound to the
//! current session (`bot`, `goals`, `Movements`, `mcData`, `Vec3`, `signal`)
//! plus a handful of language builtins. Host calls are awaited implicitly,
//! so `await` is accepted and ignored.
//!
//! ```text
//! const p = bot.entity.position
//! await bot.pathfinder.goto(new goals.GoalNear(p.x + 10, p.y, p.z, 1))
//! return bot.entity.position
//! ```

mod ast;
mod builtins;
mod error;
mod interpreter;
mod lexer;
mod parser;
mod scope;
mod value;

pub use error::{ScriptError, SyntaxError};
pub use interpreter::YIELD_INTERVAL;

use interpreter::Interpreter;
use mcbot_core::session::ReadySession;
use mcbot_foundation::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default step budget for a single run
pub const DEFAULT_STEP_BUDGET: u64 = 50_000_000;

/// Run `code` against `session` and serialize its result
///
/// Fails with [`Error::Cancelled`] when `cancel` fires (or already has), and
/// with [`Error::Execution`] for syntax errors, uncaught throws and budget
/// exhaustion.
pub async fn run_script(
    code: &str,
    session: &ReadySession,
    cancel: CancellationToken,
    step_budget: u64,
) -> Result<String> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let program = parser::parse(code).map_err(|e| {
        Error::execution(
            format!("SyntaxError: {}", e.message),
            format!("    at <script> ({})", e.pos),
        )
    })?;

    let mut interpreter = Interpreter::new(session.clone(), cancel, step_budget);
    let outcome = interpreter.run(&program).await;
    debug!(steps = interpreter.steps(), ok = outcome.is_ok(), "Script finished");

    match outcome {
        Ok(value) => Ok(value::serialize_result(&value)),
        Err(ScriptError::Thrown { value, trace }) => {
            Err(Error::execution(value.error_message(), trace))
        }
        Err(ScriptError::Cancelled) => Err(Error::Cancelled),
        Err(err @ ScriptError::BudgetExceeded(_)) => Err(Error::execution(err.to_string(), "")),
    }
}
