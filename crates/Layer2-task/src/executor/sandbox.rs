//! Sandbox Executor
//!
//! Runs submitted code through the script interpreter. The only things a
//! script can touch are the capabilities bound to the session it runs
//! against; there is no filesystem, process or network access.
//!
//! ## Usage
//!
//! ```ignore
//! use mcbot_task::executor::{Executor, ScriptSandbox};
//!
//! let sandbox = ScriptSandbox::default();
//! let result = sandbox.execute("return 1 + 1", &session, cancel).await?;
//! assert_eq!(result, "2");
//! ```

use super::r#trait::Executor;
use super::script::{run_script, DEFAULT_STEP_BUDGET};
use async_trait::async_trait;
use mcbot_core::session::ReadySession;
use mcbot_foundation::{LimitsConfig, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Script interpreter executor
#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    /// Maximum interpreter steps per run
    step_budget: u64,
}

impl ScriptSandbox {
    pub fn new(step_budget: u64) -> Self {
        Self { step_budget }
    }

    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self::new(limits.step_budget)
    }

    pub fn step_budget(&self) -> u64 {
        self.step_budget
    }
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_BUDGET)
    }
}

#[async_trait]
impl Executor for ScriptSandbox {
    async fn execute(
        &self,
        code: &str,
        session: &ReadySession,
        cancel: CancellationToken,
    ) -> Result<String> {
        debug!(bytes = code.len(), budget = self.step_budget, "Executing script");
        run_script(code, session, cancel, self.step_budget).await
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_from_limits() {
        let limits = LimitsConfig {
            step_budget: 1234,
            ..LimitsConfig::default()
        };
        assert_eq!(ScriptSandbox::from_limits(&limits).step_budget(), 1234);
        assert_eq!(ScriptSandbox::default().step_budget(), DEFAULT_STEP_BUDGET);
    }

    #[test]
    fn test_is_object_safe() {
        let sandbox: std::sync::Arc<dyn Executor> = std::sync::Arc::new(ScriptSandbox::default());
        assert_eq!(sandbox.name(), "script");
    }
}
