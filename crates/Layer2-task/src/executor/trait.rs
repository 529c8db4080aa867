//! Executor trait

use async_trait::async_trait;
use mcbot_core::session::ReadySession;
use mcbot_foundation::Result;
use tokio_util::sync::CancellationToken;

/// Executor trait - implement to add new execution backends
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `code` against a ready session and return the serialized result
    ///
    /// Must fail with `Error::Cancelled` once `cancel` fires, at the latest at
    /// the next suspension point.
    async fn execute(
        &self,
        code: &str,
        session: &ReadySession,
        cancel: CancellationToken,
    ) -> Result<String>;

    /// Get executor name
    fn name(&self) -> &'static str;
}
