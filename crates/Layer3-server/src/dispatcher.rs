//! Command Dispatcher - single entry point for the transports
//!
//! Every outcome, including a panic inside a command, leaves this module as
//! a [`CallToolResult`] envelope.

use crate::commands::{
    CancelTaskCommand, Command, CommandContext, ConnectCommand, DisconnectCommand, EvalCommand,
    EvalFileCommand, GetTaskCommand, ListTasksCommand, ScreenshotCommand, StatusCommand,
};
use futures::FutureExt;
use mcbot_core::mcp::{CallToolResult, CommandDescriptor};
use mcbot_foundation::Error;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Registry of commands plus the context they run against
pub struct Dispatcher {
    commands: HashMap<String, Arc<dyn Command>>,
    /// Registration order, used by `tools/list`
    order: Vec<String>,
    ctx: Arc<CommandContext>,
}

impl Dispatcher {
    /// Create an empty dispatcher
    pub fn new(ctx: CommandContext) -> Self {
        Self {
            commands: HashMap::new(),
            order: vec![],
            ctx: Arc::new(ctx),
        }
    }

    /// Create a dispatcher with the full command catalog
    pub fn with_builtins(ctx: CommandContext) -> Self {
        let mut dispatcher = Self::new(ctx);

        dispatcher.register(Arc::new(ConnectCommand));
        dispatcher.register(Arc::new(DisconnectCommand));
        dispatcher.register(Arc::new(EvalCommand));
        dispatcher.register(Arc::new(GetTaskCommand));
        dispatcher.register(Arc::new(ListTasksCommand));
        dispatcher.register(Arc::new(CancelTaskCommand));
        dispatcher.register(Arc::new(EvalFileCommand));
        dispatcher.register(Arc::new(ScreenshotCommand));
        dispatcher.register(Arc::new(StatusCommand));

        dispatcher
    }

    /// Register a command, replacing one with the same name
    pub fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name();
        if self.commands.insert(name.clone(), command).is_none() {
            self.order.push(name);
        }
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Descriptors for `tools/list`, in registration order
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.commands.get(name))
            .map(|command| command.descriptor())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run `name` with `args` and wrap the outcome
    pub async fn dispatch(&self, name: &str, args: Value) -> CallToolResult {
        let Some(command) = self.commands.get(name).cloned() else {
            warn!(command = %name, "Unknown command");
            return CallToolResult::error(format!("Unknown tool: {}", name));
        };

        debug!(command = %name, "Dispatching");
        let run = AssertUnwindSafe(command.execute(&self.ctx, args))
            .catch_unwind()
            .await;

        match run {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => render_error(&err),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(command = %name, "Command panicked: {}", message);
                CallToolResult::error(format!("Internal error: {} panicked: {}", name, message))
            }
        }
    }
}

/// Envelope for a command failure
pub fn render_error(err: &Error) -> CallToolResult {
    if err.is_informational() {
        return CallToolResult::text(err.to_string());
    }
    match err.trace() {
        Some(trace) => CallToolResult::error(format!("{}\n{}", err, trace)),
        None => CallToolResult::error(err.to_string()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandDef;
    use async_trait::async_trait;
    use mcbot_core::session::sim::{SimOptions, SimulatedConnector};
    use mcbot_core::{SessionLimits, SessionManager};
    use mcbot_foundation::{ConnectionConfig, Result};
    use mcbot_task::{ScriptSandbox, TaskRegistry};
    use std::time::Duration;

    struct Exploding;

    #[async_trait]
    impl Command for Exploding {
        fn descriptor(&self) -> CommandDescriptor {
            CommandDef::builder("explode", "Always panics").build()
        }

        async fn execute(&self, _ctx: &CommandContext, _args: Value) -> Result<CallToolResult> {
            panic!("kaboom");
        }
    }

    fn dispatcher() -> Dispatcher {
        let session = SessionManager::spawn(
            Arc::new(SimulatedConnector::new(SimOptions::default())),
            SessionLimits {
                connect_timeout: Duration::from_secs(5),
                world_wait: Duration::from_millis(50),
            },
        );
        let tasks = TaskRegistry::new(
            session.clone(),
            Arc::new(ScriptSandbox::default()),
            Duration::from_secs(5),
        );
        Dispatcher::with_builtins(CommandContext::new(
            session,
            tasks,
            ConnectionConfig::default(),
        ))
    }

    #[test]
    fn test_render_error() {
        let result = render_error(&Error::AlreadyConnected);
        assert!(!result.is_error);
        assert_eq!(
            result.first_text(),
            Some("Bot is already connected. Use disconnect first.")
        );

        let result = render_error(&Error::execution("boom", "    at f (1:1)"));
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("boom\n    at f (1:1)"));

        let result = render_error(&Error::TaskNotFound("task_1_1".into()));
        assert_eq!(result.first_text(), Some("Task not found: task_1_1"));
    }

    #[tokio::test]
    async fn test_catalog_order() {
        let dispatcher = dispatcher();
        let names: Vec<String> = dispatcher
            .descriptors()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "connect",
                "disconnect",
                "eval",
                "get_task",
                "list_tasks",
                "cancel_task",
                "eval_file",
                "screenshot",
                "status"
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let result = dispatcher().dispatch("fly", Value::Null).await;
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("Unknown tool: fly"));
    }

    #[tokio::test]
    async fn test_panic_becomes_error_envelope() {
        let mut dispatcher = dispatcher();
        dispatcher.register(Arc::new(Exploding));

        let result = dispatcher.dispatch("explode", Value::Null).await;
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            Some("Internal error: explode panicked: kaboom")
        );

        // 다른 명령은 계속 동작
        let result = dispatcher.dispatch("disconnect", Value::Null).await;
        assert_eq!(result.first_text(), Some("Bot is not connected."));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let result = dispatcher()
            .dispatch("get_task", serde_json::json!({"task_id": 7}))
            .await;
        assert!(result.is_error);
        assert!(result.first_text().unwrap().starts_with("Invalid input:"));
    }
}
