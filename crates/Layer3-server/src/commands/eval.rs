//! eval / eval_file

use super::{parse_args, Command, CommandContext, CommandDef};
use async_trait::async_trait;
use mcbot_core::mcp::{CallToolResult, CommandDescriptor};
use mcbot_foundation::{Error, Result};
use mcbot_task::{Submission, TaskSource};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Render a synchronous eval failure; other errors go to the dispatcher
fn eval_failure(prefix: &str, err: Error) -> Result<CallToolResult> {
    match err {
        Error::Execution { message, trace } => Ok(CallToolResult::error(format!(
            "{}: {}\n{}",
            prefix, message, trace
        ))),
        err @ Error::ExecutionTimeout(_) => {
            Ok(CallToolResult::error(format!("{}: {}", prefix, err)))
        }
        other => Err(other),
    }
}

// ============================================================================
// eval
// ============================================================================

#[derive(Debug, Deserialize)]
struct EvalArgs {
    code: String,
    #[serde(default)]
    background: bool,
}

pub struct EvalCommand;

#[async_trait]
impl Command for EvalCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder(
            "eval",
            "Execute a behavior script with access to the bot object (like a REPL). \
             Use background=true for long-running tasks. Available: bot, goals (GoalFollow, \
             GoalNear, GoalBlock, GoalXZ, GoalY, GoalGetToBlock), Movements, mcData, Vec3, signal.",
        )
        .string_param(
            "code",
            "Script to execute. Available: bot, goals, Movements, mcData (for items/blocks/recipes), Vec3.",
            true,
        )
        .boolean_param(
            "background",
            "Run in background and return task ID (default: false)",
            false,
        )
        .build()
    }

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult> {
        let args: EvalArgs = parse_args(args)?;
        debug!(background = args.background, len = args.code.len(), "eval");

        let source = TaskSource::inline(args.code.clone());
        match ctx.tasks.submit(args.code, source, args.background).await {
            Ok(Submission::Started(id)) => Ok(CallToolResult::text(format!(
                "Task started in background.\nTask ID: {}\nUse get_task to check status.",
                id
            ))),
            Ok(Submission::Finished(result)) => {
                Ok(CallToolResult::text(format!("Result:\n{}", result)))
            }
            Err(err) => eval_failure("Eval error", err),
        }
    }
}

// ============================================================================
// eval_file
// ============================================================================

#[derive(Debug, Deserialize)]
struct EvalFileArgs {
    file_path: String,
    #[serde(default)]
    background: bool,
}

pub struct EvalFileCommand;

#[async_trait]
impl Command for EvalFileCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder(
            "eval_file",
            "Load and execute a behavior script file with access to the bot object. \
             Same as eval but loads code from a file.",
        )
        .string_param(
            "file_path",
            "Absolute path to the script file to execute",
            true,
        )
        .boolean_param(
            "background",
            "Run in background and return task ID (default: false)",
            false,
        )
        .build()
    }

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult> {
        let args: EvalFileArgs = parse_args(args)?;

        // 파일을 읽기 전에 연결 상태부터 확인
        ctx.session.require_ready()?;

        let code = tokio::fs::read_to_string(&args.file_path)
            .await
            .map_err(|e| Error::file_read(&args.file_path, e))?;
        debug!(path = %args.file_path, background = args.background, "eval_file");

        let source = TaskSource::file(args.file_path.clone(), &code);
        match ctx.tasks.submit(code, source, args.background).await {
            Ok(Submission::Started(id)) => Ok(CallToolResult::text(format!(
                "Task started from file: {}\nTask ID: {}\nUse get_task to check status.",
                args.file_path, id
            ))),
            Ok(Submission::Finished(result)) => Ok(CallToolResult::text(format!(
                "File: {}\nResult:\n{}",
                args.file_path, result
            ))),
            Err(err) => eval_failure(&format!("Eval error in {}", args.file_path), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_eval_failure_rendering() {
        let result = eval_failure("Eval error", Error::execution("boom", "    at <script> (1:1)"))
            .unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            Some("Eval error: boom\n    at <script> (1:1)")
        );

        let result = eval_failure("Eval error", Error::ExecutionTimeout(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(
            result.first_text(),
            Some("Eval error: Eval timed out after 30s. Use background=true for long-running tasks.")
        );

        assert!(matches!(
            eval_failure("Eval error", Error::NotConnected),
            Err(Error::NotConnected)
        ));
    }
}
