//! get_task / list_tasks / cancel_task

use super::{parse_args, Command, CommandContext, CommandDef};
use async_trait::async_trait;
use mcbot_core::mcp::{CallToolResult, CommandDescriptor};
use mcbot_foundation::Result;
use mcbot_task::{StatusFilter, TaskSnapshot, TaskStatus};
use serde::Deserialize;
use serde_json::Value;

const GET_CODE_PREVIEW: usize = 100;
const LIST_CODE_PREVIEW: usize = 50;

#[derive(Debug, Deserialize)]
struct TaskIdArgs {
    task_id: String,
}

/// Detail block shown by `get_task`
fn render_task(task: &TaskSnapshot) -> String {
    let duration = if task.status == TaskStatus::Running {
        format!("{} (running)", task.duration_text())
    } else {
        task.duration_text()
    };

    let mut output = format!(
        "Task ID: {}\nStatus: {}\nDuration: {}\nCode: {}\n",
        task.id,
        task.status,
        duration,
        task.code_preview(GET_CODE_PREVIEW)
    );

    match task.status {
        TaskStatus::Completed => {
            output.push_str("\nResult:\n");
            output.push_str(task.result.as_deref().unwrap_or("undefined"));
        }
        TaskStatus::Error => {
            if let Some(error) = &task.error {
                output.push_str("\nError:\n");
                output.push_str(&error.message);
                if !error.trace.is_empty() {
                    output.push('\n');
                    output.push_str(&error.trace);
                }
            }
        }
        TaskStatus::Running | TaskStatus::Cancelled => {}
    }
    output
}

// ============================================================================
// get_task
// ============================================================================

pub struct GetTaskCommand;

#[async_trait]
impl Command for GetTaskCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder("get_task", "Get the status and output of a background task")
            .string_param(
                "task_id",
                "The task ID returned from eval with background=true",
                true,
            )
            .build()
    }

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult> {
        let args: TaskIdArgs = parse_args(args)?;
        let task = ctx.tasks.get(&args.task_id)?;
        Ok(CallToolResult::text(render_task(&task)))
    }
}

// ============================================================================
// list_tasks
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    status: Option<String>,
}

pub struct ListTasksCommand;

#[async_trait]
impl Command for ListTasksCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder("list_tasks", "List all background tasks and their status")
            .enum_param(
                "status",
                "Filter by status (default: all)",
                &["all", "running", "completed", "error", "cancelled"],
                false,
            )
            .build()
    }

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult> {
        let args: ListArgs = parse_args(args)?;
        let filter = match args.status {
            Some(status) => status.parse::<StatusFilter>()?,
            None => StatusFilter::All,
        };

        let tasks = ctx.tasks.list(filter);
        if tasks.is_empty() {
            let text = match filter {
                StatusFilter::All => "No tasks found.".to_string(),
                StatusFilter::Only(status) => format!("No tasks found with status: {}.", status),
            };
            return Ok(CallToolResult::text(text));
        }

        let lines: Vec<String> = tasks
            .iter()
            .map(|task| {
                format!(
                    "- {}: {} ({}) - {}",
                    task.id,
                    task.status,
                    task.duration_text(),
                    task.code_preview(LIST_CODE_PREVIEW)
                )
            })
            .collect();

        Ok(CallToolResult::text(format!(
            "Tasks ({}):\n{}",
            tasks.len(),
            lines.join("\n")
        )))
    }
}

// ============================================================================
// cancel_task
// ============================================================================

pub struct CancelTaskCommand;

#[async_trait]
impl Command for CancelTaskCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder(
            "cancel_task",
            "Cancel a running background task. Aborts execution and stops any active pathfinder goals.",
        )
        .string_param("task_id", "The task ID to cancel", true)
        .build()
    }

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult> {
        let args: TaskIdArgs = parse_args(args)?;
        let task = ctx.tasks.cancel(&args.task_id).await?;
        Ok(CallToolResult::text(format!(
            "Task {} cancelled after {}.\nPathfinder goals stopped.",
            task.id,
            task.duration_text()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mcbot_task::{TaskError, TaskId};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn snapshot(status: TaskStatus) -> TaskSnapshot {
        TaskSnapshot {
            id: TaskId("task_1_1700000000000".to_string()),
            code: "return 1".to_string(),
            status,
            result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_render_running() {
        let text = render_task(&snapshot(TaskStatus::Running));
        assert_eq!(
            text,
            "Task ID: task_1_1700000000000\nStatus: running\nDuration: 1.5s (running)\nCode: return 1\n"
        );
    }

    #[test]
    fn test_render_completed_and_error() {
        let mut done = snapshot(TaskStatus::Completed);
        done.result = Some("2".to_string());
        assert!(render_task(&done).ends_with("Duration: 1.5s\nCode: return 1\n\nResult:\n2"));

        let mut failed = snapshot(TaskStatus::Error);
        failed.error = Some(TaskError {
            message: "boom".to_string(),
            trace: "    at <script> (1:1)".to_string(),
        });
        assert!(render_task(&failed).ends_with("\nError:\nboom\n    at <script> (1:1)"));
    }
}
