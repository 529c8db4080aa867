//! Task definition and types

use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use mcbot_foundation::Error;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// File preview length stored on file-backed tasks
const FILE_PREVIEW_CHARS: usize = 200;

/// Unique identifier for a task: `task_<counter>_<unix-millis>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(counter: u64) -> Self {
        Self(format!("task_{}_{}", counter, Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the task runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskSource {
    /// Code submitted inline
    Inline { code: String },

    /// Code loaded from a file; only a preview is kept
    File { path: String, preview: String },
}

impl TaskSource {
    pub fn inline(code: impl Into<String>) -> Self {
        TaskSource::Inline { code: code.into() }
    }

    pub fn file(path: impl Into<String>, contents: &str) -> Self {
        TaskSource::File {
            path: path.into(),
            preview: truncate(contents, FILE_PREVIEW_CHARS),
        }
    }

    /// Text shown as the task's code
    pub fn display(&self) -> String {
        match self {
            TaskSource::Inline { code } => code.clone(),
            TaskSource::File { path, preview } => format!("[file: {}]\n{}", path, preview),
        }
    }
}

/// Error detail of a failed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    pub message: String,
    pub trace: String,
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.trace.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}\n{}", self.message, self.trace)
        }
    }
}

impl From<&Error> for TaskError {
    fn from(err: &Error) -> Self {
        let message = match err {
            Error::Execution { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            message,
            trace: err.trace().unwrap_or_default().to_string(),
        }
    }
}

/// How a task settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(String),
    Failed(TaskError),
    Cancelled,
}

/// A background task record
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub source: TaskSource,
    status: TaskStatus,
    result: Option<String>,
    error: Option<TaskError>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    cancel: CancellationToken,
}

impl Task {
    pub fn new(id: TaskId, source: TaskSource, cancel: CancellationToken) -> Self {
        Self {
            id,
            source,
            status: TaskStatus::Running,
            result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            cancel,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Terminal transition, compare-and-set from `Running`.
    ///
    /// Returns `false` (and changes nothing) when the task already settled.
    pub fn finish(&mut self, outcome: TaskOutcome) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }

        match outcome {
            TaskOutcome::Completed(result) => {
                self.status = TaskStatus::Completed;
                self.result = Some(result);
            }
            TaskOutcome::Failed(error) => {
                self.status = TaskStatus::Error;
                self.error = Some(error);
            }
            TaskOutcome::Cancelled => {
                self.cancel.cancel();
                self.status = TaskStatus::Cancelled;
            }
        }
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        let duration = (end - self.started_at).to_std().unwrap_or_default();

        TaskSnapshot {
            id: self.id.clone(),
            code: self.source.display(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration,
        }
    }
}

/// Read-only copy of a task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub code: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<TaskError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Elapsed so far while running, total once settled
    #[serde(skip)]
    pub duration: Duration,
}

impl TaskSnapshot {
    /// Seconds with millisecond precision, e.g. `1.5s`
    pub fn duration_text(&self) -> String {
        format_duration(self.duration)
    }

    /// Code preview cut at `max` characters, with `...` when cut
    pub fn code_preview(&self, max: usize) -> String {
        truncate(&self.code, max)
    }
}

/// `1500ms` → `1.5s`
pub fn format_duration(duration: Duration) -> String {
    format!("{}s", duration.as_millis() as f64 / 1000.0)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(
            TaskId::new(1),
            TaskSource::inline("return 1"),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_task_id_format() {
        let id = TaskId::new(7);
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts[0], "task");
        assert_eq!(parts[1], "7");
        assert!(parts[2].parse::<i64>().is_ok());
    }

    #[test]
    fn test_first_terminal_write_wins() {
        let mut task = task();
        assert!(task.completed_at().is_none());

        assert!(task.finish(TaskOutcome::Cancelled));
        let completed_at = task.completed_at();
        assert!(completed_at.is_some());

        assert!(!task.finish(TaskOutcome::Completed("done".into())));
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert_eq!(task.completed_at(), completed_at);
        assert!(task.snapshot().result.is_none());
    }

    #[test]
    fn test_cancel_triggers_token() {
        let token = CancellationToken::new();
        let mut task = Task::new(TaskId::new(2), TaskSource::inline("x"), token.clone());
        task.finish(TaskOutcome::Cancelled);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_file_source_preview() {
        let contents = "a".repeat(250);
        let source = TaskSource::file("/tmp/walk.js", &contents);
        let display = source.display();
        assert!(display.starts_with("[file: /tmp/walk.js]\n"));
        assert!(display.ends_with("..."));
        assert_eq!(display.lines().nth(1).unwrap().len(), 203);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(2)), "2s");
        assert_eq!(format_duration(Duration::from_millis(3)), "0.003s");
    }

    #[test]
    fn test_error_display() {
        let err = TaskError {
            message: "boom".into(),
            trace: "    at <script> (1:1)".into(),
        };
        assert_eq!(err.to_string(), "boom\n    at <script> (1:1)");
    }

    #[test]
    fn test_error_from_failure() {
        let err = TaskError::from(&Error::execution("boom", "    at f (2:3)"));
        assert_eq!(err.message, "boom");
        assert_eq!(err.trace, "    at f (2:3)");

        let err = TaskError::from(&Error::NotConnected);
        assert_eq!(err.message, "Bot is not connected. Use connect tool first.");
        assert!(err.trace.is_empty());
    }
}
