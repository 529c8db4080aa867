//! Task status

use mcbot_foundation::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Possible states of a task
///
/// A task starts as `Running` and moves to exactly one terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is currently running
    Running,

    /// Task finished with a result
    Completed,

    /// Task failed with an error
    Error,

    /// Task was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `list_tasks` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(status) => status.as_str(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "all" => StatusFilter::All,
            "running" => StatusFilter::Only(TaskStatus::Running),
            "completed" => StatusFilter::Only(TaskStatus::Completed),
            "error" => StatusFilter::Only(TaskStatus::Error),
            "cancelled" => StatusFilter::Only(TaskStatus::Cancelled),
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unknown status filter '{}' (expected all, running, completed, error or cancelled)",
                    other
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parsing() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "cancelled".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(TaskStatus::Cancelled)
        );
        assert!("done".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let completed = StatusFilter::Only(TaskStatus::Completed);
        assert!(completed.matches(TaskStatus::Completed));
        assert!(!completed.matches(TaskStatus::Error));
        assert!(StatusFilter::All.matches(TaskStatus::Running));
        assert!(!TaskStatus::Running.is_terminal());
    }
}
