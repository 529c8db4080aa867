//! Error types for mcbot
//!
//! 모든 에러를 중앙에서 관리

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// mcbot 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 세션 관련
    // ========================================================================
    #[error("Bot is not connected. Use connect tool first.")]
    NotConnected,

    #[error("Bot is already connected. Use disconnect first.")]
    AlreadyConnected,

    #[error("Connection timeout after {} seconds", .0.as_secs())]
    ConnectionTimeout(Duration),

    #[error("Connection error: {0}")]
    Connection(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("{message}")]
    Execution { message: String, trace: String },

    #[error(
        "Eval timed out after {}s. Use background=true for long-running tasks.",
        .0.as_secs()
    )]
    ExecutionTimeout(Duration),

    #[error("Task was cancelled")]
    Cancelled,

    // ========================================================================
    // Task 관련
    // ========================================================================
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {id} is not running (status: {status})")]
    TaskNotCancellable { id: String, status: String },

    // ========================================================================
    // 입력 / 설정
    // ========================================================================
    #[error("Failed to read file: {message}")]
    FileRead { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable kind name, used in response metadata and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotConnected => "NotConnected",
            Error::AlreadyConnected => "AlreadyConnected",
            Error::ConnectionTimeout(_) => "ConnectionTimeout",
            Error::Connection(_) => "ConnectionError",
            Error::Execution { .. } => "ExecutionError",
            Error::ExecutionTimeout(_) => "ExecutionTimeout",
            Error::Cancelled => "Cancelled",
            Error::TaskNotFound(_) => "TaskNotFound",
            Error::TaskNotCancellable { .. } => "TaskNotCancellable",
            Error::FileRead { .. } => "FileReadError",
            Error::Config(_) => "ConfigError",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Protocol(_) => "ProtocolError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// 에러가 아닌 안내 메시지로 보여줘야 하는지 확인
    ///
    /// A second `connect` is reported as plain status text, not as a failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, Error::AlreadyConnected)
    }

    /// Diagnostic trace attached to execution failures
    pub fn trace(&self) -> Option<&str> {
        match self {
            Error::Execution { trace, .. } if !trace.is_empty() => Some(trace),
            _ => None,
        }
    }

    /// Execution 에러 생성 헬퍼
    pub fn execution(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Error::Execution {
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// File read 에러 생성 헬퍼
    pub fn file_read(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::FileRead {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::ConnectionTimeout(Duration::from_secs(30)).to_string(),
            "Connection timeout after 30 seconds"
        );
        assert_eq!(
            Error::ExecutionTimeout(Duration::from_secs(30)).to_string(),
            "Eval timed out after 30s. Use background=true for long-running tasks."
        );
        assert_eq!(
            Error::TaskNotFound("task_9_1".into()).to_string(),
            "Task not found: task_9_1"
        );
    }

    #[test]
    fn test_execution_trace() {
        let err = Error::execution("boom", "    at <script> (1:1)");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.trace(), Some("    at <script> (1:1)"));
        assert_eq!(err.kind(), "ExecutionError");

        assert!(Error::execution("boom", "").trace().is_none());
    }

    #[test]
    fn test_informational() {
        assert!(Error::AlreadyConnected.is_informational());
        assert!(!Error::NotConnected.is_informational());
    }
}
