//! Commands - the operations published through `tools/list`
//!
//! - `connection.rs` - connect / disconnect
//! - `eval.rs` - eval / eval_file
//! - `tasks.rs` - get_task / list_tasks / cancel_task
//! - `info.rs` - status / screenshot

mod connection;
mod eval;
mod info;
mod tasks;

pub use connection::{ConnectCommand, DisconnectCommand};
pub use eval::{EvalCommand, EvalFileCommand};
pub use info::{ScreenshotCommand, StatusCommand};
pub use tasks::{CancelTaskCommand, GetTaskCommand, ListTasksCommand};

use async_trait::async_trait;
use mcbot_core::mcp::{CallToolResult, CommandDescriptor};
use mcbot_core::SessionManager;
use mcbot_foundation::{ConnectionConfig, Error, Result};
use mcbot_task::TaskRegistry;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

// ============================================================================
// Context
// ============================================================================

/// Shared state every command runs against
pub struct CommandContext {
    pub session: SessionManager,
    pub tasks: TaskRegistry,
    /// Defaults for omitted `connect` arguments
    pub defaults: ConnectionConfig,
}

impl CommandContext {
    pub fn new(session: SessionManager, tasks: TaskRegistry, defaults: ConnectionConfig) -> Self {
        Self {
            session,
            tasks,
            defaults,
        }
    }
}

// ============================================================================
// Command trait
// ============================================================================

/// A single command of the catalog
///
/// Failures are returned as [`Error`]s and rendered by the dispatcher;
/// a command only builds its own error envelope when the text carries
/// command-specific context (e.g. the file an eval came from).
#[async_trait]
pub trait Command: Send + Sync {
    fn descriptor(&self) -> CommandDescriptor;

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult>;

    fn name(&self) -> String {
        self.descriptor().name
    }
}

/// Decode command arguments; a missing argument object counts as `{}`
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| Error::InvalidInput(e.to_string()))
}

// ============================================================================
// Descriptor builder
// ============================================================================

/// Builder for [`CommandDescriptor`] input schemas
pub struct CommandDef {
    name: String,
    description: String,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl CommandDef {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Map::new(),
            required: vec![],
        }
    }

    fn param(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn string_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(
            name,
            json!({ "type": "string", "description": description }),
            required,
        )
    }

    pub fn number_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(
            name,
            json!({ "type": "number", "description": description }),
            required,
        )
    }

    pub fn boolean_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(
            name,
            json!({ "type": "boolean", "description": description }),
            required,
        )
    }

    pub fn enum_param(self, name: &str, description: &str, values: &[&str], required: bool) -> Self {
        self.param(
            name,
            json!({ "type": "string", "description": description, "enum": values }),
            required,
        )
    }

    /// `{x, y, z}` number triple
    pub fn vector_param(self, name: &str, description: &str, required: bool) -> Self {
        self.param(
            name,
            json!({
                "type": "object",
                "description": description,
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "z": { "type": "number" }
                },
                "required": ["x", "y", "z"]
            }),
            required,
        )
    }

    pub fn build(self) -> CommandDescriptor {
        CommandDescriptor {
            name: self.name,
            description: self.description,
            input_schema: json!({
                "type": "object",
                "properties": Value::Object(self.properties),
                "required": self.required,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_builder_schema() {
        let def = CommandDef::builder("eval", "Run code")
            .string_param("code", "Code to run", true)
            .boolean_param("background", "Run in background", false)
            .enum_param("status", "Filter", &["all", "running"], false)
            .build();

        assert_eq!(def.name, "eval");
        assert_eq!(def.input_schema["type"], "object");
        assert_eq!(def.input_schema["required"], json!(["code"]));
        assert_eq!(def.input_schema["properties"]["background"]["type"], "boolean");
        assert_eq!(
            def.input_schema["properties"]["status"]["enum"],
            json!(["all", "running"])
        );
    }

    #[derive(Debug, Deserialize)]
    struct Args {
        code: String,
        #[serde(default)]
        background: bool,
    }

    #[test]
    fn test_parse_args() {
        let args: Args = parse_args(json!({"code": "return 1"})).unwrap();
        assert_eq!(args.code, "return 1");
        assert!(!args.background);

        let err = parse_args::<Args>(Value::Null).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("code"));
    }
}
