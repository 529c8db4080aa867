//! MCP Types - 응답 envelope 및 명령 descriptor

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 명령 descriptor (`tools/list` 항목)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// 명령 이름
    pub name: String,

    /// 명령 설명
    pub description: String,

    /// 입력 스키마 (JSON Schema object)
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `tools/call` 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandCall {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,
}

/// 응답 콘텐츠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// 텍스트 콘텐츠
    Text { text: String },

    /// 이미지 콘텐츠 (base64)
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// 모든 명령이 돌려주는 uniform envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,

    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl CallToolResult {
    /// 성공 결과 생성
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// 오류 결과 생성
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// 이미지 결과 생성
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Image {
                data: data.into(),
                mime_type: mime_type.into(),
            }],
            is_error: false,
        }
    }

    /// 첫 번째 텍스트 콘텐츠
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            Content::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}
