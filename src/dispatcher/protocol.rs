//! Wire shapes for the stdio tool protocol: one JSON request per line in,
//! one JSON response per line out. Mirrors this codebase's own IPC
//! precedent (`td/src/ipc/messages.rs`'s `DaemonMessage`/`DaemonResponse`,
//! framed one-JSON-object-per-line by `td/src/ipc/listener.rs`) but shaped
//! to the `{method, params: {name, arguments}}` envelope this
//! collaborating-executor surface speaks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LaneError;

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[allow(dead_code)]
    pub method: String,
    pub params: Params,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl Response {
    /// Wraps a JSON-serializable payload as a successful response.
    pub fn success(payload: &impl Serialize) -> Self {
        let text = serde_json::to_string(payload).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
        Self {
            content: vec![ContentItem {
                kind: "text".to_string(),
                text,
            }],
            is_error: false,
        }
    }

    /// Converts any taxonomy error into `{error: <message>, isError: true}`.
    pub fn error(err: &LaneError) -> Self {
        let text = serde_json::json!({ "error": err.message }).to_string();
        Self {
            content: vec![ContentItem {
                kind: "text".to_string(),
                text,
            }],
            is_error: true,
        }
    }
}
