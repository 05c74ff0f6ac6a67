//! # Drawbridge MCP
//!
//! The AI tool gateway: a closed catalogue of high-level diagram operations
//! exposed over a stateless JSON-RPC 2.0 transport (the Model Context
//! Protocol), plus the supervisor for an optional sibling stdio binary that
//! speaks the same catalogue.
//!
//! ## MCP methods
//!
//! - `initialize` - protocol handshake
//! - `tools/list` - the closed tool catalogue
//! - `tools/call` - dispatch `{name, arguments}` to a handler

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod gateway;
pub mod resources;
pub mod supervisor;
pub mod tools;

pub use gateway::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolGateway};
pub use supervisor::{ChildSupervisor, SupervisorConfig, SupervisorState};
pub use tools::Tool;

use serde_json::Value;
use thiserror::Error;

/// Payload a successful tool call hands back to the transport.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    /// Structured data, rendered as pretty-printed JSON text content.
    Json(Value),
    /// Plain text content.
    Text(String),
    /// Base64 image content.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type, e.g. `image/png`.
        mime_type: String,
    },
}

impl ToolOutput {
    /// Render as the MCP `{content: [...]}` result shape.
    #[must_use]
    pub fn into_content(self) -> Value {
        let item = match self {
            Self::Json(value) => serde_json::json!({
                "type": "text",
                "text": serde_json::to_string_pretty(&value).unwrap_or_default(),
            }),
            Self::Text(text) => serde_json::json!({"type": "text", "text": text}),
            Self::Image { data, mime_type } => serde_json::json!({
                "type": "image",
                "data": data,
                "mimeType": mime_type,
            }),
        };
        serde_json::json!({ "content": [item] })
    }
}

/// Failure modes of a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments were missing or malformed.
    #[error("{0}")]
    InvalidArguments(String),
    /// A referenced element or snapshot does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The tool needs the editor peer and none is connected.
    #[error("No frontend client connected - open the diagram editor first")]
    NoPeer,
    /// The operation failed (peer error, timeout, I/O).
    #[error("{0}")]
    Failed(String),
}

/// Result of one tool invocation.
pub type ToolResult = Result<ToolOutput, ToolError>;
