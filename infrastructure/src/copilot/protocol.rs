//! JSON-RPC protocol types for Copilot CLI communication.
//!
//! This module defines the message structures used in the JSON-RPC 2.0 protocol
//! for communicating with the Copilot CLI process.
//!
//! # Protocol Overview
//!
//! - **Requests**: Client → Copilot CLI (`session.create`, `session.send`, `session.destroy`)
//! - **Responses**: Copilot CLI → Client (result or error)
//! - **Notifications**: Copilot CLI → Client (`session.event` carrying
//!   `assistant.message.delta`, `assistant.message`, `session.idle`, `session.error`)

use reviewer_application::{McpServerConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for JSON-RPC requests.
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generates a unique request ID.
fn next_id() -> u64 {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC request with an auto-generated ID.
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: next_id(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Error response sent from client → CLI for requests we cannot serve.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorOut {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub error: RpcErrorOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcErrorOut {
    pub code: i64,
    pub message: String,
}

impl JsonRpcErrorOut {
    /// JSON-RPC "method not found" for the given request id.
    pub fn method_not_found(id: u64, method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: RpcErrorOut {
                code: -32601,
                message: format!("Method not supported by this client: {}", method),
            },
        }
    }
}

/// Notification from server (session.event, etc.)
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// How the system message combines with the CLI's built-in prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemMessageMode {
    Append,
    Replace,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemMessage {
    pub mode: SystemMessageMode,
    pub content: String,
}

/// MCP server entry as the CLI expects it
#[derive(Clone, Serialize)]
pub struct McpServerParams {
    #[serde(rename = "type")]
    pub server_type: String,
    pub url: String,
    pub tools: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl From<&McpServerConfig> for McpServerParams {
    fn from(config: &McpServerConfig) -> Self {
        Self {
            server_type: config.server_type.clone(),
            url: config.url.clone(),
            tools: config.tools.clone(),
            headers: config.headers.clone(),
        }
    }
}

/// Session creation parameters
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
    pub model: String,
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<SystemMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<BTreeMap<String, McpServerParams>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

impl From<&SessionConfig> for CreateSessionParams {
    fn from(config: &SessionConfig) -> Self {
        let system_message = (!config.system_prompt.trim().is_empty()).then(|| SystemMessage {
            mode: SystemMessageMode::Append,
            content: config.system_prompt.clone(),
        });
        let mcp_servers = config.mcp_servers.as_ref().map(|servers| {
            servers
                .iter()
                .map(|(name, server)| (name.clone(), McpServerParams::from(server)))
                .collect()
        });
        Self {
            model: config.model.to_string(),
            streaming: true,
            system_message,
            mcp_servers,
            reasoning_effort: config.reasoning_effort.clone(),
        }
    }
}

/// Send parameters (for session.send)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    pub session_id: String,
    pub prompt: String,
}

/// Parameters for session.destroy
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroySessionParams {
    pub session_id: String,
}
