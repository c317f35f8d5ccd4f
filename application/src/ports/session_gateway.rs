//! Session gateway port
//!
//! Defines the interface for opening conversational review sessions with a
//! model. Adapters (e.g. the Copilot CLI) live in the infrastructure layer.

use async_trait::async_trait;
use reviewer_domain::{Model, StreamEvent};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during session gateway operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Transport closed")]
    TransportClosed,

    #[error("Other error: {0}")]
    Other(String),
}

/// One MCP server entry attached to a session.
///
/// Header values may hold credentials and are masked in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    pub server_type: String,
    pub url: String,
    pub tools: Vec<String>,
    pub headers: BTreeMap<String, String>,
}

impl McpServerConfig {
    /// Header value safe for logs: credentials keep only their scheme prefix.
    pub fn masked_header(name: &str, value: &str) -> String {
        let lowered = name.to_ascii_lowercase();
        if !(lowered.contains("authorization") || lowered.contains("token")) {
            return value.to_string();
        }
        match value.split_once(' ') {
            Some((scheme, _)) if !scheme.is_empty() => format!("{} ***", scheme),
            _ => "***".to_string(),
        }
    }
}

impl std::fmt::Debug for McpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked: BTreeMap<&str, String> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), Self::masked_header(name, value)))
            .collect();
        f.debug_struct("McpServerConfig")
            .field("server_type", &self.server_type)
            .field("url", &self.url)
            .field("tools", &self.tools)
            .field("headers", &masked)
            .finish()
    }
}

/// MCP servers keyed by name, shared read-only across sessions.
pub type McpServers = Arc<BTreeMap<String, McpServerConfig>>;

/// Everything needed to open one review session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: Model,
    pub system_prompt: String,
    /// Attached only for remote targets.
    pub mcp_servers: Option<McpServers>,
    /// Set only for reasoning models.
    pub reasoning_effort: Option<String>,
}

impl SessionConfig {
    pub fn new(model: Model, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            mcp_servers: None,
            reasoning_effort: None,
        }
    }

    pub fn with_mcp_servers(mut self, servers: McpServers) -> Self {
        self.mcp_servers = Some(servers);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }
}

/// Gateway that opens review sessions
///
/// This port defines how the application layer talks to a model provider.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Open a new session configured with a model, system prompt and tools
    async fn open(&self, config: &SessionConfig) -> Result<Box<dyn ReviewSession>, GatewayError>;
}

/// Handle for receiving streaming events from a review session.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(GatewayError::RequestFailed(e));
                }
            }
        }
        // Channel closed without Completed: return what we have
        Ok(full_text)
    }
}

/// An open review session
#[async_trait]
pub trait ReviewSession: Send + Sync {
    /// Get the model used by this session
    fn model(&self) -> &Model;

    /// Send a prompt and get the complete response
    async fn send(&self, content: &str) -> Result<String, GatewayError>;

    /// Send a prompt and get a streaming response.
    ///
    /// Default implementation calls `send()` and wraps the result in a single
    /// `Completed` event.
    async fn send_streaming(&self, content: &str) -> Result<StreamHandle, GatewayError> {
        let result = self.send(content).await?;
        let (tx, rx) = mpsc::channel(1);
        // Send Completed event: if the receiver is dropped, that's fine
        let _ = tx.send(StreamEvent::Completed(result)).await;
        Ok(StreamHandle::new(rx))
    }

    /// Send a prompt and wait for the full response within `deadline`.
    async fn send_and_await(&self, content: &str, deadline: Duration) -> Result<String, GatewayError> {
        let exchange = async {
            let handle = self.send_streaming(content).await?;
            handle.collect_text().await
        };
        tokio::time::timeout(deadline, exchange)
            .await
            .map_err(|_| GatewayError::Timeout)?
    }

    /// Release the session on the provider side
    async fn close(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
