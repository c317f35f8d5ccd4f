//! Copilot session management.
//!
//! Provides [`CopilotSession`], the [`ReviewSession`] for one conversation
//! with a model through the Copilot CLI.

use crate::copilot::error::{CopilotError, Result};
use crate::copilot::protocol::{CreateSessionParams, DestroySessionParams, JsonRpcRequest, SendParams};
use crate::copilot::router::{MessageRouter, SessionChannel};
use async_trait::async_trait;
use reviewer_application::{GatewayError, ReviewSession, SessionConfig, StreamHandle};
use reviewer_domain::Model;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tracing::{debug, info};

/// Upper bound for `session.destroy`.
const DESTROY_TIMEOUT: Duration = Duration::from_secs(10);
/// Stream events buffered between the router and the consumer.
const STREAM_BUFFER: usize = 256;

/// An active conversation session with a specific Copilot model.
pub struct CopilotSession {
    router: Arc<MessageRouter>,
    session_id: String,
    model: Model,
    channel: Arc<Mutex<SessionChannel>>,
}

impl CopilotSession {
    /// Create a session from a review session configuration.
    pub async fn create(router: Arc<MessageRouter>, config: &SessionConfig) -> Result<Self> {
        info!("Creating session with model: {}", config.model);
        if config.mcp_servers.is_some() {
            debug!("Session attaches MCP servers: {:?}", config.mcp_servers);
        }

        let (session_id, channel) = router
            .create_session(CreateSessionParams::from(config))
            .await?;

        Ok(Self {
            router,
            session_id,
            model: config.model.clone(),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    /// Returns the Copilot session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a prompt, returning the channel its events arrive on.
    async fn submit(&self, prompt: &str) -> Result<OwnedMutexGuard<SessionChannel>> {
        // One prompt in flight per session
        let channel = Arc::clone(&self.channel).try_lock_owned().map_err(|_| {
            CopilotError::UnexpectedResponse("a prompt is already in flight on this session".into())
        })?;

        debug!("Sending prompt to session {} ({} bytes)", self.session_id, prompt.len());
        let params = SendParams {
            session_id: self.session_id.clone(),
            prompt: prompt.to_string(),
        };
        let request = JsonRpcRequest::new("session.send", Some(serde_json::to_value(&params)?));
        let response = self.router.request(&request).await?;

        if let Some(error) = response.error {
            return Err(CopilotError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        Ok(channel)
    }

    async fn destroy(&self) -> Result<()> {
        let params = DestroySessionParams {
            session_id: self.session_id.clone(),
        };
        let request =
            JsonRpcRequest::new("session.destroy", Some(serde_json::to_value(&params)?));
        let response = self.router.request_with_timeout(&request, DESTROY_TIMEOUT).await;
        self.router.deregister_session(&self.session_id);

        if let Some(error) = response?.error {
            return Err(CopilotError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        debug!("Session {} destroyed", self.session_id);
        Ok(())
    }
}

#[async_trait]
impl ReviewSession for CopilotSession {
    fn model(&self) -> &Model {
        &self.model
    }

    async fn send(&self, content: &str) -> std::result::Result<String, GatewayError> {
        self.send_streaming(content).await?.collect_text().await
    }

    async fn send_streaming(&self, content: &str) -> std::result::Result<StreamHandle, GatewayError> {
        let mut channel = self.submit(content).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            channel.forward(tx).await;
        });
        Ok(StreamHandle::new(rx))
    }

    async fn close(&self) -> std::result::Result<(), GatewayError> {
        self.destroy().await.map_err(GatewayError::from)
    }
}

impl Drop for CopilotSession {
    fn drop(&mut self) {
        self.router.deregister_session(&self.session_id);
    }
}
