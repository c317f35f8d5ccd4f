//! Copilot session gateway implementation

use crate::copilot::router::MessageRouter;
use crate::copilot::session::CopilotSession;
use async_trait::async_trait;
use reviewer_application::{GatewayError, ReviewSession, SessionConfig, SessionGateway};
use std::sync::Arc;
use tracing::info;

/// Session gateway backed by one `copilot --server` process.
///
/// All sessions share the process and its connection.
pub struct CopilotSessionGateway {
    router: Arc<MessageRouter>,
}

impl CopilotSessionGateway {
    /// Create a new gateway by spawning the Copilot CLI
    pub async fn spawn() -> Result<Self, GatewayError> {
        let router = MessageRouter::spawn()
            .await
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        info!("CopilotSessionGateway initialized");
        Ok(Self { router })
    }

    /// Create a gateway with a custom CLI command
    pub async fn spawn_with_command(cmd: &str) -> Result<Self, GatewayError> {
        let router = MessageRouter::spawn_with_command(cmd)
            .await
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self { router })
    }

    /// Create a gateway over an existing router
    pub fn with_router(router: Arc<MessageRouter>) -> Self {
        Self { router }
    }

    /// Get a reference to the underlying router
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }
}

#[async_trait]
impl SessionGateway for CopilotSessionGateway {
    async fn open(&self, config: &SessionConfig) -> Result<Box<dyn ReviewSession>, GatewayError> {
        let session = CopilotSession::create(Arc::clone(&self.router), config).await?;
        Ok(Box::new(session))
    }
}
