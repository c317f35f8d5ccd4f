//! Attempt runner: one (agent, pass) review with bounded retries.
//!
//! Every attempt opens its own session, streams the response into a
//! [`ContentAccumulator`] watched by the idle watchdog and gets the full
//! per-attempt timeout. Failures never escape: the last outcome is returned
//! as a [`ReviewResult`].

use super::accumulator::{ContentAccumulator, Settlement};
use super::watchdog::{IdleWatchdog, WatchHandle};
use crate::config::SESSION_CLOSE_TIMEOUT;
use crate::ports::progress::ReviewProgressNotifier;
use crate::ports::session_gateway::{McpServers, ReviewSession, SessionConfig, SessionGateway};
use reviewer_domain::{AgentTask, ReviewResult, ReviewTarget, StreamEvent};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why one attempt (or task) did not produce a review.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("Agent returned empty content")]
    EmptyContent,

    #[error("Review attempt timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Session idle for {}s (threshold {}s)", .elapsed.as_secs(), .threshold.as_secs())]
    IdleTimeout { elapsed: Duration, threshold: Duration },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Interrupted while waiting for a concurrency permit")]
    Interrupted,
}

impl AttemptError {
    /// Everything but interruption gets another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AttemptError::Interrupted)
    }
}

/// Read-only data shared by every task of a run.
#[derive(Debug, Clone)]
pub struct RunShared {
    pub target: ReviewTarget,
    /// Pre-collected source text for local targets
    pub source: Option<Arc<str>>,
    /// Attached to remote-target sessions only
    pub mcp_servers: Option<McpServers>,
    pub output_constraints: Option<String>,
    pub custom_instructions: Vec<String>,
    pub reasoning_effort: Option<String>,
}

impl RunShared {
    pub fn new(target: ReviewTarget) -> Self {
        Self {
            target,
            source: None,
            mcp_servers: None,
            output_constraints: None,
            custom_instructions: Vec::new(),
            reasoning_effort: None,
        }
    }
}

pub struct AttemptRunner {
    gateway: Arc<dyn SessionGateway>,
    watchdog: Arc<IdleWatchdog>,
    shared: Arc<RunShared>,
    progress: Arc<dyn ReviewProgressNotifier>,
    agent_timeout: Duration,
    idle_timeout: Option<Duration>,
    max_attempts: u32,
}

impl AttemptRunner {
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        watchdog: Arc<IdleWatchdog>,
        shared: Arc<RunShared>,
        progress: Arc<dyn ReviewProgressNotifier>,
    ) -> Self {
        Self {
            gateway,
            watchdog,
            shared,
            progress,
            agent_timeout: Duration::from_secs(5 * 60),
            idle_timeout: None,
            max_attempts: 1,
        }
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_attempts = max_retries.saturating_add(1);
        self
    }

    pub fn target_name(&self) -> String {
        self.shared.target.display_name()
    }

    /// Failure result for `task` against this run's target.
    pub fn failure(&self, task: &AgentTask, message: impl Into<String>) -> ReviewResult {
        ReviewResult::failure(task.agent().identity(), self.target_name(), message)
    }

    pub(crate) fn progress(&self) -> &Arc<dyn ReviewProgressNotifier> {
        &self.progress
    }

    /// Run all attempts of `task`; only the last outcome is returned.
    pub async fn run(&self, task: &AgentTask) -> ReviewResult {
        let agent = task.agent();
        let config = self.session_config(task);
        let instruction = agent.build_instruction(&self.shared.target, self.shared.source.as_deref());
        let target_name = self.target_name();

        let mut last_error = AttemptError::EmptyContent;
        for attempt in 1..=self.max_attempts {
            debug!("{}: attempt {}/{}", task, attempt, self.max_attempts);

            let outcome = self.attempt(&config, &instruction).await;
            let error = match outcome {
                Ok(content) => match ReviewResult::success(agent.identity(), &target_name, content) {
                    Ok(result) => {
                        info!("{}: review completed on attempt {}", task, attempt);
                        return result;
                    }
                    Err(_) => AttemptError::EmptyContent,
                },
                Err(e) => e,
            };

            warn!(
                "{}: attempt {}/{} failed: {}",
                task, attempt, self.max_attempts, error
            );
            self.progress
                .on_attempt_failed(task, attempt, self.max_attempts, &error.to_string());

            let retryable = error.is_retryable();
            last_error = error;
            if !retryable {
                break;
            }
        }

        ReviewResult::failure(agent.identity(), target_name, last_error.to_string())
    }

    fn session_config(&self, task: &AgentTask) -> SessionConfig {
        let agent = task.agent();
        let system_prompt =
            agent.build_system_prompt(self.shared.output_constraints.as_deref(), &self.shared.custom_instructions);
        let mut config = SessionConfig::new(agent.model.clone(), system_prompt);

        match &self.shared.target {
            ReviewTarget::Remote { .. } => {
                if let Some(servers) = &self.shared.mcp_servers {
                    config = config.with_mcp_servers(Arc::clone(servers));
                }
            }
            ReviewTarget::Local { .. } => {}
        }

        if let Some(effort) = agent.model.reasoning_effort(self.shared.reasoning_effort.as_deref()) {
            config = config.with_reasoning_effort(effort);
        }
        config
    }

    /// One attempt under the full per-attempt timeout. The session is closed
    /// on every exit path.
    async fn attempt(&self, config: &SessionConfig, instruction: &str) -> Result<String, AttemptError> {
        let deadline = Instant::now() + self.agent_timeout;

        let session = match tokio::time::timeout_at(deadline, self.gateway.open(config)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(AttemptError::Session(e.to_string())),
            Err(_) => return Err(AttemptError::Timeout(self.agent_timeout)),
        };

        let outcome = match tokio::time::timeout_at(deadline, self.exchange(session.as_ref(), instruction, deadline)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AttemptError::Timeout(self.agent_timeout)),
        };

        match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Failed to close session: {}", e),
            Err(_) => debug!("Timed out closing session"),
        }

        outcome
    }

    async fn exchange(
        &self,
        session: &dyn ReviewSession,
        instruction: &str,
        deadline: Instant,
    ) -> Result<String, AttemptError> {
        let accumulator = Arc::new(ContentAccumulator::new());
        let _watch = match self.idle_timeout {
            Some(threshold) => self.watchdog.watch(&accumulator, threshold),
            None => WatchHandle::noop(),
        };

        let mut stream = session
            .send_streaming(instruction)
            .await
            .map_err(|e| AttemptError::Session(e.to_string()))?;

        let pump = async {
            let mut index = 0u64;
            while let Some(event) = stream.receiver.recv().await {
                match event {
                    StreamEvent::Delta(fragment) => {
                        accumulator.append(&fragment, index);
                        index += 1;
                    }
                    StreamEvent::Completed(text) => {
                        if accumulator.is_empty() {
                            accumulator.append(&text, index);
                        }
                        accumulator.mark_complete();
                        return;
                    }
                    StreamEvent::Error(message) => {
                        accumulator.mark_failed(message);
                        return;
                    }
                }
            }
            // Stream closed without a completion event
            accumulator.mark_complete();
        };
        tokio::pin!(pump);

        let remaining = deadline.saturating_duration_since(Instant::now());
        let result = tokio::select! {
            result = accumulator.await_result(remaining) => result,
            () = &mut pump => accumulator.await_result(Duration::ZERO).await,
        };

        match result.settlement {
            Settlement::Completed if result.content.trim().is_empty() => Err(AttemptError::EmptyContent),
            Settlement::Completed => Ok(result.content.to_string()),
            Settlement::IdleTimeout { elapsed, threshold } => {
                Err(AttemptError::IdleTimeout { elapsed, threshold })
            }
            Settlement::Failed(message) => Err(AttemptError::Session(message)),
            Settlement::WaitTimeout => Err(AttemptError::Timeout(self.agent_timeout)),
        }
    }
}
