//! Execution parameters: review run control.
//!
//! [`ExecutionParams`] groups the static parameters that control one review
//! run: concurrency, timeouts, retries, passes and the executor strategy.
//! Supplied once per run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that switches the executor to the scoped strategy.
pub const STRUCTURED_CONCURRENCY_ENV: &str = "REVIEWER_STRUCTURED_CONCURRENCY";

/// Upper bound for closing a session after an attempt. Runs after the
/// attempt's own timeout, so every attempt may take this much longer.
pub const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How (agent, pass) tasks are fanned out.
///
/// Both strategies honor the same contract; the choice only changes how
/// stragglers are handled at the group deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Independent spawned tasks; stragglers are abandoned at the deadline.
    #[default]
    Futures,
    /// One task group; stragglers are cancelled together at the deadline.
    Scoped,
}

impl ExecutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::Futures => "futures",
            ExecutionStrategy::Scoped => "scoped",
        }
    }

    /// Strategy selected by a `true`/`1` value of the structured concurrency
    /// flag, if the flag is set at all.
    pub fn from_structured_flag(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(ExecutionStrategy::Scoped),
            "false" | "0" | "no" | "off" => Some(ExecutionStrategy::Futures),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = ExecutionParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "futures" => Ok(ExecutionStrategy::Futures),
            "scoped" | "structured" => Ok(ExecutionStrategy::Scoped),
            other => Err(ExecutionParamsError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Invalid execution parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionParamsError {
    #[error("parallelism must be at least 1")]
    ZeroParallelism,

    #[error("passes must be at least 1")]
    ZeroPasses,

    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("unknown execution strategy '{0}' (expected 'futures' or 'scoped')")]
    UnknownStrategy(String),
}

/// Review run control parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Maximum number of agent invocations holding a permit at once.
    pub parallelism: usize,
    /// Wall-clock ceiling for the whole run.
    pub orchestrator_timeout: Duration,
    /// Timeout of a single attempt (each retry gets a fresh one).
    pub agent_timeout: Duration,
    /// Inactivity threshold of the idle watchdog; `None` disables it.
    pub idle_timeout: Option<Duration>,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Independent repetitions of every agent.
    pub passes: u32,
    pub strategy: ExecutionStrategy,
    /// Grace period on top of `orchestrator_timeout` before stragglers are
    /// reported unavailable.
    pub group_timeout_slack: Duration,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            parallelism: 4,
            orchestrator_timeout: Duration::from_secs(10 * 60),
            agent_timeout: Duration::from_secs(5 * 60),
            idle_timeout: Some(Duration::from_secs(5 * 60)),
            max_retries: 2,
            passes: 1,
            strategy: ExecutionStrategy::Futures,
            group_timeout_slack: Duration::from_secs(60),
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_orchestrator_timeout(mut self, timeout: Duration) -> Self {
        self.orchestrator_timeout = timeout;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_group_timeout_slack(mut self, slack: Duration) -> Self {
        self.group_timeout_slack = slack;
        self
    }

    // ==================== Derived Values ====================

    /// Total attempts per task.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Hard ceiling of one task: every attempt at its full timeout plus
    /// the session close that follows it.
    pub fn per_task_timeout(&self) -> Duration {
        self.agent_timeout
            .saturating_add(SESSION_CLOSE_TIMEOUT)
            .saturating_mul(self.max_attempts())
    }

    /// Point after which unfinished tasks are reported unavailable.
    pub fn group_deadline(&self) -> Duration {
        self.orchestrator_timeout.saturating_add(self.group_timeout_slack)
    }

    pub fn validate(&self) -> Result<(), ExecutionParamsError> {
        if self.parallelism == 0 {
            return Err(ExecutionParamsError::ZeroParallelism);
        }
        if self.passes == 0 {
            return Err(ExecutionParamsError::ZeroPasses);
        }
        if self.orchestrator_timeout.is_zero() {
            return Err(ExecutionParamsError::ZeroTimeout("orchestrator"));
        }
        if self.agent_timeout.is_zero() {
            return Err(ExecutionParamsError::ZeroTimeout("agent"));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ExecutionParamsError::ZeroTimeout("idle"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = ExecutionParams::default();
        assert_eq!(params.parallelism, 4);
        assert_eq!(params.max_retries, 2);
        assert_eq!(params.passes, 1);
        assert_eq!(params.strategy, ExecutionStrategy::Futures);
        assert_eq!(params.idle_timeout, Some(Duration::from_secs(300)));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let params = ExecutionParams::default()
            .with_parallelism(2)
            .with_passes(3)
            .with_strategy(ExecutionStrategy::Scoped)
            .with_idle_timeout(None);

        assert_eq!(params.parallelism, 2);
        assert_eq!(params.passes, 3);
        assert_eq!(params.strategy, ExecutionStrategy::Scoped);
        assert!(params.idle_timeout.is_none());
    }

    #[test]
    fn test_derived_timeouts() {
        let params = ExecutionParams::default()
            .with_agent_timeout(Duration::from_secs(10))
            .with_max_retries(2)
            .with_orchestrator_timeout(Duration::from_secs(60))
            .with_group_timeout_slack(Duration::from_secs(5));

        assert_eq!(params.max_attempts(), 3);
        assert_eq!(params.per_task_timeout(), Duration::from_secs(60));
        assert_eq!(params.group_deadline(), Duration::from_secs(65));
    }

    #[test]
    fn test_per_task_timeout_covers_session_close() {
        let params = ExecutionParams::default()
            .with_agent_timeout(Duration::from_secs(30))
            .with_max_retries(1);

        // Two stalled attempts, each followed by the longest close
        let worst_case = (Duration::from_secs(30) + SESSION_CLOSE_TIMEOUT) * 2;
        assert_eq!(params.per_task_timeout(), worst_case);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_parallel = ExecutionParams::default().with_parallelism(0);
        assert_eq!(zero_parallel.validate(), Err(ExecutionParamsError::ZeroParallelism));

        let zero_passes = ExecutionParams::default().with_passes(0);
        assert_eq!(zero_passes.validate(), Err(ExecutionParamsError::ZeroPasses));

        let zero_idle = ExecutionParams::default().with_idle_timeout(Some(Duration::ZERO));
        assert_eq!(zero_idle.validate(), Err(ExecutionParamsError::ZeroTimeout("idle")));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("scoped".parse::<ExecutionStrategy>(), Ok(ExecutionStrategy::Scoped));
        assert_eq!(" Futures ".parse::<ExecutionStrategy>(), Ok(ExecutionStrategy::Futures));
        assert!("threads".parse::<ExecutionStrategy>().is_err());
    }

    #[test]
    fn test_structured_flag() {
        assert_eq!(
            ExecutionStrategy::from_structured_flag("TRUE"),
            Some(ExecutionStrategy::Scoped)
        );
        assert_eq!(
            ExecutionStrategy::from_structured_flag("false"),
            Some(ExecutionStrategy::Futures)
        );
        assert_eq!(ExecutionStrategy::from_structured_flag("maybe"), None);
    }
}
