//! Run control from TOML (`[execution]` section)

use super::{ConfigIssue, ConfigIssueCode, Severity};
use reviewer_application::{DEFAULT_SKILL_TIMEOUT, ExecutionParams, ExecutionParamsError, ExecutionStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw execution configuration from TOML
///
/// # Example
///
/// ```toml
/// [execution]
/// parallelism = 4
/// orchestrator_timeout_minutes = 10
/// agent_timeout_minutes = 5
/// idle_timeout_minutes = 5      # 0 disables the idle watchdog
/// max_retries = 2
/// passes = 1
/// strategy = "futures"          # or "scoped"
/// skill_timeout_minutes = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    pub parallelism: usize,
    pub orchestrator_timeout_minutes: u64,
    pub agent_timeout_minutes: u64,
    pub idle_timeout_minutes: u64,
    pub max_retries: u32,
    pub passes: u32,
    pub strategy: Option<String>,
    /// Limit for one `skill` run
    pub skill_timeout_minutes: u64,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        let params = ExecutionParams::default();
        Self {
            parallelism: params.parallelism,
            orchestrator_timeout_minutes: params.orchestrator_timeout.as_secs() / 60,
            agent_timeout_minutes: params.agent_timeout.as_secs() / 60,
            idle_timeout_minutes: params.idle_timeout.map_or(0, |t| t.as_secs() / 60),
            max_retries: params.max_retries,
            passes: params.passes,
            strategy: None,
            skill_timeout_minutes: DEFAULT_SKILL_TIMEOUT.as_secs() / 60,
        }
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

impl FileExecutionConfig {
    /// Parse the strategy name, if one is configured.
    pub fn parse_strategy(&self) -> Result<Option<ExecutionStrategy>, ExecutionParamsError> {
        self.strategy.as_deref().map(str::parse).transpose()
    }

    pub fn skill_timeout(&self) -> Duration {
        minutes(self.skill_timeout_minutes)
    }

    /// Convert into validated application parameters.
    pub fn to_params(&self) -> Result<ExecutionParams, ExecutionParamsError> {
        let idle = (self.idle_timeout_minutes > 0).then(|| minutes(self.idle_timeout_minutes));
        let params = ExecutionParams::default()
            .with_parallelism(self.parallelism)
            .with_orchestrator_timeout(minutes(self.orchestrator_timeout_minutes))
            .with_agent_timeout(minutes(self.agent_timeout_minutes))
            .with_idle_timeout(idle)
            .with_max_retries(self.max_retries)
            .with_passes(self.passes)
            .with_strategy(self.parse_strategy()?.unwrap_or_default());
        params.validate()?;
        Ok(params)
    }

    pub(super) fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for (field, value) in [
            ("execution.parallelism", self.parallelism as u64),
            ("execution.passes", u64::from(self.passes)),
            ("execution.orchestrator_timeout_minutes", self.orchestrator_timeout_minutes),
            ("execution.agent_timeout_minutes", self.agent_timeout_minutes),
            ("execution.skill_timeout_minutes", self.skill_timeout_minutes),
        ] {
            if value == 0 {
                issues.push(ConfigIssue {
                    severity: Severity::Error,
                    code: ConfigIssueCode::OutOfRange {
                        field: field.to_string(),
                    },
                    message: format!("{}: must be at least 1", field),
                });
            }
        }

        if let Some(strategy) = &self.strategy {
            if strategy.parse::<ExecutionStrategy>().is_err() {
                issues.push(ConfigIssue {
                    severity: Severity::Error,
                    code: ConfigIssueCode::InvalidEnumValue {
                        field: "execution.strategy".to_string(),
                        value: strategy.clone(),
                        valid_values: vec!["futures".to_string(), "scoped".to_string()],
                    },
                    message: format!("execution.strategy: unknown value '{}'", strategy),
                });
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_execution_params() {
        let params = FileExecutionConfig::default().to_params().unwrap();
        assert_eq!(params, ExecutionParams::default());
    }

    #[test]
    fn test_minutes_are_converted() {
        let config = FileExecutionConfig {
            orchestrator_timeout_minutes: 20,
            agent_timeout_minutes: 3,
            idle_timeout_minutes: 1,
            ..Default::default()
        };
        let params = config.to_params().unwrap();
        assert_eq!(params.orchestrator_timeout, Duration::from_secs(1200));
        assert_eq!(params.agent_timeout, Duration::from_secs(180));
        assert_eq!(params.idle_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_skill_timeout() {
        assert_eq!(FileExecutionConfig::default().skill_timeout(), DEFAULT_SKILL_TIMEOUT);

        let config = FileExecutionConfig {
            skill_timeout_minutes: 0,
            ..Default::default()
        };
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0].code,
            ConfigIssueCode::OutOfRange { field } if field == "execution.skill_timeout_minutes"
        ));
    }

    #[test]
    fn test_unknown_strategy_is_reported() {
        let config = FileExecutionConfig {
            strategy: Some("threads".to_string()),
            ..Default::default()
        };
        assert!(config.to_params().is_err());
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].code, ConfigIssueCode::InvalidEnumValue { .. }));
    }
}
