//! Progress notification port
//!
//! Defines the interface for observing a review run. Every attempt outcome
//! is reported here, while only the final outcome of a task is returned.

use reviewer_domain::{AgentTask, ReviewResult};

/// Callback for progress updates during a review run
pub trait ReviewProgressNotifier: Send + Sync {
    /// Called before the first attempt of a task
    fn on_task_start(&self, _task: &AgentTask) {}

    /// Called after each failed attempt
    fn on_attempt_failed(&self, _task: &AgentTask, _attempt: u32, _max_attempts: u32, _error: &str) {}

    /// Called once per task with its final result
    fn on_task_complete(&self, _task: &AgentTask, _result: &ReviewResult) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ReviewProgressNotifier for NoProgress {}
