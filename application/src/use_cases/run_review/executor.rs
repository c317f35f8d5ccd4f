//! Task group executors.
//!
//! Both strategies fan out one task per (agent, pass), impose the group
//! deadline and return exactly one [`ReviewResult`] per task. They share the
//! same per-task wrapper ([`TaskRunner`]) and differ only in how stragglers
//! are treated once the deadline passes:
//!
//! - [`FuturesExecutor`] abandons them (their late result is ignored)
//! - [`ScopedExecutor`] cancels the whole group and reports them unavailable

use super::admission::{AdmissionController, AdmissionError};
use super::attempt::{AttemptError, AttemptRunner};
use crate::config::ExecutionStrategy;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use reviewer_domain::{AgentTask, ReviewResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Terminal classification of one task at the group boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
    Unavailable,
}

#[derive(Debug, Default)]
struct OutcomeCounts {
    success: usize,
    failed: usize,
    unavailable: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success => self.success += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Unavailable => self.unavailable += 1,
        }
    }
}

fn classify(result: &ReviewResult) -> TaskOutcome {
    if result.is_success() {
        TaskOutcome::Success
    } else {
        TaskOutcome::Failed
    }
}

/// Human-readable duration for user-facing messages.
pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        format!("{}s", secs)
    }
}

/// Per-task wrapper shared by both strategies: permit, hard timeout and
/// conversion of every failure into a result.
pub struct TaskRunner {
    admission: Arc<AdmissionController>,
    attempts: AttemptRunner,
    per_task_timeout: Duration,
    cancel: CancellationToken,
}

impl TaskRunner {
    pub fn new(
        admission: Arc<AdmissionController>,
        attempts: AttemptRunner,
        per_task_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            admission,
            attempts,
            per_task_timeout,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn failure(&self, task: &AgentTask, message: impl Into<String>) -> ReviewResult {
        self.attempts.failure(task, message)
    }

    pub async fn run(self: Arc<Self>, task: AgentTask) -> ReviewResult {
        let progress = Arc::clone(self.attempts.progress());
        progress.on_task_start(&task);

        let result = match self.admission.acquire(&self.cancel).await {
            Ok(permit) => {
                let result = match tokio::time::timeout(self.per_task_timeout, self.attempts.run(&task)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("{}: exceeded the task limit of {}", task, format_duration(self.per_task_timeout));
                        self.failure(&task, AttemptError::Timeout(self.per_task_timeout).to_string())
                    }
                };
                drop(permit);
                result
            }
            Err(AdmissionError::Interrupted) => {
                info!("{}: interrupted while waiting for a permit", task);
                self.failure(&task, AttemptError::Interrupted.to_string())
            }
            Err(e @ AdmissionError::Closed) => self.failure(&task, e.to_string()),
        };

        progress.on_task_complete(&task, &result);
        result
    }
}

/// Fan-out / fan-in strategy.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn strategy(&self) -> ExecutionStrategy;

    /// Run every task; the returned list has one result per task, in task
    /// order.
    async fn execute(
        &self,
        tasks: Vec<AgentTask>,
        runner: Arc<TaskRunner>,
        group_deadline: Duration,
    ) -> Vec<ReviewResult>;
}

pub fn executor_for(strategy: ExecutionStrategy) -> Box<dyn TaskExecutor> {
    match strategy {
        ExecutionStrategy::Futures => Box::new(FuturesExecutor),
        ExecutionStrategy::Scoped => Box::new(ScopedExecutor),
    }
}

/// Independent spawned tasks awaited jointly under the group deadline.
pub struct FuturesExecutor;

#[async_trait]
impl TaskExecutor for FuturesExecutor {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Futures
    }

    async fn execute(
        &self,
        tasks: Vec<AgentTask>,
        runner: Arc<TaskRunner>,
        group_deadline: Duration,
    ) -> Vec<ReviewResult> {
        let deadline = Instant::now() + group_deadline;
        let mut slots: Vec<Option<ReviewResult>> = tasks.iter().map(|_| None).collect();

        let mut pending: FuturesUnordered<_> = tasks
            .iter()
            .enumerate()
            .map(|(slot, task)| {
                let handle = tokio::spawn(Arc::clone(&runner).run(task.clone()));
                async move { (slot, handle.await) }
            })
            .collect();

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((slot, Ok(result)))) => slots[slot] = Some(result),
                Ok(Some((slot, Err(e)))) => {
                    let task = &tasks[slot];
                    warn!("{}: task failed: {}", task, e);
                    slots[slot] = Some(runner.failure(
                        task,
                        format!("Review timed out or failed (pass {}): {}", task.pass(), e),
                    ));
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Review run exceeded {}; abandoning {} unfinished task(s)",
                        format_duration(group_deadline),
                        pending.len()
                    );
                    break;
                }
            }
        }

        // Dropping the join handles detaches stragglers; stop the ones still
        // waiting for a permit.
        drop(pending);
        runner.cancel_token().cancel();

        let mut counts = OutcomeCounts::default();
        let results: Vec<ReviewResult> = slots
            .into_iter()
            .zip(&tasks)
            .map(|(slot, task)| match slot {
                Some(result) => {
                    counts.record(classify(&result));
                    result
                }
                None => {
                    counts.record(TaskOutcome::Unavailable);
                    runner.failure(
                        task,
                        format!(
                            "Review timed out or failed (pass {}): no result within {}",
                            task.pass(),
                            format_duration(group_deadline)
                        ),
                    )
                }
            })
            .collect();

        info!(
            "Futures execution finished: {} succeeded, {} failed, {} abandoned",
            counts.success, counts.failed, counts.unavailable
        );
        results
    }
}

/// One task group with joint cancellation at the group deadline.
pub struct ScopedExecutor;

#[async_trait]
impl TaskExecutor for ScopedExecutor {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Scoped
    }

    async fn execute(
        &self,
        tasks: Vec<AgentTask>,
        runner: Arc<TaskRunner>,
        group_deadline: Duration,
    ) -> Vec<ReviewResult> {
        let deadline = Instant::now() + group_deadline;
        let mut slots: Vec<Option<(ReviewResult, TaskOutcome)>> = tasks.iter().map(|_| None).collect();
        let mut slot_of = HashMap::with_capacity(tasks.len());

        let mut join_set = JoinSet::new();
        for (slot, task) in tasks.iter().enumerate() {
            let handle = join_set.spawn(Arc::clone(&runner).run(task.clone()));
            slot_of.insert(handle.id(), slot);
        }

        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next_with_id()).await {
                Ok(Some(Ok((id, result)))) => {
                    if let Some(&slot) = slot_of.get(&id) {
                        let outcome = classify(&result);
                        slots[slot] = Some((result, outcome));
                    }
                }
                Ok(Some(Err(e))) => {
                    if let Some(&slot) = slot_of.get(&e.id()) {
                        let task = &tasks[slot];
                        warn!("{}: task failed: {}", task, e);
                        let failure =
                            runner.failure(task, format!("Review failed (pass {}): {}", task.pass(), e));
                        slots[slot] = Some((failure, TaskOutcome::Failed));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Review run exceeded {}; cancelling {} unfinished task(s)",
                        format_duration(group_deadline),
                        join_set.len()
                    );
                    runner.cancel_token().cancel();
                    join_set.shutdown().await;
                    break;
                }
            }
        }

        let mut counts = OutcomeCounts::default();
        let results: Vec<ReviewResult> = slots
            .into_iter()
            .zip(&tasks)
            .map(|(slot, task)| {
                let (result, outcome) = slot.unwrap_or_else(|| {
                    let message = format!(
                        "Review cancelled after {} (pass {})",
                        format_duration(group_deadline),
                        task.pass()
                    );
                    (runner.failure(task, message), TaskOutcome::Unavailable)
                });
                counts.record(outcome);
                result
            })
            .collect();

        info!(
            "Scoped execution finished: {} succeeded, {} failed, {} unavailable",
            counts.success, counts.failed, counts.unavailable
        );
        results
    }
}
