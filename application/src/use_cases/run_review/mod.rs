//! Run Review use case
//!
//! Fans a set of review agents out against one target, bounded by an
//! admission controller, and consolidates the results.
//!
//! Flow: validate input → pre-compute shared read-only context (local
//! sources, MCP servers) → expand agents × passes into tasks → run them with
//! the configured [`ExecutionStrategy`](crate::config::ExecutionStrategy) →
//! merge multi-pass results per agent.

pub mod accumulator;
pub mod admission;
pub mod attempt;
pub mod context;
pub mod executor;
pub mod watchdog;

use crate::config::{ExecutionParams, ExecutionParamsError};
use crate::ports::progress::{NoProgress, ReviewProgressNotifier};
use crate::ports::session_gateway::{McpServers, SessionGateway};
use crate::ports::source_provider::{SourceCollectionError, SourceContentProvider};
use admission::AdmissionController;
use attempt::{AttemptRunner, RunShared};
use context::ReviewContext;
use executor::{TaskRunner, executor_for};
use reviewer_domain::{AgentConfig, AgentTask, DomainError, ReviewResult, ReviewTarget, merge_by_agent};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that prevent a review run from starting
#[derive(Error, Debug)]
pub enum RunReviewError {
    #[error("No agents selected for review")]
    NoAgents,

    #[error("Invalid execution parameters: {0}")]
    InvalidParams(#[from] ExecutionParamsError),

    #[error("Invalid agent: {0}")]
    InvalidAgent(#[from] DomainError),

    #[error("Failed to collect local sources: {0}")]
    SourceCollection(#[from] SourceCollectionError),

    #[error("Local target requires a source content provider")]
    MissingSourceProvider,

    #[error("Orchestrator is closed")]
    Closed,
}

/// Input for the RunReview use case
#[derive(Debug, Clone)]
pub struct RunReviewInput {
    /// Agents in insertion order
    pub agents: Vec<AgentConfig>,
    pub target: ReviewTarget,
    pub params: ExecutionParams,
}

impl RunReviewInput {
    pub fn new(agents: Vec<AgentConfig>, target: ReviewTarget) -> Self {
        Self {
            agents,
            target,
            params: ExecutionParams::default(),
        }
    }

    pub fn with_params(mut self, params: ExecutionParams) -> Self {
        self.params = params;
        self
    }
}

/// Prompt additions applied to every agent of a run
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub output_constraints: Option<String>,
    pub custom_instructions: Vec<String>,
    /// Overrides the default reasoning effort of reasoning models
    pub reasoning_effort: Option<String>,
}

/// Orchestrates review runs against a session gateway
pub struct ReviewOrchestrator<G: SessionGateway + 'static> {
    gateway: Arc<G>,
    context: Arc<ReviewContext>,
    owns_context: bool,
    source_provider: Option<Arc<dyn SourceContentProvider>>,
    mcp_servers: Option<McpServers>,
    prompt_options: PromptOptions,
    progress: Arc<dyn ReviewProgressNotifier>,
    run_token: CancellationToken,
}

impl<G: SessionGateway + 'static> ReviewOrchestrator<G> {
    /// Create an orchestrator that owns its own context.
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            context: Arc::new(ReviewContext::new()),
            owns_context: true,
            source_provider: None,
            mcp_servers: None,
            prompt_options: PromptOptions::default(),
            progress: Arc::new(NoProgress),
            run_token: CancellationToken::new(),
        }
    }

    /// Use a context shared with other orchestrators; `close()` leaves it
    /// running.
    pub fn with_shared_context(mut self, context: Arc<ReviewContext>) -> Self {
        self.context = context;
        self.owns_context = false;
        self
    }

    /// Use a dedicated context that `close()` shuts down.
    pub fn with_context(mut self, context: ReviewContext) -> Self {
        self.context = Arc::new(context);
        self.owns_context = true;
        self
    }

    pub fn with_source_provider(mut self, provider: Arc<dyn SourceContentProvider>) -> Self {
        self.source_provider = Some(provider);
        self
    }

    pub fn with_mcp_servers(mut self, servers: McpServers) -> Self {
        self.mcp_servers = Some(servers);
        self
    }

    pub fn with_prompt_options(mut self, options: PromptOptions) -> Self {
        self.prompt_options = options;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ReviewProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    /// Run every (agent, pass) and merge multi-pass results per agent.
    ///
    /// Returns one result per agent.
    pub async fn execute_reviews(&self, input: RunReviewInput) -> Result<Vec<ReviewResult>, RunReviewError> {
        let passes = input.params.passes;
        let results = self.execute_passes(input).await?;
        if passes <= 1 {
            return Ok(results);
        }

        let before = results.len();
        let merged = merge_by_agent(results);
        info!("Merged {} pass result(s) into {} agent result(s)", before, merged.len());
        Ok(merged)
    }

    /// Run every (agent, pass) without merging.
    ///
    /// Returns exactly agents × passes results, in agent-major order.
    pub async fn execute_passes(&self, input: RunReviewInput) -> Result<Vec<ReviewResult>, RunReviewError> {
        let RunReviewInput { agents, target, params } = input;

        if self.run_token.is_cancelled() {
            return Err(RunReviewError::Closed);
        }
        params.validate()?;
        if agents.is_empty() {
            return Err(RunReviewError::NoAgents);
        }
        for agent in &agents {
            agent.validate()?;
        }

        info!(
            "Starting review of {} with {} agent(s) × {} pass(es) [strategy: {}, parallelism: {}]",
            target,
            agents.len(),
            params.passes,
            params.strategy,
            params.parallelism
        );

        let shared = Arc::new(self.shared_context(target).await?);
        let agents: Vec<Arc<AgentConfig>> = agents.into_iter().map(Arc::new).collect();
        let tasks = AgentTask::expand(&agents, params.passes);

        let gateway: Arc<dyn SessionGateway> = self.gateway.clone();
        let attempts = AttemptRunner::new(
            gateway,
            Arc::clone(self.context.watchdog()),
            shared,
            Arc::clone(&self.progress),
        )
        .with_agent_timeout(params.agent_timeout)
        .with_idle_timeout(params.idle_timeout)
        .with_max_retries(params.max_retries);

        let runner = Arc::new(TaskRunner::new(
            Arc::new(AdmissionController::new(params.parallelism)),
            attempts,
            params.per_task_timeout(),
            self.run_token.child_token(),
        ));

        let executor = executor_for(params.strategy);
        let results = executor.execute(tasks, runner, params.group_deadline()).await;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            "Review finished: {}/{} task(s) succeeded",
            succeeded,
            results.len()
        );
        Ok(results)
    }

    /// Collect everything shared read-only by the tasks of one run.
    async fn shared_context(&self, target: ReviewTarget) -> Result<RunShared, RunReviewError> {
        let mut shared = RunShared::new(target);
        shared.output_constraints = self.prompt_options.output_constraints.clone();
        shared.custom_instructions = self.prompt_options.custom_instructions.clone();
        shared.reasoning_effort = self.prompt_options.reasoning_effort.clone();

        match &shared.target {
            ReviewTarget::Remote { .. } => {
                shared.mcp_servers = self.mcp_servers.clone();
                if shared.mcp_servers.is_none() {
                    warn!("No MCP servers configured; agents cannot read the remote repository");
                }
            }
            ReviewTarget::Local { directory } => {
                let provider = self
                    .source_provider
                    .clone()
                    .ok_or(RunReviewError::MissingSourceProvider)?;
                let directory = directory.clone();
                let collection = tokio::task::spawn_blocking(move || provider.collect(&directory))
                    .await
                    .map_err(|e| SourceCollectionError::Io(std::io::Error::other(e.to_string())))??;
                info!(
                    "Collected {} file(s), {} bytes of local source",
                    collection.file_count, collection.total_bytes
                );
                shared.source = Some(Arc::from(collection.instruction_content()));
            }
        }

        Ok(shared)
    }

    /// Interrupt permit waiters of running reviews and release the shared
    /// watchdog if this orchestrator owns it.
    pub async fn close(&self) {
        self.run_token.cancel();
        if self.owns_context {
            self.context.shutdown().await;
        }
        debug!("Review orchestrator closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionStrategy;
    use crate::ports::session_gateway::{
        GatewayError, McpServerConfig, ReviewSession, SessionConfig, StreamHandle,
    };
    use crate::ports::source_provider::SourceCollection;
    use async_trait::async_trait;
    use reviewer_domain::{Model, StreamEvent};
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    // ==================== Scripted Gateway ====================

    /// What one attempt of an agent does.
    #[derive(Clone)]
    enum Step {
        /// Stream fragments with a pause before each, then complete
        Stream(Vec<&'static str>, Duration),
        /// Complete immediately with this text
        Reply(&'static str),
        /// Report a session error on the stream
        StreamError(&'static str),
        /// Fail to open the session
        OpenError,
        /// Send one fragment, then go silent without closing the stream
        Stall,
        /// Panic inside the task
        Panic,
    }

    #[derive(Default)]
    struct Observed {
        attempts: HashMap<String, usize>,
        active: usize,
        max_active: usize,
        closed: usize,
        configs: Vec<SessionConfig>,
        prompts: Vec<String>,
    }

    struct ScriptedGateway {
        scripts: Mutex<HashMap<String, VecDeque<Step>>>,
        fallback: Step,
        close_delay: Duration,
        observed: Arc<Mutex<Observed>>,
    }

    impl ScriptedGateway {
        fn new(fallback: Step) -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                fallback,
                close_delay: Duration::ZERO,
                observed: Arc::new(Mutex::new(Observed::default())),
            }
        }

        fn with_close_delay(mut self, delay: Duration) -> Self {
            self.close_delay = delay;
            self
        }

        fn script(self, system_prompt_marker: &str, steps: Vec<Step>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(system_prompt_marker.to_string(), steps.into());
            self
        }

        fn attempts(&self, agent: &str) -> usize {
            self.observed.lock().unwrap().attempts.get(agent).copied().unwrap_or(0)
        }

        fn max_active(&self) -> usize {
            self.observed.lock().unwrap().max_active
        }
    }

    /// Agents are identified by their system prompt, which starts with
    /// "agent:<name>".
    fn agent_of(config: &SessionConfig) -> String {
        config
            .system_prompt
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("agent:"))
            .unwrap_or_default()
            .to_string()
    }

    #[async_trait]
    impl SessionGateway for ScriptedGateway {
        async fn open(&self, config: &SessionConfig) -> Result<Box<dyn ReviewSession>, GatewayError> {
            let agent = agent_of(config);
            let step = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&agent)
                .and_then(|steps| steps.pop_front())
                .unwrap_or_else(|| self.fallback.clone());

            {
                let mut observed = self.observed.lock().unwrap();
                *observed.attempts.entry(agent).or_default() += 1;
                observed.configs.push(config.clone());
            }

            if matches!(step, Step::OpenError) {
                return Err(GatewayError::ConnectionError("refused".into()));
            }

            Ok(Box::new(ScriptedSession {
                model: config.model.clone(),
                step,
                close_delay: self.close_delay,
                observed: Arc::clone(&self.observed),
            }))
        }
    }

    struct ScriptedSession {
        model: Model,
        step: Step,
        close_delay: Duration,
        observed: Arc<Mutex<Observed>>,
    }

    #[async_trait]
    impl ReviewSession for ScriptedSession {
        fn model(&self) -> &Model {
            &self.model
        }

        async fn send(&self, _content: &str) -> Result<String, GatewayError> {
            Err(GatewayError::Other("streaming only".into()))
        }

        async fn send_streaming(&self, content: &str) -> Result<StreamHandle, GatewayError> {
            self.observed.lock().unwrap().prompts.push(content.to_string());
            let (tx, rx) = mpsc::channel(16);
            let step = self.step.clone();
            let observed = Arc::clone(&self.observed);

            tokio::spawn(async move {
                match step {
                    Step::Stream(fragments, pause) => {
                        {
                            let mut observed = observed.lock().unwrap();
                            observed.active += 1;
                            observed.max_active = observed.max_active.max(observed.active);
                        }
                        for fragment in fragments {
                            tokio::time::sleep(pause).await;
                            let _ = tx.send(StreamEvent::Delta(fragment.to_string())).await;
                        }
                        observed.lock().unwrap().active -= 1;
                        let _ = tx.send(StreamEvent::Completed(String::new())).await;
                    }
                    Step::Reply(text) => {
                        let _ = tx.send(StreamEvent::Completed(text.to_string())).await;
                    }
                    Step::StreamError(message) => {
                        let _ = tx.send(StreamEvent::Error(message.to_string())).await;
                    }
                    Step::Stall => {
                        let _ = tx.send(StreamEvent::Delta("partial".into())).await;
                        // Keep the stream open without producing output
                        std::future::pending::<()>().await;
                    }
                    Step::OpenError => {}
                    Step::Panic => {}
                }
            });

            if matches!(self.step, Step::Panic) {
                panic!("session exploded");
            }
            Ok(StreamHandle::new(rx))
        }

        async fn close(&self) -> Result<(), GatewayError> {
            tokio::time::sleep(self.close_delay).await;
            self.observed.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    // ==================== Helpers ====================

    fn agent(name: &str) -> AgentConfig {
        AgentConfig::new(name, format!("agent:{}", name))
    }

    fn agents(names: &[&str]) -> Vec<AgentConfig> {
        names.iter().map(|name| agent(name)).collect()
    }

    fn remote() -> ReviewTarget {
        ReviewTarget::remote("octo/repo").unwrap()
    }

    fn params() -> ExecutionParams {
        ExecutionParams::default()
            .with_agent_timeout(Duration::from_secs(30))
            .with_orchestrator_timeout(Duration::from_secs(120))
            .with_group_timeout_slack(Duration::from_secs(5))
            .with_idle_timeout(Some(Duration::from_secs(10)))
    }

    fn orchestrator(gateway: ScriptedGateway) -> (ReviewOrchestrator<ScriptedGateway>, Arc<ScriptedGateway>) {
        let gateway = Arc::new(gateway);
        let orchestrator = ReviewOrchestrator::new(Arc::clone(&gateway))
            .with_context(ReviewContext::with_min_check_interval(Duration::from_millis(500)));
        (orchestrator, gateway)
    }

    const FINDING: &str = "### 1. SQL Injection\n\n| Item | Content |\n|------|---------|\n| **Priority** | High |\n| **Summary** | Query concatenation |\n| **Location** | a.go:10 |\n";

    const STRATEGIES: [ExecutionStrategy; 2] = [ExecutionStrategy::Futures, ExecutionStrategy::Scoped];

    // ==================== Concurrency Bound ====================

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_parallelism() {
        for strategy in STRATEGIES {
            let gateway = ScriptedGateway::new(Step::Stream(vec!["ok"], Duration::from_millis(100)));
            let (orchestrator, gateway) = orchestrator(gateway);

            let input = RunReviewInput::new(agents(&["a", "b", "c", "d", "e"]), remote())
                .with_params(params().with_parallelism(2).with_strategy(strategy));
            let results = orchestrator.execute_reviews(input).await.unwrap();

            assert_eq!(results.len(), 5);
            assert!(results.iter().all(|r| r.is_success()));
            assert_eq!(gateway.max_active(), 2, "strategy {}", strategy);
            orchestrator.close().await;
        }
    }

    // ==================== Retries ====================

    #[tokio::test(start_paused = true)]
    async fn test_blank_content_exhausts_retries() {
        for strategy in STRATEGIES {
            let (orchestrator, gateway) = orchestrator(ScriptedGateway::new(Step::Reply("   ")));
            let input = RunReviewInput::new(agents(&["blank"]), remote())
                .with_params(params().with_max_retries(2).with_strategy(strategy));

            let results = orchestrator.execute_reviews(input).await.unwrap();

            assert_eq!(gateway.attempts("blank"), 3);
            assert_eq!(results.len(), 1);
            assert!(!results[0].is_success());
            assert!(results[0].error_message().unwrap().contains("empty content"));
            orchestrator.close().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_last_attempt() {
        let gateway = ScriptedGateway::new(Step::Reply("unused")).script(
            "flaky",
            vec![Step::OpenError, Step::StreamError("rate limited"), Step::Reply("third time lucky")],
        );
        let (orchestrator, gateway) = orchestrator(gateway);
        let input = RunReviewInput::new(agents(&["flaky"]), remote()).with_params(params().with_max_retries(2));

        let results = orchestrator.execute_reviews(input).await.unwrap();

        assert_eq!(gateway.attempts("flaky"), 3);
        assert!(results[0].is_success());
        assert_eq!(results[0].content(), Some("third time lucky"));
        orchestrator.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retried_with_fresh_timeout() {
        let gateway = ScriptedGateway::new(Step::Reply("unused")).script(
            "slow",
            vec![
                Step::Stream(vec!["late"], Duration::from_secs(60)),
                Step::Stream(vec!["on time"], Duration::from_secs(20)),
            ],
        );
        let (orchestrator, gateway) = orchestrator(gateway);
        let input = RunReviewInput::new(agents(&["slow"]), remote())
            .with_params(params().with_idle_timeout(None).with_max_retries(1));

        let results = orchestrator.execute_reviews(input).await.unwrap();

        assert_eq!(gateway.attempts("slow"), 2);
        assert_eq!(results[0].content(), Some("on time"));
        orchestrator.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_session_close_does_not_cost_the_last_attempt() {
        for strategy in STRATEGIES {
            let gateway = ScriptedGateway::new(Step::Reply("unused"))
                .with_close_delay(Duration::from_secs(5))
                .script(
                    "sluggish",
                    vec![Step::Stall, Step::Stream(vec!["just in time"], Duration::from_secs(28))],
                );
            let (orchestrator, gateway) = orchestrator(gateway);
            let input = RunReviewInput::new(agents(&["sluggish"]), remote()).with_params(
                params()
                    .with_idle_timeout(None)
                    .with_max_retries(1)
                    .with_strategy(strategy),
            );

            let results = orchestrator.execute_reviews(input).await.unwrap();

            assert_eq!(gateway.attempts("sluggish"), 2, "strategy {}", strategy);
            assert_eq!(results[0].content(), Some("just in time"), "strategy {}", strategy);
            assert_eq!(gateway.observed.lock().unwrap().closed, 2);
            orchestrator.close().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_closed_on_every_path() {
        let gateway = ScriptedGateway::new(Step::Reply("unused")).script(
            "mixed",
            vec![Step::StreamError("boom"), Step::Stall, Step::Reply("done")],
        );
        let (orchestrator, gateway) = orchestrator(gateway);
        let input = RunReviewInput::new(agents(&["mixed"]), remote()).with_params(params().with_max_retries(2));

        let results = orchestrator.execute_reviews(input).await.unwrap();

        assert!(results[0].is_success());
        assert_eq!(gateway.observed.lock().unwrap().closed, 3);
        orchestrator.close().await;
    }

    // ==================== Idle Watchdog ====================

    #[tokio::test(start_paused = true)]
    async fn test_idle_watchdog_cuts_stalled_attempt_short() {
        let gateway = ScriptedGateway::new(Step::Stall);
        let (orchestrator, gateway) = orchestrator(gateway);
        let input = RunReviewInput::new(agents(&["stuck"]), remote()).with_params(
            params()
                .with_agent_timeout(Duration::from_secs(600))
                .with_idle_timeout(Some(Duration::from_secs(2)))
                .with_max_retries(1),
        );

        let started = tokio::time::Instant::now();
        let results = orchestrator.execute_reviews(input).await.unwrap();

        assert_eq!(gateway.attempts("stuck"), 2);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(results[0].error_message().unwrap().contains("idle"));
        orchestrator.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_watchdog_falls_back_to_attempt_timeout() {
        let context = Arc::new(ReviewContext::with_min_check_interval(Duration::from_millis(500)));
        context.shutdown().await;

        let gateway = Arc::new(ScriptedGateway::new(Step::Stall));
        let orchestrator = ReviewOrchestrator::new(Arc::clone(&gateway)).with_shared_context(Arc::clone(&context));
        let input = RunReviewInput::new(agents(&["stuck"]), remote()).with_params(
            params()
                .with_agent_timeout(Duration::from_secs(5))
                .with_idle_timeout(Some(Duration::from_secs(1)))
                .with_max_retries(0),
        );

        let results = orchestrator.execute_reviews(input).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].error_message().unwrap().contains("timed out"));
    }

    // ==================== Completeness ====================

    #[tokio::test(start_paused = true)]
    async fn test_result_count_before_and_after_merge() {
        for strategy in STRATEGIES {
            let gateway = ScriptedGateway::new(Step::Reply(FINDING)).script("broken", vec![Step::Panic; 9]);
            let (orchestrator, _gateway) = orchestrator(gateway);
            let names = ["a", "b", "broken"];

            let flat = orchestrator
                .execute_passes(
                    RunReviewInput::new(agents(&names), remote())
                        .with_params(params().with_passes(3).with_strategy(strategy)),
                )
                .await
                .unwrap();
            assert_eq!(flat.len(), 9);

            let merged = orchestrator
                .execute_reviews(
                    RunReviewInput::new(agents(&names), remote())
                        .with_params(params().with_passes(3).with_strategy(strategy)),
                )
                .await
                .unwrap();
            assert_eq!(merged.len(), 3);
            let names: Vec<&str> = merged.iter().map(|r| r.agent().name.as_str()).collect();
            assert_eq!(names, vec!["a", "b", "broken"]);
            assert!(!merged[2].is_success());
            orchestrator.close().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_pass_findings_are_merged() {
        let (orchestrator, _gateway) = orchestrator(ScriptedGateway::new(Step::Reply(FINDING)));
        let input = RunReviewInput::new(agents(&["sec"]), remote()).with_params(params().with_passes(2));

        let results = orchestrator.execute_reviews(input).await.unwrap();

        let content = results[0].content().unwrap();
        assert_eq!(content.matches("SQL Injection").count(), 1);
        assert!(content.contains("> Detected in passes: 1, 2"));
        orchestrator.close().await;
    }

    // ==================== Group Deadline ====================

    #[tokio::test(start_paused = true)]
    async fn test_group_deadline_reports_stragglers() {
        for strategy in STRATEGIES {
            let gateway = ScriptedGateway::new(Step::Reply("fast review"))
                .script("slow", vec![Step::Stream(vec!["never"], Duration::from_secs(3600))]);
            let (orchestrator, _gateway) = orchestrator(gateway);
            let input = RunReviewInput::new(agents(&["fast", "slow"]), remote()).with_params(
                params()
                    .with_idle_timeout(None)
                    .with_agent_timeout(Duration::from_secs(7200))
                    .with_max_retries(0)
                    .with_orchestrator_timeout(Duration::from_secs(60))
                    .with_group_timeout_slack(Duration::from_secs(60))
                    .with_strategy(strategy),
            );

            let results = orchestrator.execute_reviews(input).await.unwrap();

            assert_eq!(results.len(), 2);
            assert!(results[0].is_success());
            let message = results[1].error_message().unwrap();
            match strategy {
                ExecutionStrategy::Futures => assert!(message.contains("timed out or failed")),
                ExecutionStrategy::Scoped => assert!(message.contains("cancelled after 2 minutes")),
            }
            orchestrator.close().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_waiters_interrupted_at_deadline_are_not_retried() {
        let gateway = ScriptedGateway::new(Step::Stream(vec!["slow"], Duration::from_secs(3600)));
        let (orchestrator, gateway) = orchestrator(gateway);
        let input = RunReviewInput::new(agents(&["holder", "waiter"]), remote()).with_params(
            params()
                .with_parallelism(1)
                .with_idle_timeout(None)
                .with_agent_timeout(Duration::from_secs(7200))
                .with_orchestrator_timeout(Duration::from_secs(60))
                .with_strategy(ExecutionStrategy::Futures),
        );

        let results = orchestrator.execute_passes(input).await.unwrap();
        // Let the abandoned waiter observe the cancelled run token
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_success()));
        assert_eq!(gateway.attempts("waiter"), 0);
        orchestrator.close().await;
    }

    // ==================== Session Configuration ====================

    #[tokio::test(start_paused = true)]
    async fn test_mcp_servers_only_attached_to_remote_targets() {
        struct StaticProvider;

        impl SourceContentProvider for StaticProvider {
            fn collect(&self, _directory: &Path) -> Result<SourceCollection, SourceCollectionError> {
                Ok(SourceCollection {
                    review_content: "### main.rs\n```rust\nfn main() {}\n```".into(),
                    directory_summary: "Files: 1".into(),
                    file_count: 1,
                    total_bytes: 12,
                })
            }
        }

        let servers: McpServers = Arc::new(BTreeMap::from([(
            "github".to_string(),
            McpServerConfig {
                server_type: "http".into(),
                url: "https://api.githubcopilot.com/mcp/".into(),
                tools: vec!["*".into()],
                headers: BTreeMap::new(),
            },
        )]));
        let gateway = Arc::new(ScriptedGateway::new(Step::Reply("review")));
        let orchestrator = ReviewOrchestrator::new(Arc::clone(&gateway))
            .with_mcp_servers(servers)
            .with_source_provider(Arc::new(StaticProvider));

        let remote_input = RunReviewInput::new(agents(&["a"]), remote()).with_params(params());
        orchestrator.execute_reviews(remote_input).await.unwrap();
        let local_input = RunReviewInput::new(agents(&["a"]), ReviewTarget::local("/work/svc")).with_params(params());
        orchestrator.execute_reviews(local_input).await.unwrap();

        let observed = gateway.observed.lock().unwrap();
        assert!(observed.configs[0].mcp_servers.is_some());
        assert!(observed.configs[1].mcp_servers.is_none());
        assert!(observed.prompts[1].contains("fn main() {}"));
        drop(observed);
        orchestrator.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasoning_effort_only_for_reasoning_models() {
        let (orchestrator, gateway) = orchestrator(ScriptedGateway::new(Step::Reply("review")));
        let opus = agent("deep").with_model(Model::ClaudeOpus46);
        let input = RunReviewInput::new(vec![agent("plain"), opus], remote())
            .with_params(params().with_parallelism(1));

        orchestrator.execute_reviews(input).await.unwrap();

        let observed = gateway.observed.lock().unwrap();
        let effort: HashMap<String, Option<String>> = observed
            .configs
            .iter()
            .map(|c| (agent_of(c), c.reasoning_effort.clone()))
            .collect();
        assert_eq!(effort["plain"], None);
        assert_eq!(effort["deep"], Some("high".to_string()));
        drop(observed);
        orchestrator.close().await;
    }

    // ==================== Validation & Teardown ====================

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let (orchestrator, _gateway) = orchestrator(ScriptedGateway::new(Step::Reply("x")));

        let empty = RunReviewInput::new(Vec::new(), remote());
        assert!(matches!(orchestrator.execute_reviews(empty).await, Err(RunReviewError::NoAgents)));

        let zero = RunReviewInput::new(agents(&["a"]), remote()).with_params(params().with_parallelism(0));
        assert!(matches!(
            orchestrator.execute_reviews(zero).await,
            Err(RunReviewError::InvalidParams(ExecutionParamsError::ZeroParallelism))
        ));

        let local = RunReviewInput::new(agents(&["a"]), ReviewTarget::local("/tmp"));
        assert!(matches!(
            orchestrator.execute_reviews(local).await,
            Err(RunReviewError::MissingSourceProvider)
        ));
        orchestrator.close().await;
    }

    #[tokio::test]
    async fn test_closed_orchestrator_rejects_runs() {
        let (orchestrator, _gateway) = orchestrator(ScriptedGateway::new(Step::Reply("x")));
        orchestrator.close().await;
        let input = RunReviewInput::new(agents(&["a"]), remote());
        assert!(matches!(orchestrator.execute_reviews(input).await, Err(RunReviewError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_sees_every_attempt() {
        #[derive(Default)]
        struct Recorder {
            started: AtomicUsize,
            failed_attempts: AtomicUsize,
            completed: AtomicUsize,
        }

        impl ReviewProgressNotifier for Recorder {
            fn on_task_start(&self, _task: &AgentTask) {
                self.started.fetch_add(1, Ordering::SeqCst);
            }

            fn on_attempt_failed(&self, _task: &AgentTask, _attempt: u32, _max: u32, _error: &str) {
                self.failed_attempts.fetch_add(1, Ordering::SeqCst);
            }

            fn on_task_complete(&self, _task: &AgentTask, _result: &ReviewResult) {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let recorder = Arc::new(Recorder::default());
        let gateway = ScriptedGateway::new(Step::Reply("fine")).script("flaky", vec![Step::Reply(""), Step::Reply("ok")]);
        let (orchestrator, _gateway) = orchestrator(gateway);
        let orchestrator = orchestrator.with_progress(recorder.clone());

        let input = RunReviewInput::new(agents(&["flaky", "steady"]), remote()).with_params(params());
        orchestrator.execute_reviews(input).await.unwrap();

        assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.failed_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
        orchestrator.close().await;
    }
}
