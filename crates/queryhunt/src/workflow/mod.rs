use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::WorkflowConfig;
use crate::llm::{GenerativeClient, collect_stream};
use crate::models::{
    NamespaceId, Narrative, RawModelOutput, SchemaDescription, StatementBatch, output_json_schema,
};
use crate::prompts::{correction_prompt, dataset_prompt, story_prompt};
use crate::storage::StorageGateway;
use crate::validate::{ValidationOutcome, validate_output};

/// Bounded self-correction counter for one run. `0 <= retries <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    retries: u32,
    max: u32,
}

impl RetryState {
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { retries: 0, max }
    }

    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.retries >= self.max
    }

    /// Consumes one unit of budget. Returns `false` and leaves the counter untouched once exhausted.
    pub fn try_advance(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.retries += 1;
        true
    }
}

/// Per-run state threaded through every step.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub namespace: NamespaceId,
    pub narrative: Narrative,
    pub retry: RetryState,
}

impl RunContext {
    #[must_use]
    pub fn new(namespace: NamespaceId, max_retries: u32) -> Self {
        Self {
            namespace,
            narrative: Narrative::default(),
            retry: RetryState::new(max_retries),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Transport(String),
    RetriesExhausted { retries: u32 },
    Timeout { seconds: u64 },
}

impl FailureReason {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Timeout { .. } => "timeout",
        }
    }
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => {
                write!(f, "something went wrong, try again ({message})")
            }
            Self::RetriesExhausted { .. } => f.write_str("max retries reached"),
            Self::Timeout { seconds } => write!(f, "run timed out after {seconds}s"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowResult {
    Success {
        narrative: Narrative,
        executed_batch: StatementBatch,
    },
    Failure {
        reason: FailureReason,
    },
}

impl WorkflowResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn failure(reason: FailureReason) -> Self {
        Self::Failure { reason }
    }
}

/// One state per transition edge; each carries exactly what its handler needs.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    GeneratingStory,
    GeneratingDataset,
    Validating { candidate: RawModelOutput },
    Executing { batch: StatementBatch },
    SelfCorrecting { error: String, offending: RawModelOutput },
    Terminal(WorkflowResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateName {
    GeneratingStory,
    GeneratingDataset,
    Validating,
    Executing,
    SelfCorrecting,
    Success,
    Failure,
}

impl StateName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GeneratingStory => "generating_story",
            Self::GeneratingDataset => "generating_dataset",
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::SelfCorrecting => "self_correcting",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl Display for StateName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkflowState {
    #[must_use]
    pub fn name(&self) -> StateName {
        match self {
            Self::GeneratingStory => StateName::GeneratingStory,
            Self::GeneratingDataset => StateName::GeneratingDataset,
            Self::Validating { .. } => StateName::Validating,
            Self::Executing { .. } => StateName::Executing,
            Self::SelfCorrecting { .. } => StateName::SelfCorrecting,
            Self::Terminal(WorkflowResult::Success { .. }) => StateName::Success,
            Self::Terminal(WorkflowResult::Failure { .. }) => StateName::Failure,
        }
    }
}

/// Receives progress from a run. Both hooks default to no-ops.
pub trait WorkflowObserver: Send + Sync {
    fn on_narrative_fragment(&self, _fragment: &str) {}

    fn on_transition(&self, _from: StateName, _to: StateName) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

pub struct MysteryWorkflow {
    client: Arc<dyn GenerativeClient>,
    storage: Arc<dyn StorageGateway>,
    schema: SchemaDescription,
    config: WorkflowConfig,
}

impl MysteryWorkflow {
    #[must_use]
    pub fn new(
        client: Arc<dyn GenerativeClient>,
        storage: Arc<dyn StorageGateway>,
        schema: SchemaDescription,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            client,
            storage,
            schema,
            config,
        }
    }

    pub async fn run(&self, namespace: &NamespaceId) -> WorkflowResult {
        self.run_with_observer(namespace, &NoopObserver).await
    }

    /// Drives one run to a terminal result under the configured overall deadline.
    ///
    /// The namespace must already exist. On timeout it is left as is for the caller.
    pub async fn run_with_observer(
        &self,
        namespace: &NamespaceId,
        observer: &dyn WorkflowObserver,
    ) -> WorkflowResult {
        let deadline = self.config.run_timeout;
        info!(namespace = %namespace, max_retries = self.config.max_retries, "workflow run started");

        match tokio::time::timeout(deadline, self.drive(namespace, observer)).await {
            Ok(result) => result,
            Err(_) => {
                error!(namespace = %namespace, seconds = deadline.as_secs(), "workflow run timed out");
                WorkflowResult::failure(FailureReason::Timeout {
                    seconds: deadline.as_secs(),
                })
            }
        }
    }

    async fn drive(&self, namespace: &NamespaceId, observer: &dyn WorkflowObserver) -> WorkflowResult {
        let mut context = RunContext::new(namespace.clone(), self.config.max_retries);
        let mut state = WorkflowState::GeneratingStory;

        loop {
            let from = state.name();
            let next = match state {
                WorkflowState::GeneratingStory => self.generate_story(&mut context, observer).await,
                WorkflowState::GeneratingDataset => self.generate_dataset(&context).await,
                WorkflowState::Validating { candidate } => Self::validate(candidate),
                WorkflowState::Executing { batch } => self.execute(&context, batch).await,
                WorkflowState::SelfCorrecting { error, offending } => {
                    self.self_correct(&mut context, &error, &offending).await
                }
                WorkflowState::Terminal(result) => {
                    log_terminal(&context, &result);
                    return result;
                }
            };

            let to = next.name();
            debug!(
                namespace = %context.namespace,
                from = %from,
                to = %to,
                retries = context.retry.retries(),
                "workflow transition"
            );
            observer.on_transition(from, to);
            state = next;
        }
    }

    async fn generate_story(
        &self,
        context: &mut RunContext,
        observer: &dyn WorkflowObserver,
    ) -> WorkflowState {
        let prompt = story_prompt(self.schema.as_str());
        let stream = match self.client.stream_complete(&prompt).await {
            Ok(stream) => stream,
            Err(error) => return transport_failure(error),
        };

        let narrative = &mut context.narrative;
        let collected = collect_stream(stream, |fragment| {
            narrative.append(fragment);
            observer.on_narrative_fragment(fragment);
        })
        .await;

        match collected {
            Ok(_) => WorkflowState::GeneratingDataset,
            Err(error) => transport_failure(error),
        }
    }

    async fn generate_dataset(&self, context: &RunContext) -> WorkflowState {
        let output_schema = output_json_schema().to_string();
        let prompt = dataset_prompt(
            self.schema.as_str(),
            &output_schema,
            context.narrative.as_str(),
        );

        match self.client.complete(&prompt).await {
            Ok(text) => WorkflowState::Validating {
                candidate: RawModelOutput::Text(text),
            },
            Err(error) => transport_failure(error),
        }
    }

    fn validate(candidate: RawModelOutput) -> WorkflowState {
        match validate_output(candidate) {
            ValidationOutcome::Valid(batch) => WorkflowState::Executing { batch },
            ValidationOutcome::Invalid { issue, output } => WorkflowState::SelfCorrecting {
                error: issue.to_string(),
                offending: output,
            },
        }
    }

    async fn execute(&self, context: &RunContext, batch: StatementBatch) -> WorkflowState {
        match self
            .storage
            .execute_in_namespace(&context.namespace, &batch)
            .await
        {
            Ok(()) => WorkflowState::Terminal(WorkflowResult::Success {
                narrative: context.narrative.clone(),
                executed_batch: batch,
            }),
            Err(error) => WorkflowState::SelfCorrecting {
                error: error.to_string(),
                offending: batch.to_raw_output(),
            },
        }
    }

    async fn self_correct(
        &self,
        context: &mut RunContext,
        error: &str,
        offending: &RawModelOutput,
    ) -> WorkflowState {
        if !context.retry.try_advance() {
            if let Err(reset_error) = self.storage.reset_tables(&context.namespace).await {
                warn!(
                    namespace = %context.namespace,
                    error = %reset_error,
                    "namespace reset after exhausted retries failed"
                );
            }
            return WorkflowState::Terminal(WorkflowResult::failure(
                FailureReason::RetriesExhausted {
                    retries: context.retry.retries(),
                },
            ));
        }

        warn!(
            namespace = %context.namespace,
            retries = context.retry.retries(),
            max_retries = context.retry.max(),
            error,
            "requesting self-correction"
        );
        let prompt = correction_prompt(&offending.to_string(), self.schema.as_str(), error);
        match self.client.complete(&prompt).await {
            Ok(text) => WorkflowState::Validating {
                candidate: RawModelOutput::Text(text),
            },
            Err(error) => transport_failure(error),
        }
    }
}

fn transport_failure(error: impl Display) -> WorkflowState {
    WorkflowState::Terminal(WorkflowResult::failure(FailureReason::Transport(
        error.to_string(),
    )))
}

fn log_terminal(context: &RunContext, result: &WorkflowResult) {
    match result {
        WorkflowResult::Success { executed_batch, .. } => info!(
            namespace = %context.namespace,
            statements = executed_batch.len(),
            retries = context.retry.retries(),
            "workflow run succeeded"
        ),
        WorkflowResult::Failure { reason } => error!(
            namespace = %context.namespace,
            retries = context.retry.retries(),
            reason = %reason,
            "workflow run failed"
        ),
    }
}

/// Caller-facing entry point: runs one workflow to completion against an existing namespace.
pub async fn run_workflow(
    client: Arc<dyn GenerativeClient>,
    storage: Arc<dyn StorageGateway>,
    schema: SchemaDescription,
    namespace: &NamespaceId,
    config: WorkflowConfig,
) -> WorkflowResult {
    MysteryWorkflow::new(client, storage, schema, config)
        .run(namespace)
        .await
}
