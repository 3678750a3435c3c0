//! Workflow runs
//!
//! A run drives one workflow definition to completion on a single task: pending
//! dispatches sit in a `FuturesUnordered`, so fan-out siblings interleave at
//! their await points without extra threads. The run owns its Context and the
//! emitting side of its progress stream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    context::Context,
    dispatcher::{dispatch, Dispatch, StepFailure},
    event::Event,
    progress::{progress_channel, ProgressEmitter, ProgressNotification, ProgressStream},
    step::StepContext,
    workflow::Workflow,
};
use crate::agents::AgentRunResult;

/// Fatal run failures, distinct from an absent result
#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error("Workflow '{workflow}' timed out after {timeout:?}")]
    Timeout { workflow: String, timeout: Duration },

    #[error("Run aborted: {0}")]
    Aborted(String),
}

/// What a finished run produced
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Result carried by the stop event, if any
    pub result: Option<AgentRunResult>,
    /// Whether a stop event was reached at all
    pub stopped: bool,
    /// Step failures contained during the run
    pub failures: Vec<StepFailure>,
    pub duration_ms: u64,
}

/// One execution of a workflow
pub struct Run {
    id: Uuid,
    workflow: Arc<Workflow>,
    context: Context,
    progress: ProgressEmitter,
    timeout: Duration,
}

impl Run {
    /// Create a run and the progress stream its caller will consume.
    pub fn new(workflow: Arc<Workflow>) -> (Self, ProgressStream) {
        let (progress, stream) = progress_channel();
        let timeout = workflow.timeout();
        let run = Self {
            id: Uuid::new_v4(),
            workflow,
            context: Context::new(),
            progress,
            timeout,
        };
        (run, stream)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn workflow_name(&self) -> &str {
        self.workflow.name()
    }

    /// Drive the run until its terminal event, its idle point, or its timeout.
    ///
    /// Dropping the returned future abandons every in-flight step and nested run.
    pub async fn execute(self, input: impl Into<String>) -> Result<RunOutcome, RunError> {
        let input = input.into();
        tracing::info!(
            "[RUN] Starting '{}' ({}) with timeout {:?}",
            self.workflow.name(),
            self.id,
            self.timeout
        );

        match tokio::time::timeout(self.timeout, self.drive(input)).await {
            Ok(outcome) => {
                tracing::info!(
                    "[RUN] '{}' ({}) finished in {}ms (result: {}, failures: {})",
                    self.workflow.name(),
                    self.id,
                    outcome.duration_ms,
                    outcome.result.is_some(),
                    outcome.failures.len()
                );
                Ok(outcome)
            }
            Err(_) => {
                tracing::error!(
                    "[RUN] '{}' ({}) timed out after {:?}",
                    self.workflow.name(),
                    self.id,
                    self.timeout
                );
                self.progress.emit(
                    ProgressNotification::new(
                        self.workflow.name(),
                        format!("Timed out after {}s", self.timeout.as_secs_f64()),
                    )
                    .with_workflow(self.workflow.name()),
                );
                Err(RunError::Timeout {
                    workflow: self.workflow.name().to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }

    async fn drive(&self, input: String) -> RunOutcome {
        let started = Instant::now();
        let step_ctx = StepContext::new(
            self.id,
            self.workflow.name(),
            self.context.clone(),
            self.progress.clone(),
        );

        let mut pending = FuturesUnordered::new();
        pending.push(dispatch_owned(
            self.workflow.clone(),
            step_ctx.clone(),
            Event::start(input),
        ));

        let mut outcome = RunOutcome::default();
        while let Some(dispatched) = pending.next().await {
            outcome.failures.extend(dispatched.failures);

            for event in dispatched.events {
                match event {
                    Event::Stop { result } => {
                        if outcome.stopped {
                            tracing::warn!(
                                "[RUN] '{}' produced an extra stop event, ignoring",
                                self.workflow.name()
                            );
                        } else {
                            outcome.stopped = true;
                            outcome.result = result;
                        }
                    }
                    next if outcome.stopped => {
                        tracing::debug!(
                            "[RUN] Discarding '{}' event emitted after stop",
                            next.kind()
                        );
                    }
                    next => pending.push(dispatch_owned(
                        self.workflow.clone(),
                        step_ctx.clone(),
                        next,
                    )),
                }
            }
        }

        if !outcome.stopped {
            tracing::warn!(
                "[RUN] '{}' went idle without a stop event",
                self.workflow.name()
            );
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }
}

async fn dispatch_owned(workflow: Arc<Workflow>, ctx: StepContext, event: Event) -> Dispatch {
    dispatch(workflow.registry(), &ctx, event).await
}

/// Caller-side handle to a spawned run
pub struct RunHandle {
    id: Uuid,
    workflow_name: String,
    stream: Option<ProgressStream>,
    task: JoinHandle<Result<RunOutcome, RunError>>,
}

impl RunHandle {
    /// Spawn `run` on the tokio runtime.
    pub fn spawn(run: Run, stream: ProgressStream, input: impl Into<String>) -> Self {
        let id = run.id();
        let workflow_name = run.workflow_name().to_string();
        let task = tokio::spawn(run.execute(input.into()));
        Self {
            id,
            workflow_name,
            stream: Some(stream),
            task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Take the progress stream. Only the first call returns it.
    pub fn stream(&mut self) -> Option<ProgressStream> {
        self.stream.take()
    }

    /// Wait for the final value. `Ok(None)` means the run ended without a result.
    pub async fn result(self) -> Result<Option<AgentRunResult>, RunError> {
        self.outcome().await.map(|outcome| outcome.result)
    }

    pub async fn outcome(self) -> Result<RunOutcome, RunError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(RunError::Aborted(e.to_string())),
        }
    }

    /// Abandon the run; in-flight collaborator calls are orphaned.
    pub fn abort(&self) {
        self.task.abort();
    }
}
