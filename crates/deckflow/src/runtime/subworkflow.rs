//! Sub-workflow Runner
//!
//! Runs a nested workflow with its own Context, relays its progress to the parent
//! stream under a label and turns every failure into a degraded result.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};

use super::{
    dispatcher::panic_message,
    progress::ProgressNotification,
    run::Run,
    step::StepContext,
    workflow::Workflow,
};
use crate::agents::AgentRunResult;

/// Execute `workflow` as an independent run and return its result.
///
/// Never fails: a failed step, a missing result or a timeout all come back as a
/// degraded [`AgentRunResult`] mentioning `label`.
pub async fn run_sub_workflow(
    parent: &StepContext,
    workflow: Arc<Workflow>,
    input: impl Into<String>,
    label: &str,
) -> AgentRunResult {
    let (run, mut stream) = Run::new(workflow);
    tracing::info!(
        "[SUB_WORKFLOW] Starting '{}' as '{}' (run {}) inside '{}'",
        run.workflow_name(),
        label,
        run.id(),
        parent.workflow_name()
    );

    let forward = async {
        while let Some(notification) = stream.next().await {
            parent.emit(notification.tagged(label));
        }
    };

    // The stream ends once the run has dropped its emitters, so both sides finish
    let (outcome, ()) = tokio::join!(run.execute(input.into()), forward);

    match outcome {
        Ok(outcome) => match outcome.result {
            Some(result) => {
                tracing::debug!("[SUB_WORKFLOW] '{}' completed", label);
                result
            }
            None => {
                let reason = outcome
                    .failures
                    .last()
                    .map(|failure| failure.message.clone())
                    .unwrap_or_else(|| "the workflow produced no result".to_string());
                degraded_result(parent, label, &reason)
            }
        },
        Err(e) => degraded_result(parent, label, &e.to_string()),
    }
}

/// Build a nested workflow with `build` and run it under `label`.
///
/// A build error or a panic in either phase becomes a degraded result, so the
/// caller always gets a value to record.
pub async fn build_and_run_sub_workflow<F>(
    parent: &StepContext,
    build: F,
    input: impl Into<String>,
    label: &str,
) -> AgentRunResult
where
    F: FnOnce() -> crate::Result<Workflow>,
{
    let workflow = match std::panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(Ok(workflow)) => workflow,
        Ok(Err(e)) => return degraded_result(parent, label, &e.to_string()),
        Err(panic) => return degraded_result(parent, label, &panic_message(panic)),
    };

    let run = AssertUnwindSafe(run_sub_workflow(parent, Arc::new(workflow), input, label));
    match run.catch_unwind().await {
        Ok(result) => result,
        Err(panic) => degraded_result(parent, label, &panic_message(panic)),
    }
}

/// Report a failure under `label` and build its placeholder result.
pub fn degraded_result(parent: &StepContext, label: &str, reason: &str) -> AgentRunResult {
    tracing::warn!("[SUB_WORKFLOW] '{}' failed: {}", label, reason);
    let msg = format!("Error in {}: {}", label, reason);
    parent.emit(ProgressNotification::new(parent.workflow_name(), msg).tagged(label));
    AgentRunResult::degraded(format!(
        "Failed to complete {} due to an error: {}",
        label, reason
    ))
}
