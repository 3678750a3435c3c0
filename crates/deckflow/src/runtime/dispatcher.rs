//! Step Dispatcher
//!
//! Routes an event to every step registered for its kind, in registration order,
//! and collects the follow-up events. Step failures (errors and panics) stop at
//! this boundary: they become progress notifications and the branch is dropped.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::{
    event::{Event, EventKind},
    step::{Step, StepContext, StepError, StepOutput},
};
use crate::{DeckflowError, Result};

/// Maps event kinds to the ordered steps that accept them
#[derive(Default)]
pub struct StepRegistry {
    steps: Vec<Arc<dyn Step>>,
    routes: HashMap<EventKind, Vec<usize>>,
    terminal: Option<usize>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under every kind it accepts.
    pub fn register(&mut self, step: Arc<dyn Step>) -> Result<()> {
        if step.accepts().is_empty() {
            return Err(DeckflowError::DefinitionError(format!(
                "Step '{}' accepts no events",
                step.name()
            )));
        }
        if self.steps.iter().any(|s| s.name() == step.name()) {
            return Err(DeckflowError::DefinitionError(format!(
                "Duplicate step name '{}'",
                step.name()
            )));
        }

        let index = self.steps.len();
        if step.is_terminal() {
            if let Some(existing) = self.terminal {
                return Err(DeckflowError::DefinitionError(format!(
                    "Steps '{}' and '{}' both claim the terminal stop event",
                    self.steps[existing].name(),
                    step.name()
                )));
            }
            self.terminal = Some(index);
        }

        for kind in step.accepts() {
            let route = self.routes.entry(*kind).or_default();
            if !route.contains(&index) {
                route.push(index);
            }
        }
        self.steps.push(step);
        Ok(())
    }

    /// Steps accepting `kind`, in registration order.
    pub fn candidates(&self, kind: EventKind) -> Vec<Arc<dyn Step>> {
        self.routes
            .get(&kind)
            .map(|indices| indices.iter().map(|i| self.steps[*i].clone()).collect())
            .unwrap_or_default()
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        self.routes.get(&kind).is_some_and(|r| !r.is_empty())
    }

    pub fn terminal_step(&self) -> Option<&str> {
        self.terminal.map(|i| self.steps[i].name())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A contained step failure
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub step: String,
    pub message: String,
    pub terminal: bool,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step '{}' failed: {}", self.step, self.message)
    }
}

/// Result of dispatching one event
#[derive(Debug, Default)]
pub struct Dispatch {
    pub events: Vec<Event>,
    pub failures: Vec<StepFailure>,
}

/// Deliver `event` to every registered candidate and collect what they emit.
pub async fn dispatch(registry: &StepRegistry, ctx: &StepContext, event: Event) -> Dispatch {
    let kind = event.kind();
    let candidates = registry.candidates(kind);
    let mut outcome = Dispatch::default();

    if candidates.is_empty() {
        tracing::trace!("[DISPATCHER] No steps registered for '{}'", kind);
        return outcome;
    }

    for step in candidates {
        let result = AssertUnwindSafe(step.run(ctx, event.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(StepError::Panicked(panic_message(panic))));

        match result {
            Ok(StepOutput::Skip) => {}
            Ok(StepOutput::Emit(next)) => {
                warn_if_reentrant(step.name(), kind, &next);
                let stop = next.is_stop();
                outcome.events.push(next);
                if stop {
                    break;
                }
            }
            Ok(StepOutput::FanOut(siblings)) => {
                for next in &siblings {
                    warn_if_reentrant(step.name(), kind, next);
                }
                tracing::debug!(
                    "[DISPATCHER] Step '{}' fanned out {} events",
                    step.name(),
                    siblings.len()
                );
                let stop = siblings.iter().any(Event::is_stop);
                outcome.events.extend(siblings);
                if stop {
                    break;
                }
            }
            Err(e) => {
                let terminal = step.is_terminal();
                tracing::warn!(
                    "[DISPATCHER] Step '{}' failed in '{}': {}",
                    step.name(),
                    ctx.workflow_name(),
                    e
                );
                ctx.notify(
                    ctx.workflow_name(),
                    format!("Error in step {}: {}", step.name(), e),
                );
                outcome.failures.push(StepFailure {
                    step: step.name().to_string(),
                    message: e.to_string(),
                    terminal,
                });
                if terminal {
                    // The run still completes, just without a result
                    outcome.events.push(Event::Stop { result: None });
                    break;
                }
            }
        }
    }

    outcome
}

fn warn_if_reentrant(step: &str, trigger: EventKind, next: &Event) {
    if next.kind() == trigger {
        tracing::warn!(
            "[DISPATCHER] Step '{}' re-emitted a '{}' event; step graphs must be acyclic",
            step,
            trigger
        );
    }
}

pub(super) fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
