//! Fan-out / Fan-in Coordinator
//!
//! Fan-out records how many siblings were sent under a guard name; every
//! sibling bumps the guard counter when done (also when degraded) and emits a
//! combine event. The combine step polls a [`FanIn`] and proceeds only on the
//! single poll that releases the guard.

use super::{context::Context, event::Event, step::StepOutput};

/// Schedule `events` as concurrent siblings joined later under `guard`.
pub async fn fan_out(ctx: &Context, guard: &str, events: Vec<Event>) -> StepOutput {
    tracing::info!("[FAN_OUT] Sending {} sibling events under '{}'", events.len(), guard);
    ctx.expect_completions(guard, events.len()).await;
    StepOutput::FanOut(events)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanInStatus {
    /// Not every sibling has reported yet
    Waiting { completed: usize, required: usize },
    /// This poll released the guard; proceed
    Ready { completed: usize },
    /// An earlier poll already proceeded
    Released,
}

/// Join point for siblings sharing a guard counter
#[derive(Debug, Clone)]
pub struct FanIn {
    guard: String,
    required: Option<usize>,
}

impl FanIn {
    /// Wait for as many completions as were fanned out under `guard`.
    pub fn new(guard: impl Into<String>) -> Self {
        Self {
            guard: guard.into(),
            required: None,
        }
    }

    /// Wait for a fixed number of completions regardless of the fan-out size.
    pub fn with_required(guard: impl Into<String>, required: usize) -> Self {
        Self {
            guard: guard.into(),
            required: Some(required),
        }
    }

    pub fn guard(&self) -> &str {
        &self.guard
    }

    /// Record one sibling completion; returns the updated count.
    pub async fn complete(&self, ctx: &Context) -> usize {
        ctx.increment(&self.guard).await
    }

    pub async fn poll(&self, ctx: &Context) -> FanInStatus {
        let required = match self.required {
            Some(required) => required,
            None => match ctx.expected_completions(&self.guard).await {
                Some(required) => required,
                None => {
                    tracing::warn!(
                        "[FAN_IN] Guard '{}' polled before any fan-out was recorded",
                        self.guard
                    );
                    return FanInStatus::Waiting {
                        completed: ctx.counter(&self.guard).await,
                        required: 0,
                    };
                }
            },
        };

        if let Some(completed) = ctx.try_release(&self.guard, required).await {
            return FanInStatus::Ready { completed };
        }
        if ctx.is_released(&self.guard).await {
            return FanInStatus::Released;
        }
        FanInStatus::Waiting {
            completed: ctx.counter(&self.guard).await,
            required,
        }
    }
}
