//! Step trait and the handle steps receive while running

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    context::Context,
    event::{Event, EventKind},
    progress::{ProgressEmitter, ProgressNotification},
};

/// What a step hands back to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Not applicable to this event instance; nothing becomes pending
    Skip,
    /// A single follow-up event
    Emit(Event),
    /// Sibling events dispatched concurrently
    FanOut(Vec<Event>),
}

/// Failure raised by a step
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),

    #[error("step panicked: {0}")]
    Panicked(String),
}

pub type StepResult = std::result::Result<StepOutput, StepError>;

/// Everything a step may touch: the run's Context and its progress stream
#[derive(Debug, Clone)]
pub struct StepContext {
    run_id: Uuid,
    workflow_name: Arc<str>,
    data: Context,
    progress: ProgressEmitter,
}

impl StepContext {
    pub fn new(
        run_id: Uuid,
        workflow_name: impl Into<Arc<str>>,
        data: Context,
        progress: ProgressEmitter,
    ) -> Self {
        Self {
            run_id,
            workflow_name: workflow_name.into(),
            data,
            progress,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn data(&self) -> &Context {
        &self.data
    }

    pub fn progress(&self) -> &ProgressEmitter {
        &self.progress
    }

    pub fn emit(&self, notification: ProgressNotification) {
        self.progress.emit(notification);
    }

    /// Emit a notification originating from `name`.
    pub fn notify(&self, name: &str, msg: impl Into<String>) {
        self.progress.emit(ProgressNotification::new(name, msg));
    }
}

/// A named handler bound to one or more event kinds.
///
/// Collaborators a step depends on (agents, models, retrievers) are owned by the
/// step value itself and injected when the workflow is defined.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Event kinds this step is registered for
    fn accepts(&self) -> &[EventKind];

    /// The step that owns the run's final `Stop` event
    fn is_terminal(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult;
}
