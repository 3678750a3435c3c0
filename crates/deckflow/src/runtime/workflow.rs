//! Workflow definitions
//!
//! A workflow is a named, immutable step registry plus its default timeout.
//! Routing is resolved once here, never per dispatch.

use std::sync::Arc;
use std::time::Duration;

use super::{
    dispatcher::StepRegistry,
    event::EventKind,
    step::Step,
};
use crate::{DeckflowError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(360);

pub struct Workflow {
    name: String,
    registry: StepRegistry,
    timeout: Duration,
}

impl Workflow {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("steps", &self.registry.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`Workflow`]
pub struct WorkflowBuilder {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    timeout: Duration,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn step<S: Step + 'static>(self, step: S) -> Self {
        self.step_arc(Arc::new(step))
    }

    pub fn step_arc(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Workflow> {
        let mut registry = StepRegistry::new();
        for step in self.steps {
            registry.register(step)?;
        }

        if !registry.accepts(EventKind::Start) {
            return Err(DeckflowError::DefinitionError(format!(
                "Workflow '{}' has no step accepting the start event",
                self.name
            )));
        }

        tracing::debug!(
            "[WORKFLOW] Built '{}' with {} steps (terminal: {})",
            self.name,
            registry.len(),
            registry.terminal_step().unwrap_or("none")
        );

        Ok(Workflow {
            name: self.name,
            registry,
            timeout: self.timeout,
        })
    }
}
