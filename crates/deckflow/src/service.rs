//! Run invocation surface

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    agents::ChatMessage,
    report::{build_report_workflow, build_section_workflow, Collaborators, Section},
    runtime::{Run, RunHandle},
    settings::DeckflowConfig,
    Result,
};

/// Which workflow definition a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "section", rename_all = "snake_case")]
pub enum WorkflowSelection {
    /// Full multi-section report
    #[default]
    Report,
    /// A single section sub-workflow run on its own
    Section(Section),
}

impl WorkflowSelection {
    pub fn default_timeout(&self, config: &DeckflowConfig) -> Duration {
        match self {
            WorkflowSelection::Report => config.full_report_timeout(),
            WorkflowSelection::Section(_) => config.single_section_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub workflow: WorkflowSelection,
    /// Overrides the selection's default timeout
    pub timeout: Option<Duration>,
    pub chat_history: Vec<ChatMessage>,
}

impl RunOptions {
    pub fn section(section: Section) -> Self {
        Self {
            workflow: WorkflowSelection::Section(section),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_chat_history(mut self, chat_history: Vec<ChatMessage>) -> Self {
        self.chat_history = chat_history;
        self
    }
}

/// Entry point for starting report runs
pub struct Deckflow {
    config: DeckflowConfig,
    collaborators: Collaborators,
}

impl Deckflow {
    pub fn new(config: DeckflowConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &DeckflowConfig {
        &self.config
    }

    /// Build the selected workflow and spawn a run for `input`.
    ///
    /// Missing collaborators fail here, before anything is dispatched. Must be
    /// called from within a tokio runtime.
    pub fn start(&self, input: impl Into<String>, options: RunOptions) -> Result<RunHandle> {
        let timeout = options
            .timeout
            .unwrap_or_else(|| options.workflow.default_timeout(&self.config));

        let workflow = match options.workflow {
            WorkflowSelection::Report => {
                build_report_workflow(&self.config, &self.collaborators, options.chat_history)?
            }
            WorkflowSelection::Section(section) => build_section_workflow(
                section.brief(),
                self.collaborators.agents.as_ref(),
                options.chat_history,
                true,
                timeout,
            )?,
        };

        let (run, stream) = Run::new(Arc::new(workflow));
        let run = run.with_timeout(timeout);
        tracing::info!(
            "[DECKFLOW] Starting run {} of '{}' (timeout {:?})",
            run.id(),
            run.workflow_name(),
            timeout
        );
        Ok(RunHandle::spawn(run, stream, input))
    }
}
