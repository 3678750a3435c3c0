//! # Deckflow - Report Generation Orchestrator
//!
//! Event-driven runtime that coordinates LLM agents to research a topic, write
//! independent report sections in parallel and merge them into one document.
//!
//! - [`runtime`]: events, steps, dispatcher, fan-out/fan-in, sub-workflows, progress stream
//! - [`agents`]: collaborator traits (agents, completion model, retriever)
//! - [`report`]: the report and section workflow definitions
//! - [`service`]: the run invocation surface
//! - [`settings`]: layered configuration

pub mod agents;
pub mod report;
pub mod runtime;
pub mod service;
pub mod settings;

#[cfg(test)]
mod test_support;

pub use agents::{
    run_agent, Agent, AgentFactory, AgentRole, AgentRun, AgentRunResult, AgentSpec, ChatMessage,
    CompletionModel, Document, MessageRole, Retriever,
};
pub use report::{Collaborators, PostProductionKind, Section};
pub use runtime::{
    fan_out, progress_channel, run_sub_workflow, Context, ContextKey, Event, EventKind, FanIn,
    FanInStatus, ProgressEmitter, ProgressNotification, ProgressStream, Run, RunError, RunHandle,
    RunOutcome, Step, StepContext, StepError, StepOutput, StepRegistry, Workflow, WorkflowBuilder,
};
pub use service::{Deckflow, RunOptions, WorkflowSelection};
pub use settings::DeckflowConfig;

use tracing_subscriber::{prelude::*, EnvFilter};

/// Main error types for Deckflow operations
#[derive(Debug, thiserror::Error)]
pub enum DeckflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Workflow definition error: {0}")]
    DefinitionError(String),

    #[error("Settings error: {0}")]
    SettingsError(#[from] ::config::ConfigError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),
}

pub type Result<T> = std::result::Result<T, DeckflowError>;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this more than once is harmless.
pub fn init_tracing(config: &DeckflowConfig) -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    let filter_string = format!("warn,deckflow={level}", level = log_level);
    let env_filter = EnvFilter::try_new(filter_string)
        .map_err(|e| DeckflowError::ConfigError(format!("Invalid tracing filter: {}", e)))?;

    if tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_tolerates_existing_subscriber() {
        let config = DeckflowConfig {
            log_level: "debug".to_string(),
            ..DeckflowConfig::default()
        };
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&DeckflowConfig::default()).is_ok());
    }
}
