//! Collaborator traits: agents, completion model and retriever
//!
//! The orchestration core only sees these interfaces. Concrete agents (prompt
//! text, model clients, indexes) are supplied by the embedding application.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{future::BoxFuture, stream::BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::runtime::{ProgressNotification, StepContext};

/// Final value produced by an agent or a (sub-)workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Placeholder standing in for a failed branch
    #[serde(default)]
    pub degraded: bool,
}

impl AgentRunResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
            degraded: false,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            sources: Vec::new(),
            degraded: true,
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

impl std::fmt::Display for AgentRunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// An in-flight agent invocation: progress events, then exactly one result
pub struct AgentRun {
    pub events: BoxStream<'static, ProgressNotification>,
    pub result: BoxFuture<'static, anyhow::Result<AgentRunResult>>,
}

impl AgentRun {
    pub fn new<S, F>(events: S, result: F) -> Self
    where
        S: Stream<Item = ProgressNotification> + Send + 'static,
        F: std::future::Future<Output = anyhow::Result<AgentRunResult>> + Send + 'static,
    {
        Self {
            events: events.boxed(),
            result: Box::pin(result),
        }
    }

    /// An invocation with no intermediate progress
    pub fn ready(result: anyhow::Result<AgentRunResult>) -> Self {
        Self::new(futures::stream::empty(), futures::future::ready(result))
    }
}

pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, input: String, streaming: bool) -> AgentRun;
}

/// Invoke `agent`, relaying its progress to the run stream while awaiting the result.
pub async fn run_agent(
    ctx: &StepContext,
    agent: &dyn Agent,
    input: impl Into<String>,
    streaming: bool,
) -> anyhow::Result<AgentRunResult> {
    let AgentRun { mut events, result } = agent.run(input.into(), streaming);
    tracing::debug!("[AGENT] Running '{}' (streaming: {})", agent.name(), streaming);

    let forward = async {
        while let Some(notification) = events.next().await {
            ctx.emit(notification);
        }
    };

    let ((), result) = futures::join!(forward, result);
    result
}

/// Free-form completion call
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// A retrieved document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.text.trim())
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> anyhow::Result<Vec<Document>>;
}

/// Role of a message in the chat history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// What an agent is asked to do within a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Researcher,
    Analyst,
    Reporter,
    Summarizer,
}

impl AgentRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Researcher => "Researcher",
            AgentRole::Analyst => "Analyst",
            AgentRole::Reporter => "Reporter",
            AgentRole::Summarizer => "Summarizer",
        }
    }
}

/// Everything an [`AgentFactory`] needs to build one agent
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: AgentRole,
    pub name: String,
    /// Label of the workflow the agent works for (section or post-production kind)
    pub workflow_label: String,
    /// Role-specific focus for this workflow
    pub instructions: Option<String>,
    pub chat_history: Vec<ChatMessage>,
}

impl AgentSpec {
    pub fn new(role: AgentRole, workflow_label: impl Into<String>) -> Self {
        let workflow_label = workflow_label.into();
        Self {
            role,
            name: format!("{} {}", workflow_label, role.display_name()),
            workflow_label,
            instructions: None,
            chat_history: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_chat_history(mut self, chat_history: Vec<ChatMessage>) -> Self {
        self.chat_history = chat_history;
        self
    }
}

pub trait AgentFactory: Send + Sync {
    fn create(&self, spec: &AgentSpec) -> anyhow::Result<Arc<dyn Agent>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{progress_channel, Context};
    use uuid::Uuid;

    struct TwoStepAgent;

    impl Agent for TwoStepAgent {
        fn name(&self) -> &str {
            "Two Step"
        }

        fn run(&self, input: String, _streaming: bool) -> AgentRun {
            let events = futures::stream::iter(vec![
                ProgressNotification::new("Two Step", "thinking"),
                ProgressNotification::new("Two Step", "writing"),
            ]);
            AgentRun::new(events, async move { Ok(AgentRunResult::new(input)) })
        }
    }

    #[tokio::test]
    async fn test_run_agent_forwards_events_and_returns_result() {
        let (emitter, stream) = progress_channel();
        let ctx = StepContext::new(Uuid::new_v4(), "test", Context::new(), emitter);

        let result = run_agent(&ctx, &TwoStepAgent, "hello", true).await.unwrap();
        assert_eq!(result, AgentRunResult::new("hello"));

        drop(ctx);
        let messages: Vec<String> = stream.map(|n| n.msg).collect().await;
        assert_eq!(messages, vec!["thinking", "writing"]);
    }

    #[test]
    fn test_agent_spec_default_name() {
        let spec = AgentSpec::new(AgentRole::Researcher, "Market Size");
        assert_eq!(spec.name, "Market Size Researcher");
    }
}
