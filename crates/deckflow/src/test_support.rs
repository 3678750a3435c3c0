//! Scripted collaborators for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    agents::{
        Agent, AgentFactory, AgentRole, AgentRun, AgentRunResult, AgentSpec, CompletionModel,
        Document, Retriever,
    },
    report::Collaborators,
    runtime::ProgressNotification,
};

/// Returns "[{name}] {input}" after one progress notification
pub struct EchoAgent {
    name: String,
    delay: Option<Duration>,
}

impl EchoAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Agent for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: String, _streaming: bool) -> AgentRun {
        let name = self.name.clone();
        let delay = self.delay;
        let events = futures::stream::iter(vec![ProgressNotification::new(
            name.clone(),
            "working",
        )]);
        AgentRun::new(events, async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(AgentRunResult::new(format!("[{}] {}", name, input)))
        })
    }
}

pub struct FailingAgent {
    name: String,
    message: String,
}

impl Agent for FailingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, _input: String, _streaming: bool) -> AgentRun {
        AgentRun::ready(Err(anyhow::anyhow!(self.message.clone())))
    }
}

/// Builds echo agents, or failing ones for configured (label, role) pairs
#[derive(Default)]
pub struct ScriptedAgents {
    failures: HashMap<(String, AgentRole), String>,
    delays: HashMap<String, Duration>,
    panics: HashSet<String>,
    created: AtomicUsize,
    specs: Mutex<Vec<String>>,
}

impl ScriptedAgents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, label: &str, role: AgentRole, message: &str) -> Self {
        self.failures
            .insert((label.to_string(), role), message.to_string());
        self
    }

    /// Every agent built for `label` sleeps for `delay` before answering
    pub fn delayed(mut self, label: &str, delay: Duration) -> Self {
        self.delays.insert(label.to_string(), delay);
        self
    }

    /// `create` panics for any agent of `label`
    pub fn panicking(mut self, label: &str) -> Self {
        self.panics.insert(label.to_string());
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn created_names(&self) -> Vec<String> {
        self.specs.lock().unwrap().clone()
    }
}

impl AgentFactory for ScriptedAgents {
    fn create(&self, spec: &AgentSpec) -> anyhow::Result<Arc<dyn Agent>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().unwrap().push(spec.name.clone());

        if self.panics.contains(&spec.workflow_label) {
            panic!("agent factory crashed building {}", spec.name);
        }

        match self.failures.get(&(spec.workflow_label.clone(), spec.role)) {
            Some(message) => Ok(Arc::new(FailingAgent {
                name: spec.name.clone(),
                message: message.clone(),
            })),
            None => {
                let agent = EchoAgent::new(spec.name.clone());
                match self.delays.get(&spec.workflow_label) {
                    Some(delay) => Ok(Arc::new(agent.with_delay(*delay))),
                    None => Ok(Arc::new(agent)),
                }
            }
        }
    }
}

/// Answers the decision prompt with a fixed string and anything else with queries
pub struct ScriptedLlm {
    decision: String,
    queries: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(decision: &str) -> Self {
        Self {
            decision: decision.to_string(),
            queries: vec![
                "electric vehicle market size".to_string(),
                "electric vehicle industry risks".to_string(),
            ],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("'follow_up'") {
            Ok(self.decision.clone())
        } else {
            Ok(format!("\n{}\n\n", self.queries.join("\n")))
        }
    }
}

pub struct StaticRetriever;

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str, _top_k: usize) -> anyhow::Result<Vec<Document>> {
        Ok(vec![Document::new(
            format!("doc-{}", query.len()),
            format!("Findings about {}", query),
        )])
    }
}

pub fn collaborators(llm: Arc<ScriptedLlm>, agents: Arc<ScriptedAgents>) -> Collaborators {
    Collaborators::new(llm, agents).with_retriever(Arc::new(StaticRetriever))
}
