//! Section sub-workflow: researcher, then analyst, then reporter

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{SectionBrief, RESEARCH_RESULTS, STREAMING, TASK};
use crate::{
    agents::{run_agent, Agent, AgentFactory, AgentRole, AgentSpec, ChatMessage},
    runtime::{Event, EventKind, Step, StepContext, StepError, StepOutput, StepResult, Workflow},
    DeckflowError, Result,
};

/// Build the three-agent workflow for one section or post-production pass.
///
/// Agents are created up front; a factory failure is a definition error.
pub fn build_section_workflow(
    brief: SectionBrief,
    agents: &dyn AgentFactory,
    chat_history: Vec<ChatMessage>,
    streaming: bool,
    timeout: Duration,
) -> Result<Workflow> {
    let create = |role: AgentRole, instructions: &str| {
        let spec = AgentSpec::new(role, brief.label)
            .with_instructions(instructions)
            .with_chat_history(chat_history.clone());
        agents.create(&spec).map_err(|e| {
            DeckflowError::DefinitionError(format!("Failed to create {}: {}", spec.name, e))
        })
    };

    let researcher = create(AgentRole::Researcher, brief.researcher)?;
    let analyst = create(AgentRole::Analyst, brief.analyst)?;
    let reporter = create(AgentRole::Reporter, brief.reporter)?;

    Workflow::builder(brief.label)
        .timeout(timeout)
        .step(SectionStartStep { streaming })
        .step(ResearchStep { researcher })
        .step(AnalyzeStep { analyst })
        .step(SectionReportStep { reporter })
        .build()
}

struct SectionStartStep {
    streaming: bool,
}

#[async_trait]
impl Step for SectionStartStep {
    fn name(&self) -> &str {
        "start"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::Start]
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::Start { input } = event else {
            return Ok(StepOutput::Skip);
        };

        ctx.data().set(&STREAMING, self.streaming).await;
        ctx.data().set(&TASK, input.clone()).await;
        Ok(StepOutput::Emit(Event::Research {
            input: format!("Research for this task: {}", input),
        }))
    }
}

struct ResearchStep {
    researcher: Arc<dyn Agent>,
}

#[async_trait]
impl Step for ResearchStep {
    fn name(&self) -> &str {
        "research"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::Research]
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::Research { input } = event else {
            return Ok(StepOutput::Skip);
        };

        let result = run_agent(ctx, self.researcher.as_ref(), input, false).await?;
        ctx.notify(
            self.researcher.name(),
            format!("Completed research: {}", result.content),
        );
        ctx.data()
            .set(&RESEARCH_RESULTS, result.content.clone())
            .await;

        Ok(StepOutput::Emit(Event::Analyze {
            input: format!(
                "You have been given search results from a private knowledge base. \
                 Come up with new insights from the search results and create visualizations, \
                 charts, relationships and graphs.\n\nHere are the search results:\n{}",
                result.content
            ),
        }))
    }
}

struct AnalyzeStep {
    analyst: Arc<dyn Agent>,
}

#[async_trait]
impl Step for AnalyzeStep {
    fn name(&self) -> &str {
        "analyze"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::Analyze]
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::Analyze { input } = event else {
            return Ok(StepOutput::Skip);
        };

        let result = run_agent(ctx, self.analyst.as_ref(), input, false).await?;
        ctx.notify(
            self.analyst.name(),
            format!("Completed analysis: {}", result.content),
        );

        let research = ctx
            .data()
            .get(&RESEARCH_RESULTS)
            .await
            .ok_or_else(|| StepError::Failed("research results missing from context".to_string()))?;
        let task = ctx.data().get(&TASK).await.unwrap_or_default();

        Ok(StepOutput::Emit(Event::Report {
            input: format!(
                "You have been given search results from a private knowledge base and further \
                 insights from an analyst on the data, now present it in a report.\n\n\
                 Here are the initial search results:\n{}\n\n\
                 Here are the further insights:\n{}\n\n\
                 Now create a report for the user's request: {}",
                research, result.content, task
            ),
        }))
    }
}

struct SectionReportStep {
    reporter: Arc<dyn Agent>,
}

#[async_trait]
impl Step for SectionReportStep {
    fn name(&self) -> &str {
        "report"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::Report]
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::Report { input } = event else {
            return Ok(StepOutput::Skip);
        };

        let streaming = ctx.data().get(&STREAMING).await.unwrap_or(false);
        let result = run_agent(ctx, self.reporter.as_ref(), input, streaming)
            .await
            .map_err(|e| {
                ctx.notify(self.reporter.name(), format!("Error creating a report: {}", e));
                e
            })?;

        Ok(StepOutput::Emit(Event::stop(result)))
    }
}
