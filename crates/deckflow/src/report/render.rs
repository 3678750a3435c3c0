//! Final rendering step

use std::sync::Arc;

use async_trait::async_trait;

use super::CHAT_HISTORY;
use crate::{
    agents::{run_agent, AgentFactory, AgentRole, AgentSpec},
    runtime::{Event, EventKind, Step, StepContext, StepOutput, StepResult},
};

const RENDERER_NAME: &str = "Executive Summarizer";
const RENDERER_INSTRUCTIONS: &str = "You are an expert in displaying reports. Your team will have \
    created individual content for different slides in a report. Render them together in markdown.";

/// Owns the run's final `Stop`; a failure here leaves the run without a result
pub struct RenderReportStep {
    agents: Arc<dyn AgentFactory>,
}

impl RenderReportStep {
    pub fn new(agents: Arc<dyn AgentFactory>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl Step for RenderReportStep {
    fn name(&self) -> &str {
        "render_report"
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

        let spec = AgentSpec::new(AgentRole::Summarizer, ctx.workflow_name())
            .with_name(RENDERER_NAME)
            .with_instructions(RENDERER_INSTRUCTIONS)
            .with_chat_history(ctx.data().get(&CHAT_HISTORY).await.unwrap_or_default());
        let renderer = self.agents.create(&spec)?;

        let result = run_agent(ctx, renderer.as_ref(), input, true).await?;
        tracing::info!("[REPORT] Rendered final report ({} chars)", result.content.len());
        Ok(StepOutput::Emit(Event::stop(result)))
    }
}
