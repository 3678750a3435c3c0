//! Post-production: executive summary and front page over the combined report

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    build_section_workflow, render_prompt, PostProductionKind, CHAT_HISTORY, COMBINED_REPORT,
    INITIAL_RESEARCH, POST_PRODUCTION_GUARD,
};
use crate::{
    agents::AgentFactory,
    runtime::{
        build_and_run_sub_workflow, Event, EventKind, FanIn, FanInStatus, Step, StepContext,
        StepOutput, StepResult,
    },
};

pub struct PostProductionStep {
    kind: PostProductionKind,
    name: String,
    agents: Arc<dyn AgentFactory>,
    timeout: Duration,
}

impl PostProductionStep {
    pub fn new(kind: PostProductionKind, agents: Arc<dyn AgentFactory>, timeout: Duration) -> Self {
        Self {
            kind,
            name: format!("post_production_{}", kind.as_str()),
            agents,
            timeout,
        }
    }
}

#[async_trait]
impl Step for PostProductionStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::PostProduction]
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::PostProduction { kind, input } = event else {
            return Ok(StepOutput::Skip);
        };
        if kind != self.kind {
            return Ok(StepOutput::Skip);
        }

        let label = self.kind.display_name();
        let chat_history = ctx.data().get(&CHAT_HISTORY).await.unwrap_or_default();
        let build = || {
            build_section_workflow(
                self.kind.brief(),
                self.agents.as_ref(),
                chat_history,
                false,
                self.timeout,
            )
        };
        let result = build_and_run_sub_workflow(ctx, build, input, label).await;

        ctx.data().set(&self.kind.result_key(), result).await;
        FanIn::new(POST_PRODUCTION_GUARD).complete(ctx.data()).await;
        Ok(StepOutput::Emit(Event::CombinePostProduction))
    }
}

pub struct CombinePostProductionStep {
    fan_in: FanIn,
}

impl CombinePostProductionStep {
    pub fn new() -> Self {
        Self {
            fan_in: FanIn::new(POST_PRODUCTION_GUARD),
        }
    }
}

impl Default for CombinePostProductionStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for CombinePostProductionStep {
    fn name(&self) -> &str {
        "combine_post_production"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::CombinePostProduction]
    }

    async fn run(&self, ctx: &StepContext, _event: Event) -> StepResult {
        if !matches!(self.fan_in.poll(ctx.data()).await, FanInStatus::Ready { .. }) {
            return Ok(StepOutput::Skip);
        }

        let mut parts = Vec::new();
        for kind in [PostProductionKind::FrontPage, PostProductionKind::ExecutiveSummary] {
            if let Some(result) = ctx.data().get(&kind.result_key()).await {
                parts.push(format!("# {}\n{}", kind.display_name(), result.content));
            }
        }
        parts.push(ctx.data().get(&COMBINED_REPORT).await.unwrap_or_default());

        let initial_research = ctx.data().get(&INITIAL_RESEARCH).await.unwrap_or_default();
        Ok(StepOutput::Emit(Event::Report {
            input: render_prompt(&parts.join("\n\n"), &initial_research),
        }))
    }
}
