//! Per-section slide generation and the combine join

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    build_section_workflow, render_prompt, PostProductionKind, Section, CHAT_HISTORY,
    COMBINED_REPORT, INITIAL_RESEARCH, MANAGER_TAG, POST_PRODUCTION_GUARD, REPORT_WORKFLOW_NAME,
    SLIDES_GUARD,
};
use crate::{
    agents::AgentFactory,
    runtime::{
        build_and_run_sub_workflow, fan_out, Event, EventKind, FanIn, FanInStatus,
        ProgressNotification, Step, StepContext, StepOutput, StepResult,
    },
};

/// Generates one section through its own sub-workflow.
///
/// Registered once per section; every sibling sees every `SlideGeneration` event
/// and skips the ones meant for other sections.
pub struct SlideStep {
    section: Section,
    name: String,
    agents: Arc<dyn AgentFactory>,
    timeout: Duration,
}

impl SlideStep {
    pub fn new(section: Section, agents: Arc<dyn AgentFactory>, timeout: Duration) -> Self {
        Self {
            section,
            name: format!("generate_{}", section.as_str()),
            agents,
            timeout,
        }
    }
}

#[async_trait]
impl Step for SlideStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::SlideGeneration]
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::SlideGeneration { slide_type, input } = event else {
            return Ok(StepOutput::Skip);
        };
        if slide_type != self.section {
            return Ok(StepOutput::Skip);
        }

        let label = self.section.display_name();
        let chat_history = ctx.data().get(&CHAT_HISTORY).await.unwrap_or_default();
        let build = || {
            build_section_workflow(
                self.section.brief(),
                self.agents.as_ref(),
                chat_history,
                false,
                self.timeout,
            )
        };
        let result = build_and_run_sub_workflow(ctx, build, input, label).await;

        ctx.data().set(&self.section.result_key(), result).await;
        let completed = FanIn::new(SLIDES_GUARD).complete(ctx.data()).await;
        tracing::info!("[REPORT] Section '{}' done ({} completed)", label, completed);

        Ok(StepOutput::Emit(Event::CombineReport))
    }
}

/// Join over every section; proceeds once, after the last sibling reports
pub struct CombineReportStep {
    sections: Vec<Section>,
    post_production: bool,
    fan_in: FanIn,
}

impl CombineReportStep {
    pub fn new(sections: Vec<Section>, post_production: bool) -> Self {
        Self {
            sections,
            post_production,
            fan_in: FanIn::new(SLIDES_GUARD),
        }
    }

    async fn combined_report(&self, ctx: &StepContext) -> String {
        let mut parts = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            let content = ctx
                .data()
                .get(&section.result_key())
                .await
                .map(|result| result.content)
                .unwrap_or_else(|| "No content was generated for this section.".to_string());
            parts.push(format!("## {}:\n{}\n", section.display_name(), content));
        }
        parts.join("\n---\n\n")
    }
}

#[async_trait]
impl Step for CombineReportStep {
    fn name(&self) -> &str {
        "combine_report"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::CombineReport]
    }

    async fn run(&self, ctx: &StepContext, _event: Event) -> StepResult {
        match self.fan_in.poll(ctx.data()).await {
            FanInStatus::Waiting {
                completed,
                required,
            } => {
                ctx.emit(
                    ProgressNotification::new(
                        REPORT_WORKFLOW_NAME,
                        format!("Collected {} slides out of {}", completed, required),
                    )
                    .with_workflow(MANAGER_TAG),
                );
                return Ok(StepOutput::Skip);
            }
            FanInStatus::Released => return Ok(StepOutput::Skip),
            FanInStatus::Ready { completed } => {
                tracing::info!("[REPORT] All {} sections collected, combining", completed);
            }
        }

        let combined = self.combined_report(ctx).await;
        ctx.data().set(&COMBINED_REPORT, combined.clone()).await;

        if self.post_production {
            ctx.emit(
                ProgressNotification::new(
                    REPORT_WORKFLOW_NAME,
                    "Combined all slides, starting post-production",
                )
                .with_workflow(MANAGER_TAG),
            );
            let siblings = PostProductionKind::all()
                .iter()
                .map(|kind| Event::PostProduction {
                    kind: *kind,
                    input: combined.clone(),
                })
                .collect();
            return Ok(fan_out(ctx.data(), POST_PRODUCTION_GUARD, siblings).await);
        }

        let initial_research = ctx.data().get(&INITIAL_RESEARCH).await.unwrap_or_default();
        Ok(StepOutput::Emit(Event::Report {
            input: render_prompt(&combined, &initial_research),
        }))
    }
}
