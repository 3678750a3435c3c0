//! Query generation and initial batch research

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    Section, CHAT_HISTORY, INITIAL_RESEARCH, MANAGER_TAG, REPORT_WORKFLOW_NAME, SLIDES_GUARD, TASK,
};
use crate::{
    agents::{ChatMessage, CompletionModel, Retriever},
    runtime::{
        fan_out, Event, EventKind, ProgressNotification, Step, StepContext, StepError, StepOutput,
        StepResult,
    },
};

pub struct GenerateQueriesStep {
    llm: Arc<dyn CompletionModel>,
}

impl GenerateQueriesStep {
    pub fn new(llm: Arc<dyn CompletionModel>) -> Self {
        Self { llm }
    }
}

fn queries_prompt(topic: &str) -> String {
    format!(
        "You are a research planning expert. Given a research topic, generate 3-5 broad, comprehensive queries \
         that will help gather initial information for a market research report covering:\n\
         - Market size and forecasts\n\
         - Growth drivers and trends\n\
         - Risks and challenges\n\
         - M&A and consolidation\n\
         - Competitive dynamics\n\
         - Key player profiles\n\n\
         Research Topic: {}\n\n\
         Format your response as a list of queries only, one per line.",
        topic
    )
}

/// One query per non-empty line
pub fn parse_queries(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Step for GenerateQueriesStep {
    fn name(&self) -> &str {
        "generate_queries"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::GenerateQueries]
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::GenerateQueries { input } = event else {
            return Ok(StepOutput::Skip);
        };

        let output = self.llm.complete(&queries_prompt(&input)).await?;
        let queries = parse_queries(&output);
        tracing::info!("[REPORT] Generated {} initial research queries", queries.len());

        ctx.emit(
            ProgressNotification::new(
                REPORT_WORKFLOW_NAME,
                format!("Generated initial research queries:\n{}", queries.join("\n")),
            )
            .with_workflow(MANAGER_TAG),
        );

        Ok(StepOutput::Emit(Event::InitialResearch { queries }))
    }
}

/// Runs every query against the index, then fans out the section siblings
pub struct InitialResearchStep {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    sections: Vec<Section>,
}

impl InitialResearchStep {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize, sections: Vec<Section>) -> Self {
        Self {
            retriever,
            top_k,
            sections,
        }
    }
}

#[async_trait]
impl Step for InitialResearchStep {
    fn name(&self) -> &str {
        "conduct_initial_research"
    }

    fn accepts(&self) -> &[EventKind] {
        &[EventKind::InitialResearch]
    }

    async fn run(&self, ctx: &StepContext, event: Event) -> StepResult {
        let Event::InitialResearch { queries } = event else {
            return Ok(StepOutput::Skip);
        };

        let mut summaries = Vec::with_capacity(queries.len());
        for query in &queries {
            ctx.emit(
                ProgressNotification::new(
                    REPORT_WORKFLOW_NAME,
                    format!("Running initial research query: {}", query),
                )
                .with_workflow("Initial Research"),
            );

            let documents = self.retriever.retrieve(query, self.top_k).await?;
            tracing::debug!("[REPORT] '{}' returned {} documents", query, documents.len());
            summaries.push(
                documents
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }

        let combined = summaries.join("\n\n");
        ctx.data().set(&INITIAL_RESEARCH, combined.clone()).await;
        ctx.data()
            .update(&CHAT_HISTORY, |history| {
                history.push(ChatMessage::assistant(format!(
                    "Initial Research Results:\n{}",
                    combined
                )))
            })
            .await;

        ctx.emit(
            ProgressNotification::new(
                REPORT_WORKFLOW_NAME,
                "Completed initial research, starting slide generation",
            )
            .with_workflow(MANAGER_TAG),
        );

        let task = ctx
            .data()
            .get(&TASK)
            .await
            .ok_or_else(|| StepError::Failed("task missing from context".to_string()))?;

        let siblings = self
            .sections
            .iter()
            .map(|section| Event::SlideGeneration {
                slide_type: *section,
                input: task.clone(),
            })
            .collect();

        Ok(fan_out(ctx.data(), SLIDES_GUARD, siblings).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queries_drops_blank_lines() {
        let queries = parse_queries("  EV market size 2024 \n\n EV battery supply chain risks\n   \n");
        assert_eq!(
            queries,
            vec!["EV market size 2024", "EV battery supply chain risks"]
        );
    }
}
