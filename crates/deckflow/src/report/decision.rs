//! Entry step: new research or follow-up answer

use std::sync::Arc;

use async_trait::async_trait;

use super::{CHAT_HISTORY, MANAGER_TAG, REPORT_WORKFLOW_NAME, TASK};
use crate::{
    agents::{AgentRunResult, ChatMessage, CompletionModel},
    runtime::{Event, EventKind, ProgressNotification, Step, StepContext, StepOutput, StepResult},
};

pub const FOLLOW_UP_ANSWER: &str = "Using existing information to answer follow-up";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Research,
    FollowUp,
}

impl Decision {
    /// Parse a classifier answer. Case and surrounding whitespace are ignored.
    pub fn parse(output: &str) -> Option<Decision> {
        match output.trim().to_lowercase().as_str() {
            "research" => Some(Decision::Research),
            "follow_up" => Some(Decision::FollowUp),
            _ => None,
        }
    }
}

pub struct StartStep {
    llm: Arc<dyn CompletionModel>,
    chat_history: Vec<ChatMessage>,
}

impl StartStep {
    pub fn new(llm: Arc<dyn CompletionModel>, chat_history: Vec<ChatMessage>) -> Self {
        Self { llm, chat_history }
    }

    fn decision_prompt(&self, input: &str) -> String {
        let history = self
            .chat_history
            .iter()
            .map(|msg| format!("{}: {}", msg.role.as_str(), msg.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an expert in decision-making, helping to generate comprehensive market research reports.\n\
             If this is a follow-up question that can be answered with existing information, respond with 'follow_up'.\n\
             If this requires new research, respond with 'research'.\n\n\
             Here is the chat history:\n{}\n\n\
             The current user request is:\n{}\n\n\
             Decision (respond with either 'follow_up' or 'research'):",
            history, input
        )
    }
}

#[async_trait]
impl Step for StartStep {
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

        ctx.data().set(&TASK, input.clone()).await;
        ctx.data().set(&CHAT_HISTORY, self.chat_history.clone()).await;
        ctx.emit(
            ProgressNotification::new(REPORT_WORKFLOW_NAME, format!("Starting workflow for: {}", input))
                .with_workflow(MANAGER_TAG),
        );

        let output = self.llm.complete(&self.decision_prompt(&input)).await?;
        let decision = Decision::parse(&output).unwrap_or_else(|| {
            tracing::warn!(
                "[REPORT] Unrecognized decision '{}', treating as follow-up",
                output.trim()
            );
            ctx.emit(
                ProgressNotification::new(
                    REPORT_WORKFLOW_NAME,
                    format!("Unrecognized decision '{}', answering from existing information", output.trim()),
                )
                .with_workflow(MANAGER_TAG),
            );
            Decision::FollowUp
        });

        tracing::info!("[REPORT] Decision for '{}': {:?}", input, decision);
        match decision {
            Decision::Research => Ok(StepOutput::Emit(Event::GenerateQueries { input })),
            Decision::FollowUp => Ok(StepOutput::Emit(Event::stop(AgentRunResult::new(
                FOLLOW_UP_ANSWER,
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decision_ignores_case_and_whitespace() {
        assert_eq!(Decision::parse(" Research \n"), Some(Decision::Research));
        assert_eq!(Decision::parse("RESEARCH"), Some(Decision::Research));
        assert_eq!(Decision::parse("follow_up"), Some(Decision::FollowUp));
        assert_eq!(Decision::parse(""), None);
        assert_eq!(Decision::parse("research please"), None);
    }
}
