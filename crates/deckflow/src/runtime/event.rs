//! Control-flow events routed between steps

use serde::{Deserialize, Serialize};

use crate::{
    agents::AgentRunResult,
    report::{PostProductionKind, Section},
};

/// Discriminant used by the step registry to route events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    GenerateQueries,
    InitialResearch,
    SlideGeneration,
    CombineReport,
    PostProduction,
    CombinePostProduction,
    Research,
    Analyze,
    Report,
    Stop,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::GenerateQueries => "generate_queries",
            EventKind::InitialResearch => "initial_research",
            EventKind::SlideGeneration => "slide_generation",
            EventKind::CombineReport => "combine_report",
            EventKind::PostProduction => "post_production",
            EventKind::CombinePostProduction => "combine_post_production",
            EventKind::Research => "research",
            EventKind::Analyze => "analyze",
            EventKind::Report => "report",
            EventKind::Stop => "stop",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable message exchanged between steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Entry event carrying the caller's input
    Start { input: String },

    GenerateQueries { input: String },

    InitialResearch { queries: Vec<String> },

    /// One fan-out sibling per report section
    SlideGeneration { slide_type: Section, input: String },

    CombineReport,

    PostProduction { kind: PostProductionKind, input: String },

    CombinePostProduction,

    Research { input: String },

    Analyze { input: String },

    Report { input: String },

    /// Terminal event; an absent result means the terminal step failed
    Stop { result: Option<AgentRunResult> },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start { .. } => EventKind::Start,
            Event::GenerateQueries { .. } => EventKind::GenerateQueries,
            Event::InitialResearch { .. } => EventKind::InitialResearch,
            Event::SlideGeneration { .. } => EventKind::SlideGeneration,
            Event::CombineReport => EventKind::CombineReport,
            Event::PostProduction { .. } => EventKind::PostProduction,
            Event::CombinePostProduction => EventKind::CombinePostProduction,
            Event::Research { .. } => EventKind::Research,
            Event::Analyze { .. } => EventKind::Analyze,
            Event::Report { .. } => EventKind::Report,
            Event::Stop { .. } => EventKind::Stop,
        }
    }

    pub fn start(input: impl Into<String>) -> Self {
        Event::Start {
            input: input.into(),
        }
    }

    pub fn stop(result: AgentRunResult) -> Self {
        Event::Stop {
            result: Some(result),
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Event::Stop { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_matches_variant() {
        let event = Event::SlideGeneration {
            slide_type: Section::Risks,
            input: "EVs".to_string(),
        };
        assert_eq!(event.kind(), EventKind::SlideGeneration);
        assert_eq!(Event::CombineReport.kind(), EventKind::CombineReport);
        assert!(Event::Stop { result: None }.is_stop());
        assert!(!Event::start("x").is_stop());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let value = serde_json::to_value(Event::SlideGeneration {
            slide_type: Section::MaConsolidation,
            input: "EVs".to_string(),
        })
        .unwrap();

        assert_eq!(value["type"], "slideGeneration");
        assert_eq!(value["slide_type"], "ma_consolidation");
    }
}
