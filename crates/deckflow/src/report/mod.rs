//! Report Generation Workflow
//!
//! Main pipeline:
//! 1. Start - decide between new research and a follow-up answer
//! 2. Generate Queries - broad initial research queries
//! 3. Initial Research - retrieval per query, then fan out one sibling per section
//! 4. Slide Generation - one section sub-workflow per sibling
//! 5. Combine Report - fan-in over all sections
//! 6. Post-Production - executive summary and front page (optional fan-out)
//! 7. Render - final markdown by the "Executive Summarizer" agent

pub mod decision;
pub mod post_production;
pub mod render;
pub mod research;
pub mod section;
pub mod slides;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    agents::{AgentFactory, AgentRunResult, ChatMessage, CompletionModel, Retriever},
    runtime::{ContextKey, Workflow},
    settings::DeckflowConfig,
    DeckflowError, Result,
};

pub use decision::{Decision, StartStep};
pub use post_production::{CombinePostProductionStep, PostProductionStep};
pub use render::RenderReportStep;
pub use research::{GenerateQueriesStep, InitialResearchStep};
pub use section::build_section_workflow;
pub use slides::{CombineReportStep, SlideStep};

pub const REPORT_WORKFLOW_NAME: &str = "Report Generation Workflow";
/// Tag used for the manager's own progress notifications
pub const MANAGER_TAG: &str = "Research Manager";

pub const SLIDES_GUARD: &str = "slides_completed";
pub const POST_PRODUCTION_GUARD: &str = "post_production_completed";

pub const TASK: ContextKey<String> = ContextKey::new("task");
pub const CHAT_HISTORY: ContextKey<Vec<ChatMessage>> = ContextKey::new("chat_history");
pub const INITIAL_RESEARCH: ContextKey<String> = ContextKey::new("initial_research_results");
pub const COMBINED_REPORT: ContextKey<String> = ContextKey::new("combined_report");
pub const RESEARCH_RESULTS: ContextKey<String> = ContextKey::new("research_results");
pub const STREAMING: ContextKey<bool> = ContextKey::new("streaming");

/// Report sections, generated in parallel and combined in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    MarketSize,
    GrowthDrivers,
    Risks,
    MaConsolidation,
    Dynamics,
    Profiles,
}

impl Section {
    pub fn all() -> &'static [Section] {
        &[
            Section::MarketSize,
            Section::GrowthDrivers,
            Section::Risks,
            Section::MaConsolidation,
            Section::Dynamics,
            Section::Profiles,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::MarketSize => "market_size",
            Section::GrowthDrivers => "growth_drivers",
            Section::Risks => "risks",
            Section::MaConsolidation => "ma_consolidation",
            Section::Dynamics => "dynamics",
            Section::Profiles => "profiles",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Section::MarketSize => "Market Size",
            Section::GrowthDrivers => "Growth Drivers",
            Section::Risks => "Risks",
            Section::MaConsolidation => "M&A",
            Section::Dynamics => "Dynamics",
            Section::Profiles => "Profiles",
        }
    }

    pub fn order(&self) -> u32 {
        match self {
            Section::MarketSize => 1,
            Section::GrowthDrivers => 2,
            Section::Risks => 3,
            Section::MaConsolidation => 4,
            Section::Dynamics => 5,
            Section::Profiles => 6,
        }
    }

    /// Context slot owned by this section's fan-out branch
    pub fn result_key(&self) -> ContextKey<AgentRunResult> {
        match self {
            Section::MarketSize => ContextKey::new("market_size_result"),
            Section::GrowthDrivers => ContextKey::new("growth_drivers_result"),
            Section::Risks => ContextKey::new("risks_result"),
            Section::MaConsolidation => ContextKey::new("ma_result"),
            Section::Dynamics => ContextKey::new("dynamics_result"),
            Section::Profiles => ContextKey::new("profiles_result"),
        }
    }

    pub fn brief(&self) -> SectionBrief {
        match self {
            Section::MarketSize => SectionBrief {
                label: self.display_name(),
                researcher: "Find market sizing information: total market size (TAM, SAM, SOM), historical growth and forecasts, regional and segment breakdowns.",
                analyst: "Derive market size trends and growth rates; visualize size by segment and region.",
                reporter: "Write a market size slide: concise summary, evidence-based detailed analysis, areas to explore.",
            },
            Section::GrowthDrivers => SectionBrief {
                label: self.display_name(),
                researcher: "Find the key growth drivers, the industry trends driving growth and the demand-side catalysts.",
                analyst: "Rank the growth drivers by impact and visualize their contribution over time.",
                reporter: "Write a growth drivers slide: concise summary, evidence-based detailed analysis, areas to explore.",
            },
            Section::Risks => SectionBrief {
                label: self.display_name(),
                researcher: "Identify market, regulatory, operational, technology and macro risks with quantifiable impacts.",
                analyst: "Assess risk impact and probability; outline mitigation strategies and historical risk events.",
                reporter: "Write a risks slide: concise summary, impact assessments, precedents and mitigations.",
            },
            Section::MaConsolidation => SectionBrief {
                label: self.display_name(),
                researcher: "Find recent M&A transactions, valuations, acquirers and consolidation trends.",
                analyst: "Analyze deal volume, valuation multiples and consolidation drivers.",
                reporter: "Write an M&A slide: concise summary, notable deals, consolidation outlook.",
            },
            Section::Dynamics => SectionBrief {
                label: self.display_name(),
                researcher: "Find the competitive intensity, market structure, barriers to entry and value chain dynamics.",
                analyst: "Map the competitive landscape and the forces shaping it.",
                reporter: "Write a market dynamics slide: concise summary, structure analysis, implications.",
            },
            Section::Profiles => SectionBrief {
                label: self.display_name(),
                researcher: "Find the key market players, their positions, strategies and financials.",
                analyst: "Compare the key players on share, strategy and performance.",
                reporter: "Write a player profiles slide: concise summary, one profile per key player.",
            },
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Post-production passes over the combined report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProductionKind {
    ExecutiveSummary,
    FrontPage,
}

impl PostProductionKind {
    pub fn all() -> &'static [PostProductionKind] {
        &[PostProductionKind::ExecutiveSummary, PostProductionKind::FrontPage]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostProductionKind::ExecutiveSummary => "executive_summary",
            PostProductionKind::FrontPage => "front_page",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PostProductionKind::ExecutiveSummary => "Executive Summary",
            PostProductionKind::FrontPage => "Front Page",
        }
    }

    pub fn result_key(&self) -> ContextKey<AgentRunResult> {
        match self {
            PostProductionKind::ExecutiveSummary => ContextKey::new("executive_summary_result"),
            PostProductionKind::FrontPage => ContextKey::new("front_page_result"),
        }
    }

    pub fn brief(&self) -> SectionBrief {
        match self {
            PostProductionKind::ExecutiveSummary => SectionBrief {
                label: self.display_name(),
                researcher: "Review every section and collect the key findings, insights, trends and strategic implications.",
                analyst: "Pick the top takeaways, critical dynamics, growth potential, risks and opportunities.",
                reporter: "Write a concise executive summary of the report with its critical data points.",
            },
            PostProductionKind::FrontPage => SectionBrief {
                label: self.display_name(),
                researcher: "Identify the report's main topic, scope, key themes and target audience.",
                analyst: "Condense the themes into a title, subtitle and headline messages.",
                reporter: "Write the front page: title, subtitle, scope and headline messages.",
            },
        }
    }
}

/// Agent focus for one section sub-workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionBrief {
    /// Sub-workflow label, also used to tag forwarded progress
    pub label: &'static str,
    pub researcher: &'static str,
    pub analyst: &'static str,
    pub reporter: &'static str,
}

/// External capabilities the report workflow calls into
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn CompletionModel>,
    /// Index used for initial research; required by the report workflow
    pub retriever: Option<Arc<dyn Retriever>>,
    pub agents: Arc<dyn AgentFactory>,
}

impl Collaborators {
    pub fn new(llm: Arc<dyn CompletionModel>, agents: Arc<dyn AgentFactory>) -> Self {
        Self {
            llm,
            retriever: None,
            agents,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }
}

/// Assemble the full report workflow.
///
/// Fails immediately when no retriever is configured, before any run exists.
pub fn build_report_workflow(
    config: &DeckflowConfig,
    collaborators: &Collaborators,
    chat_history: Vec<ChatMessage>,
) -> Result<Workflow> {
    let retriever = collaborators.retriever.clone().ok_or_else(|| {
        DeckflowError::ConfigError("No index found for initial research".to_string())
    })?;
    let sections = config.ordered_sections();
    if sections.is_empty() {
        return Err(DeckflowError::ConfigError(
            "At least one report section must be configured".to_string(),
        ));
    }

    let mut builder = Workflow::builder(REPORT_WORKFLOW_NAME)
        .timeout(config.full_report_timeout())
        .step(StartStep::new(collaborators.llm.clone(), chat_history))
        .step(GenerateQueriesStep::new(collaborators.llm.clone()))
        .step(InitialResearchStep::new(
            retriever,
            config.retrieval_top_k,
            sections.clone(),
        ));

    for section in &sections {
        builder = builder.step(SlideStep::new(
            *section,
            collaborators.agents.clone(),
            config.single_section_timeout(),
        ));
    }

    builder = builder.step(CombineReportStep::new(
        sections,
        config.enable_post_production,
    ));

    if config.enable_post_production {
        for kind in PostProductionKind::all() {
            builder = builder.step(PostProductionStep::new(
                *kind,
                collaborators.agents.clone(),
                config.single_section_timeout(),
            ));
        }
        builder = builder.step(CombinePostProductionStep::new());
    }

    builder
        .step(RenderReportStep::new(collaborators.agents.clone()))
        .build()
}

/// Prompt for the final rendering pass
pub(crate) fn render_prompt(body: &str, initial_research: &str) -> String {
    format!(
        "Your team has created individual content for different slides in a report. \
         Render them together with proper formatting like markdown headers, bold, italic etc. \
         Here is the combined report:\n{}\n\
         Each slide should have its own pictures, just make it look nice. \
         You can find some initial research results here:\n{}\n\
         Use them to replace any missing images.",
        body, initial_research
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_in_report_order() {
        let orders: Vec<u32> = Section::all().iter().map(Section::order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(Section::MaConsolidation.display_name(), "M&A");
        assert_eq!(Section::MaConsolidation.result_key().name(), "ma_result");
    }

    #[test]
    fn test_section_result_keys_are_distinct() {
        let mut names: Vec<&str> = Section::all().iter().map(|s| s.result_key().name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Section::all().len());
    }
}
