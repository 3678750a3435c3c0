//! Configuration management for Deckflow
//!
//! Layered loading: optional TOML file, then `DECKFLOW__*` environment variables.

use std::path::Path;
use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{report::Section, Result};

/// Core configuration for report runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckflowConfig {
    /// Timeout for a single-section run
    #[serde(default = "default_single_section_timeout")]
    pub single_section_timeout_secs: u64,

    /// Timeout for a full report run
    #[serde(default = "default_full_report_timeout")]
    pub full_report_timeout_secs: u64,

    /// Documents fetched per initial research query
    #[serde(default = "default_top_k")]
    pub retrieval_top_k: usize,

    /// Sections generated for a full report, rendered in canonical order
    #[serde(default = "default_sections")]
    pub sections: Vec<Section>,

    /// Run executive summary and front page after the sections are combined
    #[serde(default = "default_true")]
    pub enable_post_production: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_single_section_timeout() -> u64 {
    360
}

fn default_full_report_timeout() -> u64 {
    3600
}

fn default_top_k() -> usize {
    10
}

fn default_sections() -> Vec<Section> {
    Section::all().to_vec()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeckflowConfig {
    fn default() -> Self {
        Self {
            single_section_timeout_secs: default_single_section_timeout(),
            full_report_timeout_secs: default_full_report_timeout(),
            retrieval_top_k: default_top_k(),
            sections: default_sections(),
            enable_post_production: true,
            log_level: default_log_level(),
        }
    }
}

impl DeckflowConfig {
    /// Load configuration from an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Pick up `.env` so local development can set DECKFLOW__* variables
        dotenv::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("DECKFLOW").separator("__"))
            .build()?;

        let config: DeckflowConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from an inline TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: DeckflowConfig = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn single_section_timeout(&self) -> Duration {
        Duration::from_secs(self.single_section_timeout_secs)
    }

    pub fn full_report_timeout(&self) -> Duration {
        Duration::from_secs(self.full_report_timeout_secs)
    }

    /// Configured sections, deduplicated and in canonical report order.
    pub fn ordered_sections(&self) -> Vec<Section> {
        Section::all()
            .iter()
            .copied()
            .filter(|section| self.sections.contains(section))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.sections.is_empty() {
            return Err(crate::DeckflowError::ConfigError(
                "At least one report section must be configured".to_string(),
            ));
        }
        if self.single_section_timeout_secs == 0 || self.full_report_timeout_secs == 0 {
            return Err(crate::DeckflowError::ConfigError(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DeckflowConfig::default();
        assert_eq!(config.single_section_timeout(), Duration::from_secs(360));
        assert_eq!(config.full_report_timeout(), Duration::from_secs(3600));
        assert_eq!(config.retrieval_top_k, 10);
        assert_eq!(config.sections.len(), 6);
        assert!(config.enable_post_production);
    }

    #[test]
    fn test_config_from_toml() {
        let config = DeckflowConfig::from_toml_str(
            r#"
            full_report_timeout_secs = 120
            sections = ["risks", "market_size"]
            enable_post_production = false
            "#,
        )
        .unwrap();

        assert_eq!(config.full_report_timeout_secs, 120);
        assert_eq!(config.single_section_timeout_secs, 360);
        assert!(!config.enable_post_production);
        assert_eq!(
            config.ordered_sections(),
            vec![Section::MarketSize, Section::Risks]
        );
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let result = DeckflowConfig::from_toml_str("single_section_timeout_secs = 0");
        assert!(matches!(result, Err(crate::DeckflowError::ConfigError(_))));
    }
}
