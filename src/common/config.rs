//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Run simulator settings
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Dashboard controller settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Project and test-case catalog
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Run simulator settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Seed for the outcome generator
    #[serde(default = "default_seed")]
    pub seed: u32,

    /// Shortest simulated test duration
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Width of the duration range above `min_delay_ms` (exclusive)
    #[serde(default = "default_delay_span")]
    pub delay_span_ms: u64,

    /// A draw strictly above this value passes
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            min_delay_ms: default_min_delay(),
            delay_span_ms: default_delay_span(),
            pass_threshold: default_pass_threshold(),
        }
    }
}

fn default_seed() -> u32 {
    1337
}
fn default_min_delay() -> u64 {
    400
}
fn default_delay_span() -> u64 {
    300
}
fn default_pass_threshold() -> f64 {
    0.28
}

/// Dashboard controller settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Maximum number of history rows the dashboard retains
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    50
}

/// Catalog settings
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Start the history store with the two historical demo runs
    #[serde(default = "default_seed_history")]
    pub seed_history: bool,

    /// Projects replacing the built-in catalog when non-empty
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seed_history: default_seed_history(),
            projects: Vec::new(),
        }
    }
}

fn default_seed_history() -> bool {
    true
}

/// A configured project with its ordered test cases
#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub test_cases: Vec<TestCaseConfig>,
}

/// A configured test case
#[derive(Debug, Deserialize, Clone)]
pub struct TestCaseConfig {
    pub id: String,
    pub name: String,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.simulator.pass_threshold) {
            return Err(Error::Config(format!(
                "simulator.pass_threshold must be within [0, 1], got {}",
                self.simulator.pass_threshold
            )));
        }
        if self.dashboard.history_limit == 0 {
            return Err(Error::Config(
                "dashboard.history_limit must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for project in &self.catalog.projects {
            if !seen.insert(project.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate project id '{}' in catalog",
                    project.id
                )));
            }
            let mut cases = std::collections::HashSet::new();
            for tc in &project.test_cases {
                if !cases.insert(tc.id.as_str()) {
                    return Err(Error::Config(format!(
                        "duplicate test case id '{}' in project '{}'",
                        tc.id, project.id
                    )));
                }
            }
        }
        Ok(())
    }
}
