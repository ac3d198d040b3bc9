//! Project and test-case catalogs
//!
//! Catalog data is immutable for the lifetime of a simulator. Lookups on
//! unknown ids degrade to empty results rather than errors.

mod history;

pub use history::{logs_url, HistoryLog, HistoryRow, TestStatus};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::config::CatalogConfig;

/// A test project shown in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// A test case belonging to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl TestCase {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ordered projects plus the ordered test cases of each project
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    projects: Vec<Project>,
    test_cases: HashMap<String, Vec<TestCase>>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project with its test cases, replacing any previous entry
    /// with the same id
    pub fn with_project(mut self, project: Project, test_cases: Vec<TestCase>) -> Self {
        self.projects.retain(|p| p.id != project.id);
        self.test_cases.insert(project.id.clone(), test_cases);
        self.projects.push(project);
        self
    }

    /// The demo catalog used when nothing is configured
    pub fn builtin() -> Self {
        Self::new()
            .with_project(
                Project::new("proj-cable", "Cable Modem Tests"),
                vec![
                    TestCase::new("tc-cm-001", "Provisioning Flow"),
                    TestCase::new("tc-cm-002", "DHCP Lease"),
                    TestCase::new("tc-cm-003", "IPv6 Connectivity"),
                    TestCase::new("tc-cm-004", "Reboot Stability"),
                    TestCase::new("tc-cm-005", "Throughput Sanity"),
                ],
            )
            .with_project(
                Project::new("proj-smoke", "Smoke Tests"),
                vec![
                    TestCase::new("tc-sm-001", "Login Smoke"),
                    TestCase::new("tc-sm-002", "Navigation Smoke"),
                    TestCase::new("tc-sm-003", "Health Check"),
                    TestCase::new("tc-sm-004", "API Ping"),
                ],
            )
    }

    /// Build the catalog from configuration, falling back to the built-in
    /// one when no projects are configured
    pub fn from_config(config: &CatalogConfig) -> Self {
        if config.projects.is_empty() {
            return Self::builtin();
        }

        config.projects.iter().fold(Self::new(), |catalog, p| {
            catalog.with_project(
                Project::new(&p.id, &p.name),
                p.test_cases
                    .iter()
                    .map(|tc| TestCase::new(&tc.id, &tc.name))
                    .collect(),
            )
        })
    }

    /// All projects in catalog order
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Test cases of a project, empty for unknown projects
    pub fn test_cases(&self, project_id: &str) -> &[TestCase] {
        self.test_cases
            .get(project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    pub fn test_case(&self, project_id: &str, test_case_id: &str) -> Option<&TestCase> {
        self.test_cases(project_id)
            .iter()
            .find(|tc| tc.id == test_case_id)
    }

    /// Display name of a project, or its id when unknown
    pub fn project_name(&self, project_id: &str) -> String {
        self.project(project_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| project_id.to_string())
    }

    /// Display name of a test case, or its id when unknown
    pub fn test_case_name(&self, project_id: &str, test_case_id: &str) -> String {
        self.test_case(project_id, test_case_id)
            .map(|tc| tc.name.clone())
            .unwrap_or_else(|| test_case_id.to_string())
    }
}
