//! Ordered test-case selection

use serde::{Deserialize, Serialize};

use crate::catalog::TestCase;

/// Direction for reordering a selected test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(format!("unknown direction '{s}', expected 'up' or 'down'")),
        }
    }
}

/// Selected test-case ids in execution order, without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` if absent, remove it otherwise. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.ids.remove(idx);
                false
            }
            None => {
                self.ids.push(id.to_string());
                true
            }
        }
    }

    /// Select every test case in catalog order
    pub fn select_all(&mut self, test_cases: &[TestCase]) {
        self.ids = test_cases.iter().map(|tc| tc.id.clone()).collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Swap `id` with its neighbour. No-op (returns false) when `id` is
    /// not selected or already at that end.
    pub fn move_item(&mut self, id: &str, direction: Direction) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let target = match direction {
            Direction::Up => idx.checked_sub(1),
            Direction::Down => Some(idx + 1).filter(|&t| t < self.ids.len()),
        };
        match target {
            Some(target) => {
                self.ids.swap(idx, target);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|s| s == id)
    }
}
