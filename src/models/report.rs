use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub item: String,
    pub error: String,
}

/// Counters and failures collected by a sync run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub processed: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    /// New match/player links written
    pub linked: usize,
    pub failures: Vec<Failure>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn fail(&mut self, item: impl Into<String>, error: impl std::fmt::Display) {
        self.failures.push(Failure {
            item: item.into(),
            error: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.processed += other.processed;
        self.added += other.added;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.linked += other.linked;
        self.failures.extend(other.failures);
    }

    /// Write the report as pretty JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create report directory")?;
            }
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json).context("Failed to write report")?;
        Ok(())
    }
}
