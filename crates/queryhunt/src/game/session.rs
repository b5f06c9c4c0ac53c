use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::models::NamespaceId;
use crate::models::envelope::now_utc_rfc3339;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionAttempt {
    pub guess: String,
    pub correct: bool,
    pub at_utc: String,
}

/// Everything a player accumulates against one generated mystery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub namespace: NamespaceId,
    pub story: String,
    pub started_at_utc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_utc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<i64>,

    #[serde(default)]
    pub queries: Vec<String>,

    #[serde(default)]
    pub hints: Vec<String>,

    #[serde(default)]
    pub solutions: Vec<SolutionAttempt>,
}

impl GameSession {
    #[must_use]
    pub fn new(namespace: NamespaceId, story: impl Into<String>) -> Self {
        Self {
            namespace,
            story: story.into(),
            started_at_utc: now_utc_rfc3339(),
            finished_at_utc: None,
            elapsed_secs: None,
            queries: Vec::new(),
            hints: Vec::new(),
            solutions: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.finished_at_utc.is_some()
    }

    pub fn record_query(&mut self, sql: &str) {
        self.queries.push(sql.trim().to_string());
    }

    pub fn record_hint(&mut self, hint: &str) {
        self.hints.push(hint.trim().to_string());
    }

    /// Records a guess. The first correct guess stamps the finish time; later ones do not move it.
    pub fn record_solution(&mut self, guess: &str, correct: bool) {
        let at_utc = now_utc_rfc3339();
        if correct && self.finished_at_utc.is_none() {
            self.elapsed_secs = elapsed_between(&self.started_at_utc, &at_utc);
            self.finished_at_utc = Some(at_utc.clone());
        }
        self.solutions.push(SolutionAttempt {
            guess: guess.trim().to_string(),
            correct,
            at_utc,
        });
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create session directory")?;
        }

        let encoded = serde_json::to_vec_pretty(self).context("failed to encode session json")?;
        std::fs::write(path, encoded)
            .with_context(|| format!("failed to write session file: {}", path.display()))
    }
}

fn elapsed_between(start: &str, end: &str) -> Option<i64> {
    let start = OffsetDateTime::parse(start, &Rfc3339).ok()?;
    let end = OffsetDateTime::parse(end, &Rfc3339).ok()?;
    Some((end - start).whole_seconds().max(0))
}
