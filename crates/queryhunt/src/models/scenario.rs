use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const BUNDLED_SCHEMA_DBML: &str = include_str!("../../data/schema.dbml");
pub const MAX_NAMESPACE_LEN: usize = 64;

/// DBML description of the game tables, shared read-only by every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescription {
    text: Arc<str>,
}

impl SchemaDescription {
    #[must_use]
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn bundled() -> Self {
        Self::new(BUNDLED_SCHEMA_DBML)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema description: {}", path.display()))?;
        if text.trim().is_empty() {
            bail!("schema description is empty: {}", path.display());
        }
        Ok(Self::new(text))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Story text produced by the generative step. Grows only while streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Narrative {
    text: String,
}

impl Narrative {
    pub(crate) fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl Display for Narrative {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid namespace `{value}`: use 1-64 characters from [A-Za-z0-9_-]")]
pub struct InvalidNamespaceId {
    pub value: String,
}

/// Isolated storage area owned by one player identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceId(String);

impl NamespaceId {
    pub fn new(value: impl Into<String>) -> std::result::Result<Self, InvalidNamespaceId> {
        let value = value.into();
        if value.len() > MAX_NAMESPACE_LEN || !namespace_regex().is_match(&value) {
            return Err(InvalidNamespaceId { value });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NamespaceId {
    type Error = InvalidNamespaceId;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NamespaceId> for String {
    fn from(value: NamespaceId) -> Self {
        value.0
    }
}

impl Display for NamespaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn namespace_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+$").expect("namespace regex should compile")
    })
}
