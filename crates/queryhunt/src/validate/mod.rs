use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::models::{QueryCollection, RawModelOutput, StatementBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssueKind {
    MalformedOutput,
    SchemaMismatch,
    EmptyBatch,
    InvalidSyntax,
    DestructiveStatement,
}

impl ValidationIssueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedOutput => "malformed_output",
            Self::SchemaMismatch => "schema_mismatch",
            Self::EmptyBatch => "empty_batch",
            Self::InvalidSyntax => "invalid_syntax",
            Self::DestructiveStatement => "destructive_statement",
        }
    }
}

/// First rule violation found in a candidate batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: ValidationIssueKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,

    pub detail: String,
}

impl ValidationIssue {
    fn output(kind: ValidationIssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            statement_index: None,
            statement: None,
            detail: detail.into(),
        }
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.statement_index, &self.statement) {
            (Some(index), Some(statement)) => write!(
                f,
                "{}: query #{} `{}`: {}",
                self.kind.as_str(),
                index + 1,
                statement,
                self.detail
            ),
            _ => write!(f, "{}: {}", self.kind.as_str(), self.detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(StatementBatch),
    Invalid {
        issue: ValidationIssue,
        output: RawModelOutput,
    },
}

/// Removes the artifacts models tend to wrap structured output in.
#[must_use]
pub fn clean_model_text(text: &str) -> String {
    text.replace("```json", "")
        .replace("```", "")
        .replace("\\'", "")
        .replace(['\r', '\n'], "")
        .trim()
        .to_string()
}

pub fn normalize_output(raw: &RawModelOutput) -> Result<QueryCollection, ValidationIssue> {
    match raw {
        RawModelOutput::Text(text) => {
            let cleaned = clean_model_text(text);
            let value = serde_json::from_str::<serde_json::Value>(&cleaned).map_err(|error| {
                ValidationIssue::output(
                    ValidationIssueKind::MalformedOutput,
                    format!("output is not valid JSON: {error}"),
                )
            })?;
            collection_from_value(value)
        }
        RawModelOutput::Structured(value) => collection_from_value(value.clone()),
    }
}

fn collection_from_value(value: serde_json::Value) -> Result<QueryCollection, ValidationIssue> {
    serde_json::from_value::<QueryCollection>(value).map_err(|error| {
        ValidationIssue::output(
            ValidationIssueKind::SchemaMismatch,
            format!("output does not match {{\"queries\": [{{\"query\": ...}}]}}: {error}"),
        )
    })
}

type StatementRule = fn(&str) -> Result<(), (ValidationIssueKind, String)>;

fn statement_rule_catalog() -> &'static [StatementRule] {
    &[rule_syntax, rule_non_destructive]
}

fn rule_syntax(statement: &str) -> Result<(), (ValidationIssueKind, String)> {
    crate::sql::check_syntax(statement)
        .map_err(|detail| (ValidationIssueKind::InvalidSyntax, format!("invalid SQL syntax: {detail}")))
}

fn rule_non_destructive(statement: &str) -> Result<(), (ValidationIssueKind, String)> {
    match crate::sql::first_destructive_keyword(statement) {
        Some(keyword) => Err((
            ValidationIssueKind::DestructiveStatement,
            format!("destructive SQL query detected: {keyword} command found"),
        )),
        None => Ok(()),
    }
}

/// Normalizes `raw` and checks every statement; the batch is accepted or rejected as a unit.
#[must_use]
pub fn validate_output(raw: RawModelOutput) -> ValidationOutcome {
    let collection = match normalize_output(&raw) {
        Ok(collection) => collection,
        Err(issue) => return ValidationOutcome::Invalid { issue, output: raw },
    };

    if collection.queries.is_empty() {
        return ValidationOutcome::Invalid {
            issue: ValidationIssue::output(
                ValidationIssueKind::EmptyBatch,
                "queries array is empty; return at least one INSERT statement",
            ),
            output: raw,
        };
    }

    for (index, record) in collection.queries.iter().enumerate() {
        for rule in statement_rule_catalog() {
            if let Err((kind, detail)) = rule(&record.query) {
                let issue = ValidationIssue {
                    kind,
                    statement_index: Some(index),
                    statement: Some(record.query.clone()),
                    detail,
                };
                return ValidationOutcome::Invalid { issue, output: raw };
            }
        }
    }

    ValidationOutcome::Valid(StatementBatch::new(
        collection
            .queries
            .into_iter()
            .map(|record| record.query)
            .collect(),
    ))
}
