use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One generated statement as it appears in the structured-output contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryRecord {
    pub query: String,
}

/// `{"queries": [{"query": "<statement>"}, ...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryCollection {
    pub queries: Vec<QueryRecord>,
}

impl QueryCollection {
    #[must_use]
    pub fn from_statements<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queries: statements
                .into_iter()
                .map(|statement| QueryRecord {
                    query: statement.into(),
                })
                .collect(),
        }
    }
}

#[must_use]
pub fn output_json_schema() -> Value {
    schemars::schema_for!(QueryCollection).to_value()
}

/// Output of a dataset-generation or self-correction call before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawModelOutput {
    Text(String),
    Structured(Value),
}

impl RawModelOutput {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Structured(_) => "structured",
        }
    }
}

impl Display for RawModelOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Structured(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for RawModelOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Ordered statements for one namespace that passed dataset validation.
///
/// Only the validator constructs one, so it is serializable but never deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatementBatch {
    statements: Vec<String>,
}

impl StatementBatch {
    pub(crate) fn new(statements: Vec<String>) -> Self {
        Self { statements }
    }

    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    #[must_use]
    pub fn to_collection(&self) -> QueryCollection {
        QueryCollection::from_statements(self.statements.iter().cloned())
    }

    /// Structured form handed back to the model when execution rejects the batch.
    #[must_use]
    pub fn to_raw_output(&self) -> RawModelOutput {
        match serde_json::to_value(self.to_collection()) {
            Ok(value) => RawModelOutput::Structured(value),
            Err(_) => RawModelOutput::Text(self.statements.join(" ")),
        }
    }
}
