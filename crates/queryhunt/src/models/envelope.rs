use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const ENVELOPE_SCHEMA_VERSION: &str = "queryhunt.envelope.v1";

pub type EnvelopeMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Machine-readable result line that `query` prints on stdout, for both rows and failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: EnvelopeMeta,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl Envelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::base(command, true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(EnvelopeError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = EnvelopeMeta::new();
        meta.insert("schema_version".to_string(), json!(ENVELOPE_SCHEMA_VERSION));

        Self {
            ok,
            command: command.into(),
            generated_at_utc: now_utc_rfc3339(),
            data: None,
            meta,
            error: None,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// Carries a failed envelope through `anyhow` so `main` can print it verbatim.
#[derive(Debug, Clone)]
pub struct EnvelopeCommandFailure {
    envelope: Envelope,
}

impl EnvelopeCommandFailure {
    #[must_use]
    pub fn new(envelope: Envelope) -> Self {
        Self { envelope }
    }
}

impl Display for EnvelopeCommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("envelope serialization failure"),
        }
    }
}

impl std::error::Error for EnvelopeCommandFailure {}

pub(crate) fn now_utc_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    let now = now.replace_nanosecond(0).unwrap_or(now);
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ENVELOPE_SCHEMA_VERSION, Envelope, EnvelopeCommandFailure};

    #[test]
    fn ok_envelope_carries_rows_and_meta() {
        let envelope = Envelope::ok("query", json!({"columns": ["name"], "rows": []}))
            .with_meta("row_count", json!(0));

        assert!(envelope.ok);
        assert!(envelope.generated_at_utc.ends_with('Z'));
        assert_eq!(
            envelope.meta.get("schema_version"),
            Some(&json!(ENVELOPE_SCHEMA_VERSION))
        );

        let encoded = serde_json::to_value(&envelope).expect("envelope should serialize");
        assert_eq!(encoded["meta"]["row_count"], json!(0));
        assert!(encoded.get("error").is_none());
    }

    #[test]
    fn failure_display_is_the_error_envelope_json() {
        let envelope = Envelope::error("query", "sql_guardrail_violation", "query rejected")
            .with_error_details(json!({"reason": "multi_statement"}));
        let rendered = EnvelopeCommandFailure::new(envelope).to_string();

        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("display output should be JSON");
        assert_eq!(parsed["ok"], json!(false));
        assert_eq!(parsed["error"]["details"]["reason"], json!("multi_statement"));
        assert!(parsed.get("data").is_none());
    }
}
