pub mod drop;
pub mod generate;
pub mod hint;
pub mod query;
pub mod reset;
pub mod schema;
pub mod solve;

use std::path::Path;

use anyhow::Result;

use crate::config::RuntimePaths;
use crate::game::GameSession;
use crate::models::{InvalidNamespaceId, NamespaceId, SchemaDescription};

/// A command that ran but whose game outcome was a failure (workflow failure, wrong guess).
#[derive(Debug)]
pub struct GameCommandFailure {
    pub code: &'static str,
    pub message: String,
}

impl GameCommandFailure {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GameCommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GameCommandFailure {}

pub(crate) fn load_schema_description(
    schema: Option<&Path>,
    runtime_paths: &RuntimePaths,
) -> Result<SchemaDescription> {
    match schema {
        Some(path) => {
            let resolved = runtime_paths.resolve_user_path(path)?;
            SchemaDescription::from_file(&resolved)
        }
        None => Ok(SchemaDescription::bundled()),
    }
}

pub(crate) fn parse_namespace(value: &str) -> std::result::Result<NamespaceId, InvalidNamespaceId> {
    NamespaceId::new(value)
}

/// Loads the namespace's session, or starts an empty one when none was saved.
pub(crate) fn load_or_start_session(
    runtime_paths: &RuntimePaths,
    namespace: &NamespaceId,
) -> Result<GameSession> {
    let path = runtime_paths.session_path(namespace);
    if path.is_file() {
        GameSession::load(&path)
    } else {
        Ok(GameSession::new(namespace.clone(), ""))
    }
}
