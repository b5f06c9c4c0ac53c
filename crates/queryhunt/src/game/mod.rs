pub mod session;

use tracing::{debug, info};

use crate::llm::{GenerativeClient, GenerativeError, collect_stream};
use crate::models::NamespaceId;
use crate::prompts::hint_prompt;
use crate::sql::{SelectOnlyViolation, check_select_only};
use crate::storage::{QueryRows, SqliteGateway, StorageError, StorageGateway};

pub use session::{GameSession, SolutionAttempt};

pub const DEFAULT_ROW_CAP: usize = 200;

const MURDERER_QUERY: &str = "SELECT name FROM Murderer";

#[derive(Debug, thiserror::Error)]
pub enum PlayerQueryError {
    #[error("query rejected: {0}")]
    Rejected(#[from] SelectOnlyViolation),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionCheck {
    pub correct: bool,
    pub elapsed_secs: Option<i64>,
}

/// Creates the namespace, or clears its tables when it is already there.
pub async fn prepare_namespace(
    storage: &dyn StorageGateway,
    namespace: &NamespaceId,
) -> Result<(), StorageError> {
    match storage.create_namespace(namespace).await {
        Ok(()) => Ok(()),
        Err(StorageError::NamespaceExists(_)) => {
            debug!(namespace = %namespace, "namespace exists; resetting tables");
            storage.reset_tables(namespace).await
        }
        Err(error) => Err(error),
    }
}

/// Runs a player query after the single-SELECT gate and records it in the session.
pub async fn run_player_query(
    gateway: &SqliteGateway,
    session: &mut GameSession,
    sql: &str,
    row_cap: usize,
) -> Result<QueryRows, PlayerQueryError> {
    check_select_only(sql)?;
    let rows = gateway
        .query_namespace(&session.namespace, sql, row_cap)
        .await?;
    session.record_query(sql);
    Ok(rows)
}

/// Streams one hint built from the story, the player's queries and earlier hints.
pub async fn generate_hint<F>(
    client: &dyn GenerativeClient,
    session: &mut GameSession,
    on_fragment: F,
) -> Result<String, GenerativeError>
where
    F: FnMut(&str) + Send,
{
    let prompt = hint_prompt(
        &session.story,
        &session.queries.join("\n"),
        &session.hints.join("\n"),
    );
    let stream = client.stream_complete(&prompt).await?;
    let hint = collect_stream(stream, on_fragment).await?;
    session.record_hint(&hint);
    Ok(hint)
}

/// Compares the trimmed guess against every name in the Murderer table.
pub async fn check_solution(
    gateway: &SqliteGateway,
    session: &mut GameSession,
    guess: &str,
) -> Result<SolutionCheck, StorageError> {
    let rows = gateway
        .query_namespace(&session.namespace, MURDERER_QUERY, DEFAULT_ROW_CAP)
        .await?;
    let guess = guess.trim();
    let correct = !guess.is_empty()
        && rows
            .rows
            .iter()
            .filter_map(|row| row.get("name").and_then(serde_json::Value::as_str))
            .any(|name| name.trim() == guess);

    session.record_solution(guess, correct);
    info!(namespace = %session.namespace, correct, "solution checked");
    Ok(SolutionCheck {
        correct,
        elapsed_secs: session.elapsed_secs.filter(|_| correct),
    })
}

/// Drops the namespace of a solved game. An open case keeps its data and returns `false`.
pub async fn end_game(
    storage: &dyn StorageGateway,
    session: &GameSession,
) -> Result<bool, StorageError> {
    if !session.is_solved() {
        return Ok(false);
    }
    storage.drop_namespace(&session.namespace).await?;
    info!(namespace = %session.namespace, "solved namespace dropped");
    Ok(true)
}
