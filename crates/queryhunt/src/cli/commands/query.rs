use anyhow::{Context, Error, Result};
use clap::Args;
use serde_json::json;

use super::{load_or_start_session, parse_namespace};
use crate::config::RuntimePaths;
use crate::game::{DEFAULT_ROW_CAP, PlayerQueryError, run_player_query};
use crate::models::{Envelope, EnvelopeCommandFailure, NamespaceId};
use crate::storage::SqliteGateway;

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[arg(value_name = "NAMESPACE", value_parser = parse_namespace)]
    pub namespace: NamespaceId,

    #[arg(value_name = "SQL")]
    pub sql: String,

    #[arg(long, default_value_t = DEFAULT_ROW_CAP)]
    pub row_cap: usize,
}

pub async fn run(args: &QueryArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    if args.row_cap == 0 {
        let envelope = Envelope::error(
            "query",
            "query_row_cap_invalid",
            "row_cap must be greater than zero",
        )
        .with_error_details(json!({ "row_cap": args.row_cap }));
        return Err(Error::new(EnvelopeCommandFailure::new(envelope)));
    }

    let gateway = SqliteGateway::new(runtime_paths.namespaces_dir());
    let mut session = load_or_start_session(runtime_paths, &args.namespace)?;

    let started = std::time::Instant::now();
    let rows = match run_player_query(&gateway, &mut session, &args.sql, args.row_cap).await {
        Ok(rows) => rows,
        Err(PlayerQueryError::Rejected(violation)) => {
            let envelope = Envelope::error("query", "sql_guardrail_violation", violation.to_string())
                .with_meta("guardrail_checked", json!(true))
                .with_error_details(json!({ "reason": violation.reason() }));
            return Err(Error::new(EnvelopeCommandFailure::new(envelope)));
        }
        Err(PlayerQueryError::Storage(error)) => {
            let envelope = Envelope::error("query", "query_execution_failed", error.to_string())
                .with_meta("guardrail_checked", json!(true))
                .with_error_details(json!({ "namespace": args.namespace.as_str() }));
            return Err(Error::new(EnvelopeCommandFailure::new(envelope)));
        }
    };
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    session
        .save(&runtime_paths.session_path(&args.namespace))
        .context("failed to record query in session")?;

    let envelope = Envelope::ok(
        "query",
        json!({
            "columns": rows.columns,
            "rows": rows.rows,
        }),
    )
    .with_meta("namespace", json!(args.namespace.as_str()))
    .with_meta("row_count", json!(rows.row_count()))
    .with_meta("row_cap", json!(args.row_cap))
    .with_meta("truncated", json!(rows.truncated))
    .with_meta("duration_ms", json!(duration_ms));
    let encoded = serde_json::to_string(&envelope).context("failed to encode query envelope")?;
    println!("{encoded}");

    Ok(())
}
