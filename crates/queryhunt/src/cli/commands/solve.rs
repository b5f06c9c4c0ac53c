use anyhow::{Context, Error, Result};
use clap::Args;

use super::{GameCommandFailure, load_or_start_session, parse_namespace};
use crate::config::RuntimePaths;
use crate::game::{check_solution, end_game};
use crate::models::NamespaceId;
use crate::storage::SqliteGateway;

#[derive(Debug, Clone, Args)]
pub struct SolveArgs {
    #[arg(value_name = "NAMESPACE", value_parser = parse_namespace)]
    pub namespace: NamespaceId,

    /// Full name of the suspect you accuse.
    #[arg(value_name = "NAME")]
    pub guess: String,

    /// Drop the namespace once the murderer is named. The session file is kept.
    #[arg(long, default_value_t = false)]
    pub drop_on_success: bool,
}

pub async fn run(args: &SolveArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let gateway = SqliteGateway::new(runtime_paths.namespaces_dir());
    let mut session = load_or_start_session(runtime_paths, &args.namespace)?;

    let check = check_solution(&gateway, &mut session, &args.guess)
        .await
        .with_context(|| format!("failed to check solution for `{}`", args.namespace))?;
    session.save(&runtime_paths.session_path(&args.namespace))?;

    if !check.correct {
        eprintln!(
            "solve: wrong namespace={} attempts={} next=keep_investigating",
            args.namespace,
            session.solutions.len()
        );
        return Err(Error::new(GameCommandFailure::new(
            "wrong_guess",
            format!("`{}` is not the murderer", args.guess.trim()),
        )));
    }

    let dropped = if args.drop_on_success {
        end_game(&gateway, &session)
            .await
            .with_context(|| format!("failed to drop solved namespace `{}`", args.namespace))?
    } else {
        false
    };

    let elapsed = check
        .elapsed_secs
        .map_or_else(|| "unknown".to_string(), |secs| secs.to_string());
    println!(
        "solve: correct namespace={} attempts={} elapsed_secs={elapsed} dropped={dropped}",
        args.namespace,
        session.solutions.len()
    );
    Ok(())
}
