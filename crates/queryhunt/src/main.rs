#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use queryhunt::cli::app::{Cli, Command, RuntimeArgs};
use queryhunt::cli::commands;
use queryhunt::config::RuntimePaths;
use queryhunt::models::EnvelopeCommandFailure;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_GAME_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

const DEFAULT_LOG_FILTER: &str = "queryhunt=info";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();
    let command_name = command_name(&cli.command);
    eprintln!("queryhunt: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            eprintln!("queryhunt: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            if let Some(failure) = error.downcast_ref::<EnvelopeCommandFailure>() {
                println!("{failure}");
            }
            eprintln!("queryhunt: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: Cli) -> Result<()> {
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        match &cli.command {
            Command::Generate(args) => commands::generate::run(args, &runtime_paths).await,
            Command::Query(args) => commands::query::run(args, &runtime_paths).await,
            Command::Hint(args) => commands::hint::run(args, &runtime_paths).await,
            Command::Solve(args) => commands::solve::run(args, &runtime_paths).await,
            Command::Reset(args) => commands::reset::run(args, &runtime_paths).await,
            Command::Drop(args) => commands::drop::run(args, &runtime_paths).await,
            Command::Schema(args) => commands::schema::run(args, &runtime_paths),
        }
    })
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error
        .downcast_ref::<commands::GameCommandFailure>()
        .is_some()
        || error.downcast_ref::<EnvelopeCommandFailure>().is_some()
    {
        EXIT_GAME_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Generate(_) => "generate",
        Command::Query(_) => "query",
        Command::Hint(_) => "hint",
        Command::Solve(_) => "solve",
        Command::Reset(_) => "reset",
        Command::Drop(_) => "drop",
        Command::Schema(_) => "schema",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    queryhunt::config::resolve_runtime_paths(&home_dir, &cwd, args.out_dir.as_deref())
}
