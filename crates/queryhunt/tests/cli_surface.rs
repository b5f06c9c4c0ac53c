use std::path::Path;

use clap::Parser;
use queryhunt::cli::app::{Cli, Command};

#[test]
fn parses_global_runtime_flags_for_generate() {
    let cli = Cli::parse_from([
        "queryhunt",
        "--home-dir",
        "/home/tester",
        "--cwd",
        "/work/repo",
        "--out-dir",
        "/tmp/queryhunt-out",
        "generate",
        "player_1",
        "--api-key",
        "sk-test",
        "--max-retries",
        "5",
        "--timeout-secs",
        "90",
    ]);

    assert_eq!(
        cli.runtime.home_dir.as_deref(),
        Some(Path::new("/home/tester"))
    );
    assert_eq!(cli.runtime.cwd.as_deref(), Some(Path::new("/work/repo")));
    assert_eq!(
        cli.runtime.out_dir.as_deref(),
        Some(Path::new("/tmp/queryhunt-out"))
    );

    match cli.command {
        Command::Generate(args) => {
            assert_eq!(args.namespace.as_str(), "player_1");
            assert_eq!(args.generator.api_key.as_deref(), Some("sk-test"));
            let workflow = args.workflow.to_config();
            assert_eq!(workflow.max_retries, 5);
            assert_eq!(workflow.run_timeout.as_secs(), 90);
            assert!(!args.quiet);
            assert!(args.schema.is_none());
        }
        other => panic!("expected generate command, got {other:?}"),
    }
}

#[test]
fn generate_defaults_match_runtime_defaults() {
    let cli = Cli::parse_from(["queryhunt", "generate", "player_1", "--api-key", "k"]);

    match cli.command {
        Command::Generate(args) => {
            let workflow = args.workflow.to_config();
            assert_eq!(workflow.max_retries, 3);
            assert_eq!(workflow.run_timeout.as_secs(), 60);

            let generator = args.generator.to_config();
            assert_eq!(generator.max_tokens, 8192);
            assert!((generator.temperature - 1.0).abs() < f32::EPSILON);
        }
        other => panic!("expected generate command, got {other:?}"),
    }
}

#[test]
fn parses_query_with_row_cap() {
    let cli = Cli::parse_from([
        "queryhunt",
        "query",
        "player_1",
        "SELECT * FROM Suspects",
        "--row-cap",
        "25",
    ]);

    match cli.command {
        Command::Query(args) => {
            assert_eq!(args.sql, "SELECT * FROM Suspects");
            assert_eq!(args.row_cap, 25);
        }
        other => panic!("expected query command, got {other:?}"),
    }
}

#[test]
fn parses_solve_and_drop_flags() {
    let cli = Cli::parse_from(["queryhunt", "solve", "player_1", "Lady Ashford"]);
    match cli.command {
        Command::Solve(args) => {
            assert_eq!(args.guess, "Lady Ashford");
            assert!(!args.drop_on_success);
        }
        other => panic!("expected solve command, got {other:?}"),
    }

    let cli = Cli::parse_from([
        "queryhunt",
        "solve",
        "player_1",
        "Lady Ashford",
        "--drop-on-success",
    ]);
    match cli.command {
        Command::Solve(args) => assert!(args.drop_on_success),
        other => panic!("expected solve command, got {other:?}"),
    }

    let cli = Cli::parse_from(["queryhunt", "drop", "player_1", "--keep-session"]);
    match cli.command {
        Command::Drop(args) => assert!(args.keep_session),
        other => panic!("expected drop command, got {other:?}"),
    }
}

#[test]
fn rejects_invalid_namespace_ids() {
    let error = Cli::try_parse_from(["queryhunt", "reset", "../escape"])
        .expect_err("path-like namespace must be rejected");
    assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn parses_schema_override() {
    let cli = Cli::parse_from(["queryhunt", "schema", "--schema", "custom.dbml", "--output-only"]);

    match cli.command {
        Command::Schema(args) => {
            assert_eq!(args.schema.as_deref(), Some(Path::new("custom.dbml")));
            assert!(args.output_only);
        }
        other => panic!("expected schema command, got {other:?}"),
    }
}

#[test]
fn every_subcommand_has_help_text() {
    use clap::CommandFactory;

    let command = Cli::command();
    for subcommand in command.get_subcommands() {
        assert!(
            subcommand.get_about().is_some(),
            "`{}` should describe itself in --help",
            subcommand.get_name()
        );
    }
}
