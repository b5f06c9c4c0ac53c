use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Error, Result};
use clap::Args;

use super::{GameCommandFailure, load_schema_description, parse_namespace};
use crate::cli::app::{GeneratorArgs, WorkflowArgs};
use crate::config::RuntimePaths;
use crate::game::{GameSession, prepare_namespace};
use crate::llm::AnthropicClient;
use crate::models::NamespaceId;
use crate::storage::SqliteGateway;
use crate::workflow::{MysteryWorkflow, StateName, WorkflowObserver, WorkflowResult};

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    #[arg(value_name = "NAMESPACE", value_parser = parse_namespace)]
    pub namespace: NamespaceId,

    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Do not echo the story while it streams.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    #[command(flatten)]
    pub generator: GeneratorArgs,

    #[command(flatten)]
    pub workflow: WorkflowArgs,
}

struct ConsoleObserver {
    echo_story: bool,
}

impl WorkflowObserver for ConsoleObserver {
    fn on_narrative_fragment(&self, fragment: &str) {
        if self.echo_story {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(fragment.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn on_transition(&self, from: StateName, to: StateName) {
        if to == StateName::SelfCorrecting {
            eprintln!("generate: self_correct from={from}");
        }
    }
}

pub async fn run(args: &GenerateArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let schema = load_schema_description(args.schema.as_deref(), runtime_paths)?;
    let generator = args.generator.to_config();
    let workflow_config = args.workflow.to_config();
    let gateway = Arc::new(SqliteGateway::new(runtime_paths.namespaces_dir()));
    println!(
        "generate: start namespace={} model={} max_retries={} timeout_secs={} namespaces_dir={}",
        args.namespace,
        generator.model,
        workflow_config.max_retries,
        workflow_config.run_timeout.as_secs(),
        gateway.root().display()
    );

    let client = AnthropicClient::new(generator).context("failed to configure generative client")?;
    prepare_namespace(gateway.as_ref(), &args.namespace)
        .await
        .with_context(|| format!("failed to prepare namespace `{}`", args.namespace))?;

    let workflow = MysteryWorkflow::new(Arc::new(client), gateway, schema, workflow_config);
    let observer = ConsoleObserver {
        echo_story: !args.quiet,
    };

    match workflow
        .run_with_observer(&args.namespace, &observer)
        .await
    {
        WorkflowResult::Success {
            narrative,
            executed_batch,
        } => {
            if !args.quiet {
                println!();
            }
            let session_path = runtime_paths.session_path(&args.namespace);
            GameSession::new(args.namespace.clone(), narrative.into_string()).save(&session_path)?;
            println!(
                "generate: complete namespace={} statements={} session={}",
                args.namespace,
                executed_batch.len(),
                session_path.display()
            );
            Ok(())
        }
        WorkflowResult::Failure { reason } => {
            eprintln!(
                "generate: failed namespace={} reason={} next=retry",
                args.namespace,
                reason.code()
            );
            Err(Error::new(GameCommandFailure::new(
                reason.code(),
                reason.to_string(),
            )))
        }
    }
}
