use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;

use super::parse_namespace;
use crate::cli::app::GeneratorArgs;
use crate::config::RuntimePaths;
use crate::game::{GameSession, generate_hint};
use crate::llm::AnthropicClient;
use crate::models::NamespaceId;

#[derive(Debug, Clone, Args)]
pub struct HintArgs {
    #[arg(value_name = "NAMESPACE", value_parser = parse_namespace)]
    pub namespace: NamespaceId,

    #[command(flatten)]
    pub generator: GeneratorArgs,
}

pub async fn run(args: &HintArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let session_path = runtime_paths.session_path(&args.namespace);
    if !session_path.is_file() {
        bail!(
            "no session for namespace `{}`; run `queryhunt generate {}` first",
            args.namespace,
            args.namespace
        );
    }
    let mut session = GameSession::load(&session_path)?;
    println!(
        "hint: start namespace={} queries={} previous_hints={}",
        args.namespace,
        session.queries.len(),
        session.hints.len()
    );

    let client = AnthropicClient::new(args.generator.to_config())
        .context("failed to configure generative client")?;
    generate_hint(&client, &mut session, |fragment| {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(fragment.as_bytes());
        let _ = stdout.flush();
    })
    .await
    .context("hint generation failed")?;
    println!();

    session.save(&session_path)?;
    println!(
        "hint: complete namespace={} hints={}",
        args.namespace,
        session.hints.len()
    );
    Ok(())
}
