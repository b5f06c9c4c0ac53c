use anyhow::{Context, Result};
use clap::Args;

use super::parse_namespace;
use crate::config::RuntimePaths;
use crate::models::NamespaceId;
use crate::storage::{SqliteGateway, StorageGateway};

#[derive(Debug, Clone, Args)]
pub struct ResetArgs {
    #[arg(value_name = "NAMESPACE", value_parser = parse_namespace)]
    pub namespace: NamespaceId,
}

pub async fn run(args: &ResetArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let gateway = SqliteGateway::new(runtime_paths.namespaces_dir());
    gateway
        .reset_tables(&args.namespace)
        .await
        .with_context(|| format!("failed to reset namespace `{}`", args.namespace))?;

    println!(
        "reset: complete namespace={} path={}",
        args.namespace,
        gateway.namespace_path(&args.namespace).display()
    );
    Ok(())
}
