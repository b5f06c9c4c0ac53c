use anyhow::{Context, Result};
use clap::Args;

use super::parse_namespace;
use crate::config::RuntimePaths;
use crate::models::NamespaceId;
use crate::storage::{SqliteGateway, StorageGateway};

#[derive(Debug, Clone, Args)]
pub struct DropArgs {
    #[arg(value_name = "NAMESPACE", value_parser = parse_namespace)]
    pub namespace: NamespaceId,

    /// Keep the saved session file.
    #[arg(long, default_value_t = false)]
    pub keep_session: bool,
}

pub async fn run(args: &DropArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let gateway = SqliteGateway::new(runtime_paths.namespaces_dir());
    let existed = gateway.namespace_exists(&args.namespace);
    gateway
        .drop_namespace(&args.namespace)
        .await
        .with_context(|| format!("failed to drop namespace `{}`", args.namespace))?;

    let session_path = runtime_paths.session_path(&args.namespace);
    if !args.keep_session {
        match std::fs::remove_file(&session_path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("failed to remove session file: {}", session_path.display())
                });
            }
        }
    }

    println!(
        "drop: complete namespace={} existed={existed} session_kept={}",
        args.namespace, args.keep_session
    );
    Ok(())
}
