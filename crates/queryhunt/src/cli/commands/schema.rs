use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::load_schema_description;
use crate::config::RuntimePaths;
use crate::models::output_json_schema;

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Print only the structured-output JSON schema.
    #[arg(long, default_value_t = false)]
    pub output_only: bool,
}

pub fn run(args: &SchemaArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    if !args.output_only {
        let schema = load_schema_description(args.schema.as_deref(), runtime_paths)?;
        println!("{}", schema.as_str().trim_end());
        println!();
    }

    let encoded = serde_json::to_string_pretty(&output_json_schema())
        .context("failed to encode output json schema")?;
    println!("{encoded}");
    Ok(())
}
