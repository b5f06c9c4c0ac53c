use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    drop::DropArgs, generate::GenerateArgs, hint::HintArgs, query::QueryArgs, reset::ResetArgs,
    schema::SchemaArgs, solve::SolveArgs,
};
use crate::config::{
    DEFAULT_API_VERSION, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_TEMPERATURE, GeneratorConfig, WorkflowConfig,
};

#[derive(Debug, Parser)]
#[command(
    name = "queryhunt",
    version,
    about = "Generated SQL murder mysteries, solved with queries"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,
}

/// Generative service settings shared by every command that calls the model.
#[derive(Debug, Clone, Args)]
pub struct GeneratorArgs {
    #[arg(long, env = "QUERYHUNT_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,

    #[arg(long, env = "QUERYHUNT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "QUERYHUNT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
}

impl GeneratorArgs {
    #[must_use]
    pub fn to_config(&self) -> GeneratorConfig {
        let mut config = GeneratorConfig::new(self.api_key.clone().unwrap_or_default());
        config.model = self.model.clone();
        config.base_url = self.base_url.clone();
        config.api_version = self.api_version.clone();
        config.temperature = self.temperature;
        config.max_tokens = self.max_tokens;
        config
    }
}

#[derive(Debug, Clone, Args)]
pub struct WorkflowArgs {
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    #[arg(long, default_value_t = DEFAULT_RUN_TIMEOUT_SECS, value_name = "SECONDS")]
    pub timeout_secs: u64,
}

impl WorkflowArgs {
    #[must_use]
    pub fn to_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            max_retries: self.max_retries,
            run_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a story and dataset into a namespace.
    Generate(GenerateArgs),
    /// Run a read-only query against a generated namespace.
    Query(QueryArgs),
    /// Stream a hint based on the story and the queries run so far.
    Hint(HintArgs),
    /// Name the murderer.
    Solve(SolveArgs),
    /// Delete every row in a namespace and keep its tables.
    Reset(ResetArgs),
    /// Remove a namespace and, unless told otherwise, its session file.
    Drop(DropArgs),
    /// Print the schema description and the structured-output JSON schema.
    Schema(SchemaArgs),
}
