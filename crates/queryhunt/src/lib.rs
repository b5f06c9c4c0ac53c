#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod game;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod sql;
pub mod storage;
pub mod validate;
pub mod workflow;

pub use cli::app::{Cli, Command};
pub use workflow::{MysteryWorkflow, WorkflowResult, run_workflow};
