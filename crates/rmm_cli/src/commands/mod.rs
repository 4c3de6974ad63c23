//! CLI command definitions.
//!
//! Each subcommand maps to one entry point of the agent: routing preview,
//! request/response invocation, streaming invocation, fleet health checks
//! and approved remediation execution.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use rmm_agents::Orchestrator;
use rmm_core::{AgentConfig, Prompt, INCIDENT_ID_KEY};

pub mod ask;
pub mod execute;
pub mod health;
pub mod route;
pub mod stream;

/// RMM agent - incident routing and remediation proposals for managed fleets
#[derive(Parser, Debug)]
#[command(name = "rmm")]
#[command(version, about = "RMM agent - incident routing and remediation proposals")]
#[command(long_about = r#"
Routes operator prompts either to the four-stage incident pipeline
(context gather, root cause analysis, remediation proposal, response
assembly) or to a general model query.

COMMANDS:
  route    → Show which route a prompt takes
  ask      → Run a prompt and print the assembled result
  stream   → Run a prompt and print events as they are produced
  health   → Check a client's fleet health
  execute  → Execute an approved remediation action

CONFIGURATION:
  Settings come from RMM_* environment variables, optionally layered on a
  JSON settings file passed with --config. Without an API key the agent
  runs in mock mode with simulated collaborators.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid input or configuration
  3 - Invocation cancelled
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// JSON settings file
    #[arg(short, long, global = true, env = "RMM_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Force mock mode regardless of configured API keys
    #[arg(long, global = true)]
    pub mock: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which route a prompt takes
    Route(route::RouteArgs),

    /// Run a prompt and print the assembled result
    Ask(ask::AskArgs),

    /// Run a prompt and print events as they are produced
    Stream(stream::StreamArgs),

    /// Check a client's fleet health
    Health(health::HealthArgs),

    /// Execute an approved remediation action
    Execute(execute::ExecuteArgs),
}

/// Load settings from a file when given, otherwise from the environment.
pub fn load_config(path: Option<&Path>, force_mock: bool) -> Result<AgentConfig> {
    let mut config = match path {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => AgentConfig::from_env().context("Failed to load settings from environment")?,
    };
    if force_mock {
        config.mock_mode = true;
    }
    debug!(provider = ?config.provider, mock_mode = config.mock_mode, "Settings loaded");
    Ok(config)
}

/// Build a prompt from the shared command-line fields.
pub fn build_prompt(text: &str, client: Option<&str>, incident_id: Option<&str>) -> Prompt {
    let mut prompt = Prompt::new(text);
    if let Some(client) = client {
        prompt = prompt.with_client(client);
    }
    if let Some(id) = incident_id {
        prompt = prompt.with_context(INCIDENT_ID_KEY, serde_json::Value::String(id.to_string()));
    }
    prompt
}

pub fn orchestrator(config: &AgentConfig) -> Orchestrator {
    Orchestrator::from_config(config)
}
