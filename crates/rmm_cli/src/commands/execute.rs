//! Execute command - Run one approved remediation action.
//!
//! The agent only proposes plans. This command is the human approval
//! surface and refuses to run without `--approve`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use rmm_core::{ActionType, AgentConfig, CoreError};
use rmm_tools::Toolkit;

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Instance to act on
    #[arg(long)]
    pub instance: String,

    /// Action type (restart_service, clear_cache, increase_memory, update_package, investigate)
    #[arg(long)]
    pub action: String,

    /// Action parameter as key=value; values are parsed as JSON when possible
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, serde_json::Value)>,

    /// Client that owns the instance (defaults to the configured client)
    #[arg(long)]
    pub client: Option<String>,

    /// Confirm the action was reviewed and approved
    #[arg(long)]
    pub approve: bool,

    /// Seed for the simulated executor
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the execution report as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.trim().is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

pub async fn execute(args: ExecuteArgs, config: &AgentConfig) -> Result<()> {
    let action_type = ActionType::parse(&args.action)
        .ok_or_else(|| CoreError::InvalidInput(format!("unknown action type: {}", args.action)))?;

    if !args.approve {
        return Err(CoreError::InvalidInput(format!(
            "{} on {} requires approval; re-run with --approve",
            action_type, args.instance
        ))
        .into());
    }

    let client_id = args.client.as_deref().unwrap_or(&config.default_client_id);
    let parameters: BTreeMap<String, serde_json::Value> = args.params.into_iter().collect();
    info!(client_id, instance = %args.instance, action = %action_type, "Executing approved action");

    let toolkit = Toolkit::simulated(args.seed);
    let report = toolkit
        .executor()
        .execute(client_id, &args.instance, action_type, &parameters)
        .await
        .with_context(|| format!("Failed to execute {} on {}", action_type, args.instance))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let icon = if report.success() { "✅" } else { "❌" };
        println!("{} {} ({})", icon, report.message, report.execution_id);
        for command in &report.commands_executed {
            println!("   $ {}", command);
        }
        println!("   Took {:.1}s", report.execution_time_seconds);
    }

    if !report.success() {
        anyhow::bail!("Remediation finished with status {}", report.status);
    }
    Ok(())
}
