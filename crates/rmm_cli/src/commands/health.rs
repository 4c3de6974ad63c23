//! Health command - Check a client's fleet health.

use anyhow::Result;
use clap::Args;

use rmm_agents::HealthStatus;
use rmm_core::AgentConfig;

use super::orchestrator;

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Client to check (defaults to the configured client)
    #[arg(long)]
    pub client: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: HealthArgs, config: &AgentConfig) -> Result<()> {
    let client_id = args.client.as_deref().unwrap_or(&config.default_client_id);
    let report = orchestrator(config)
        .monitoring()
        .with_time_range(config.metric_time_range.clone())
        .check_health(client_id)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let icon = match report.status {
            HealthStatus::Healthy => "✅",
            HealthStatus::Warning => "⚠️ ",
            HealthStatus::Critical => "🚨",
            HealthStatus::Error => "❌",
        };
        println!("{} {}: {:?}", icon, report.client_id, report.status);
        if let Some(message) = &report.message {
            println!("   {}", message);
        }
        let summary = &report.inventory_summary;
        println!(
            "   Instances: {} total, {} running, {} stopped",
            summary.total_instances, summary.running_instances, summary.stopped_instances
        );
        for anomaly in &report.anomalies {
            println!("   - {} at {:.2}: {}", anomaly.metric, anomaly.value, anomaly.recommendation);
        }
        println!("   {}", report.recommendation);
    }

    if report.status == HealthStatus::Error {
        anyhow::bail!("Health check failed for {}", report.client_id);
    }
    Ok(())
}
