//! Ask command - Run a prompt and print the assembled result.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use rmm_core::{AgentConfig, Outcome};

use super::{build_prompt, orchestrator};

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Prompt text
    pub prompt: String,

    /// Client the prompt is about (defaults to the configured client)
    #[arg(long)]
    pub client: Option<String>,

    /// Reuse an existing incident identifier
    #[arg(long)]
    pub incident_id: Option<String>,

    /// Print the full result envelope as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: AskArgs, config: &AgentConfig) -> Result<()> {
    let prompt = build_prompt(&args.prompt, args.client.as_deref(), args.incident_id.as_deref());
    let result = orchestrator(config)
        .invoke(prompt)
        .await
        .context("Failed to run prompt")?;
    info!(route = %result.route(), "Prompt handled");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.response_text());
    println!();
    match &result.outcome {
        Outcome::Incident(incident) => {
            println!("🔧 Tools used: {}", incident.tools_used.join(", "));
            println!("📊 Confidence: {}%", (incident.confidence * 100.0) as u32);
            if incident.requires_approval {
                println!("⚠️  Plan requires approval. Run `rmm execute --approve` per action once reviewed.");
            }
        }
        Outcome::General(general) => {
            println!(
                "🤖 Model: {} ({} input / {} output tokens)",
                general.model, general.usage.input_tokens, general.usage.output_tokens
            );
        }
    }
    Ok(())
}
