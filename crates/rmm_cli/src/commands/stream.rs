//! Stream command - Run a prompt and print events as they are produced.
//!
//! Ctrl-C cancels the invocation; the stream still ends with its terminal
//! event, which is reported as a cancelled run.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use tracing::warn;

use rmm_agents::CANCELLED_MESSAGE;
use rmm_core::{AgentConfig, CoreError, StreamEvent, ToolStatus};

use super::{build_prompt, orchestrator};

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Prompt text
    pub prompt: String,

    /// Client the prompt is about (defaults to the configured client)
    #[arg(long)]
    pub client: Option<String>,

    /// Reuse an existing incident identifier
    #[arg(long)]
    pub incident_id: Option<String>,

    /// Print each event as a JSON line
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StreamArgs, config: &AgentConfig) -> Result<()> {
    let prompt = build_prompt(&args.prompt, args.client.as_deref(), args.incident_id.as_deref());
    let mut stream = orchestrator(config)
        .invoke_stream(prompt)
        .context("Failed to start stream")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut last = None;
    let mut out = std::io::stdout();

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(event) => {
                    if args.json {
                        writeln!(out, "{}", serde_json::to_string(&event)?)?;
                    } else {
                        render(&mut out, &event)?;
                    }
                    out.flush()?;
                    last = Some(event);
                }
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                warn!("Interrupted, cancelling invocation");
                stream.cancel();
                interrupted = true;
            }
        }
    }

    match last {
        Some(StreamEvent::Error { message }) if message == CANCELLED_MESSAGE => {
            Err(CoreError::Cancelled.into())
        }
        Some(StreamEvent::Error { message }) => anyhow::bail!("Stream failed: {}", message),
        Some(StreamEvent::Complete { .. }) => Ok(()),
        _ => anyhow::bail!("Stream ended without a terminal event"),
    }
}

fn render(out: &mut impl Write, event: &StreamEvent) -> std::io::Result<()> {
    match event {
        StreamEvent::Routing { routed_to, .. } => writeln!(out, "➡️  Routed to {}", routed_to),
        StreamEvent::Tool { tool_name, status } => {
            let icon = match status {
                ToolStatus::Running => "⏳",
                ToolStatus::Completed => "✅",
                ToolStatus::Failed => "❌",
            };
            writeln!(out, "{} {}", icon, tool_name)
        }
        StreamEvent::Token { content } => write!(out, "{}", content),
        StreamEvent::Metadata {
            tools_used,
            confidence,
            incident_id,
            requires_approval,
        } => {
            writeln!(out)?;
            writeln!(out)?;
            writeln!(out, "📋 Incident {}", incident_id)?;
            writeln!(out, "   Tools used: {}", tools_used.join(", "))?;
            writeln!(out, "   Confidence: {}%", (confidence * 100.0) as u32)?;
            writeln!(out, "   Requires approval: {}", requires_approval)
        }
        StreamEvent::Complete { stop_reason } => writeln!(out, "\n🏁 Complete ({})", stop_reason),
        StreamEvent::Error { message } => writeln!(out, "\n❌ {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(event: &StreamEvent) -> String {
        let mut buf = Vec::new();
        render(&mut buf, event).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_tokens_render_without_newline() {
        assert_eq!(rendered(&StreamEvent::token("High ")), "High ");
    }

    #[test]
    fn test_tool_events_render_status() {
        let line = rendered(&StreamEvent::tool("query_client_inventory", ToolStatus::Completed));
        assert_eq!(line, "✅ query_client_inventory\n");
    }

    #[test]
    fn test_metadata_renders_summary() {
        let text = rendered(&StreamEvent::Metadata {
            tools_used: vec!["query_client_inventory".to_string()],
            confidence: 0.85,
            incident_id: "INC-12345678".to_string(),
            requires_approval: false,
        });
        assert!(text.contains("📋 Incident INC-12345678"));
        assert!(text.contains("Confidence: 85%"));
    }
}
