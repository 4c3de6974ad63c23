//! System prompts and prompt templates.

use rmm_core::IncidentContext;

pub const GENERAL_SYSTEM_PROMPT: &str = r#"You are an AI assistant for IT infrastructure management.
Provide helpful, accurate responses about AWS services, RMM best practices,
and IT operations. Be concise and actionable."#;

pub const INCIDENT_SYSTEM_PROMPT: &str = r#"You are an expert incident response agent for IT infrastructure.
Analyze the provided metrics and context to determine the root cause of issues.
Be concise, specific, and provide actionable insights."#;

/// Build the root-cause analysis request sent to the model.
///
/// Only anomalous metrics are listed, one summary line each.
pub fn analysis_prompt(prompt: &str, context: &IncidentContext, evidence: &[String]) -> String {
    let (total, running) = context
        .snapshot()
        .map(|s| (s.total_instances.to_string(), s.running_instances.to_string()))
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

    let anomalies = if evidence.is_empty() {
        "No critical anomalies".to_string()
    } else {
        evidence
            .iter()
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Incident Analysis Request:\n{}\n\n\
         System Context:\n\
         - Total instances: {}\n\
         - Running instances: {}\n\n\
         Metrics Anomalies Detected:\n{}\n\n\
         Based on this data, provide:\n\
         1. Most likely root cause\n\
         2. Confidence level (0-1)\n\
         3. Supporting evidence\n\
         4. Potential impact if not resolved",
        prompt, total, running, anomalies
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmm_core::{InventoryReading, InventorySnapshot};

    #[test]
    fn test_analysis_prompt_lists_evidence() {
        let mut context = IncidentContext::new("acme-01", None);
        context.inventory = Some(InventoryReading::Snapshot(InventorySnapshot::from_instances(
            "acme-01",
            vec![],
            None,
        )));

        let evidence = vec!["CPUUtilization: 92.5 (avg: 67.5, severity: critical)".to_string()];
        let prompt = analysis_prompt("High CPU on prod-web-01", &context, &evidence);

        assert!(prompt.starts_with("Incident Analysis Request:\nHigh CPU on prod-web-01\n\n"));
        assert!(prompt.contains("- Total instances: 0\n"));
        assert!(prompt.contains("- CPUUtilization: 92.5 (avg: 67.5, severity: critical)"));
        assert!(prompt.ends_with("4. Potential impact if not resolved"));
    }

    #[test]
    fn test_analysis_prompt_without_inventory() {
        let context = IncidentContext::new("acme-01", None);
        let prompt = analysis_prompt("server down", &context, &[]);
        assert!(prompt.contains("- Total instances: unknown"));
        assert!(prompt.contains("No critical anomalies"));
    }
}
