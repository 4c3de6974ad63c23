//! Context gathering stage.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use rmm_core::{metric, IncidentContext, InventoryReading, MetricReading, ToolStatus};
use rmm_tools::{tool_names, Toolkit};

use super::ProgressReporter;

/// Keywords that select one metric for analysis.
#[derive(Debug, Clone)]
pub struct MetricRule {
    pub metric_name: String,
    keywords: Vec<String>,
}

impl MetricRule {
    pub fn new<I, S>(metric_name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            metric_name: metric_name.into(),
            keywords: keywords.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }

    /// Substring match against the lowered prompt, as the router does.
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
    }
}

/// Ordered keyword to metric table with a default selection.
#[derive(Debug, Clone)]
pub struct MetricTable {
    rules: Vec<MetricRule>,
    defaults: Vec<String>,
}

impl Default for MetricTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl MetricTable {
    pub fn new(rules: Vec<MetricRule>, defaults: Vec<String>) -> Self {
        Self { rules, defaults }
    }

    pub fn standard() -> Self {
        Self::new(
            vec![
                MetricRule::new(metric::CPU_UTILIZATION, ["cpu", "processor", "high load", "high-load"]),
                MetricRule::new(metric::MEMORY_UTILIZATION, ["memory", "ram", "oom"]),
                MetricRule::new(metric::NETWORK_IN, ["network", "bandwidth", "latency"]),
                MetricRule::new(metric::DISK_READ_OPS, ["disk", "storage", "io"]),
            ],
            vec![
                metric::CPU_UTILIZATION.to_string(),
                metric::MEMORY_UTILIZATION.to_string(),
            ],
        )
    }

    /// Metrics to analyze for a prompt, in table order.
    pub fn select(&self, prompt: &str) -> Vec<String> {
        let lowered = prompt.to_lowercase();
        let selected: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(&lowered))
            .map(|rule| rule.metric_name.clone())
            .collect();

        if selected.is_empty() {
            self.defaults.clone()
        } else {
            selected
        }
    }
}

/// Query inventory, then analyze the selected metrics concurrently.
///
/// Collaborator failures become failed readings. The tool trail records the
/// inventory call first and then one entry per metric in table order,
/// whatever order the lookups finish in.
pub async fn gather_context(
    toolkit: &Toolkit,
    table: &MetricTable,
    prompt: &str,
    client_id: &str,
    incident_id: Option<String>,
    time_range: &str,
    progress: &dyn ProgressReporter,
) -> IncidentContext {
    let mut context = IncidentContext::new(client_id, incident_id);

    progress.report(tool_names::QUERY_CLIENT_INVENTORY, ToolStatus::Running).await;
    let inventory = match toolkit.inventory().query(client_id, None).await {
        Ok(snapshot) => {
            progress.report(tool_names::QUERY_CLIENT_INVENTORY, ToolStatus::Completed).await;
            InventoryReading::Snapshot(snapshot)
        }
        Err(e) => {
            warn!(client_id, "Inventory lookup failed: {}", e);
            progress.report(tool_names::QUERY_CLIENT_INVENTORY, ToolStatus::Failed).await;
            InventoryReading::Failed { error: e.to_string() }
        }
    };
    context.inventory = Some(inventory);
    context.record_tool(tool_names::QUERY_CLIENT_INVENTORY);

    let selected = table.select(prompt);
    debug!(client_id, metrics = ?selected, "Selected metrics");

    for _ in &selected {
        progress.report(tool_names::ANALYZE_CLOUDWATCH_METRICS, ToolStatus::Running).await;
    }

    let mut lookups: FuturesUnordered<_> = selected
        .iter()
        .enumerate()
        .map(|(index, metric_name)| async move {
            let result = toolkit.metrics().analyze(client_id, metric_name, time_range).await;
            (index, result)
        })
        .collect();

    let mut slots: Vec<Option<MetricReading>> = vec![None; selected.len()];
    while let Some((index, result)) = lookups.next().await {
        let metric_name = &selected[index];
        let reading = match result {
            Ok(sample) => {
                progress.report(tool_names::ANALYZE_CLOUDWATCH_METRICS, ToolStatus::Completed).await;
                MetricReading::Sampled(sample)
            }
            Err(e) => {
                warn!(client_id, metric = %metric_name, "Metric lookup failed: {}", e);
                progress.report(tool_names::ANALYZE_CLOUDWATCH_METRICS, ToolStatus::Failed).await;
                MetricReading::Failed {
                    metric_name: metric_name.clone(),
                    error: e.to_string(),
                }
            }
        };
        slots[index] = Some(reading);
    }

    for (metric_name, slot) in selected.iter().zip(slots) {
        context.metrics.push(slot.unwrap_or_else(|| MetricReading::Failed {
            metric_name: metric_name.clone(),
            error: "lookup did not complete".to_string(),
        }));
        context.record_tool(tool_names::ANALYZE_CLOUDWATCH_METRICS);
    }

    context
}
