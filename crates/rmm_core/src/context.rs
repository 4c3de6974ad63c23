//! Invocation inputs and the incident context gathered for a pipeline run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Metric names understood by the metrics collaborator.
pub mod metric {
    pub const CPU_UTILIZATION: &str = "CPUUtilization";
    pub const MEMORY_UTILIZATION: &str = "MemoryUtilization";
    pub const NETWORK_IN: &str = "NetworkIn";
    pub const DISK_READ_OPS: &str = "DiskReadOps";
}

/// Context key carrying a caller-assigned incident id.
pub const INCIDENT_ID_KEY: &str = "incident_id";

/// A natural-language request entering the system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            client_id: None,
            context: HashMap::new(),
        }
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Reject missing or blank prompt text.
    pub fn validate(&self) -> CoreResult<()> {
        if self.text.trim().is_empty() {
            return Err(CoreError::InvalidInput("prompt must not be empty".to_string()));
        }
        Ok(())
    }

    /// Client id, or the supplied default when the caller gave none.
    pub fn client_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.client_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => default,
        }
    }

    /// Incident id supplied by the caller through the context map.
    pub fn incident_id(&self) -> Option<String> {
        self.context
            .get(INCIDENT_ID_KEY)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }
}

/// Severity attached to a metric sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics for one metric over the analyzed time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_name: String,
    pub current_value: f64,
    pub average: f64,
    pub maximum: f64,
    pub minimum: f64,
    pub anomaly_detected: bool,
    pub severity: Severity,
    pub recommendation: String,
    #[serde(default)]
    pub time_range: String,
    #[serde(default)]
    pub data_points: u32,
    #[serde(default)]
    pub unit: String,
}

impl MetricSample {
    /// Summary line used as root-cause evidence.
    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} (avg: {}, severity: {})",
            self.metric_name,
            format_reading(self.current_value),
            format_reading(self.average),
            self.severity
        )
    }
}

/// Whole readings keep one decimal place (`92.0`), others print as-is.
fn format_reading(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Result of one metrics lookup. Failures are kept, not dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricReading {
    Sampled(MetricSample),
    Failed { metric_name: String, error: String },
}

impl MetricReading {
    pub fn metric_name(&self) -> &str {
        match self {
            MetricReading::Sampled(sample) => &sample.metric_name,
            MetricReading::Failed { metric_name, .. } => metric_name,
        }
    }

    pub fn sample(&self) -> Option<&MetricSample> {
        match self {
            MetricReading::Sampled(sample) => Some(sample),
            MetricReading::Failed { .. } => None,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.sample().map(|s| s.anomaly_detected).unwrap_or(false)
    }
}

/// A managed compute instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub status: String,
    pub availability_zone: String,
    pub cpu_count: u32,
    pub memory_gb: u32,
    #[serde(default)]
    pub uptime_hours: u32,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Inventory of a client's instances at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub client_id: String,
    pub total_instances: usize,
    pub running_instances: usize,
    pub stopped_instances: usize,
    pub instances: Vec<Instance>,
    pub filter_applied: String,
    pub retrieved_at: DateTime<Utc>,
}

impl InventorySnapshot {
    /// Build a snapshot, deriving the totals from the instance list.
    pub fn from_instances(
        client_id: impl Into<String>,
        instances: Vec<Instance>,
        filter: Option<&str>,
    ) -> Self {
        let running = instances.iter().filter(|i| i.status == "running").count();
        let stopped = instances.iter().filter(|i| i.status == "stopped").count();
        Self {
            client_id: client_id.into(),
            total_instances: instances.len(),
            running_instances: running,
            stopped_instances: stopped,
            instances,
            filter_applied: filter.unwrap_or("none").to_string(),
            retrieved_at: Utc::now(),
        }
    }
}

/// Result of the inventory lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InventoryReading {
    Snapshot(InventorySnapshot),
    Failed { error: String },
}

impl InventoryReading {
    pub fn snapshot(&self) -> Option<&InventorySnapshot> {
        match self {
            InventoryReading::Snapshot(s) => Some(s),
            InventoryReading::Failed { .. } => None,
        }
    }
}

/// Everything gathered about an incident before analysis.
///
/// Owned by a single pipeline run. The tool trail is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentContext {
    pub incident_id: Option<String>,
    pub client_id: String,
    pub inventory: Option<InventoryReading>,
    pub metrics: Vec<MetricReading>,
    tools_invoked: Vec<String>,
}

impl IncidentContext {
    pub fn new(client_id: impl Into<String>, incident_id: Option<String>) -> Self {
        Self {
            incident_id,
            client_id: client_id.into(),
            inventory: None,
            metrics: Vec::new(),
            tools_invoked: Vec::new(),
        }
    }

    /// Append a collaborator call to the audit trail.
    pub fn record_tool(&mut self, name: impl Into<String>) {
        self.tools_invoked.push(name.into());
    }

    pub fn tools_invoked(&self) -> &[String] {
        &self.tools_invoked
    }

    /// Successfully sampled metrics, in lookup order.
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.metrics.iter().filter_map(|m| m.sample())
    }

    /// Whether the named metric was sampled and flagged anomalous.
    pub fn is_anomalous(&self, metric_name: &str) -> bool {
        self.metrics
            .iter()
            .any(|m| m.metric_name() == metric_name && m.is_anomalous())
    }

    pub fn has_anomaly(&self) -> bool {
        self.metrics.iter().any(|m| m.is_anomalous())
    }

    pub fn snapshot(&self) -> Option<&InventorySnapshot> {
        self.inventory.as_ref().and_then(|i| i.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(name: &str, anomalous: bool) -> MetricSample {
        MetricSample {
            metric_name: name.to_string(),
            current_value: 92.5,
            average: 67.5,
            maximum: 95.0,
            minimum: 40.0,
            anomaly_detected: anomalous,
            severity: if anomalous { Severity::Critical } else { Severity::Normal },
            recommendation: String::new(),
            time_range: "1h".to_string(),
            data_points: 24,
            unit: "Percent".to_string(),
        }
    }

    #[test]
    fn test_prompt_validation() {
        assert!(Prompt::new("disk is full").validate().is_ok());
        assert!(matches!(Prompt::new("   ").validate(), Err(CoreError::InvalidInput(_))));
        assert!(Prompt::new("").validate().is_err());
    }

    #[test]
    fn test_prompt_client_default() {
        let prompt = Prompt::new("hi");
        assert_eq!(prompt.client_or("demo-client-001"), "demo-client-001");

        let prompt = Prompt::new("hi").with_client("acme-01");
        assert_eq!(prompt.client_or("demo-client-001"), "acme-01");
    }

    #[test]
    fn test_prompt_incident_id_from_context() {
        let prompt = Prompt::new("hi").with_context(INCIDENT_ID_KEY, json!("INC-42"));
        assert_eq!(prompt.incident_id(), Some("INC-42".to_string()));

        let prompt = Prompt::new("hi").with_context(INCIDENT_ID_KEY, json!(42));
        assert_eq!(prompt.incident_id(), None);
    }

    #[test]
    fn test_summary_line_format() {
        let line = sample(metric::CPU_UTILIZATION, true).summary_line();
        assert_eq!(line, "CPUUtilization: 92.5 (avg: 67.5, severity: critical)");
    }

    #[test]
    fn test_summary_line_keeps_decimal_on_whole_values() {
        let mut s = sample(metric::DISK_READ_OPS, false);
        s.current_value = 92.0;
        s.average = 250.0;
        assert_eq!(s.summary_line(), "DiskReadOps: 92.0 (avg: 250.0, severity: normal)");

        s.current_value = 0.125;
        assert!(s.summary_line().starts_with("DiskReadOps: 0.125 "));
    }

    #[test]
    fn test_context_anomaly_lookup() {
        let mut ctx = IncidentContext::new("acme-01", None);
        ctx.metrics.push(MetricReading::Sampled(sample(metric::CPU_UTILIZATION, true)));
        ctx.metrics.push(MetricReading::Failed {
            metric_name: metric::MEMORY_UTILIZATION.to_string(),
            error: "timeout".to_string(),
        });

        assert!(ctx.is_anomalous(metric::CPU_UTILIZATION));
        assert!(!ctx.is_anomalous(metric::MEMORY_UTILIZATION));
        assert!(ctx.has_anomaly());
        assert_eq!(ctx.samples().count(), 1);
    }

    #[test]
    fn test_tool_trail_is_ordered() {
        let mut ctx = IncidentContext::new("acme-01", None);
        ctx.record_tool("query_client_inventory");
        ctx.record_tool("analyze_cloudwatch_metrics");
        assert_eq!(
            ctx.tools_invoked(),
            &["query_client_inventory".to_string(), "analyze_cloudwatch_metrics".to_string()]
        );
    }

    #[test]
    fn test_inventory_totals() {
        let instance = |status: &str| Instance {
            instance_id: "i-1".to_string(),
            name: "server-1".to_string(),
            instance_type: "t3.medium".to_string(),
            status: status.to_string(),
            availability_zone: "us-east-1a".to_string(),
            cpu_count: 2,
            memory_gb: 8,
            uptime_hours: 10,
            tags: HashMap::new(),
        };
        let snapshot = InventorySnapshot::from_instances(
            "acme-01",
            vec![instance("running"), instance("stopped"), instance("running")],
            None,
        );
        assert_eq!(snapshot.total_instances, 3);
        assert_eq!(snapshot.running_instances, 2);
        assert_eq!(snapshot.stopped_instances, 1);
        assert_eq!(snapshot.filter_applied, "none");
    }
}
