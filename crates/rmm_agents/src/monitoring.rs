//! Client health checks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use rmm_core::{metric, MetricSample};
use rmm_tools::{tool_names, Toolkit};

/// Overall health of a client's fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    /// The inventory could not be read.
    Error,
}

impl HealthStatus {
    /// Status for a number of anomalous metrics.
    pub fn from_anomalies(count: usize) -> Self {
        match count {
            0 => HealthStatus::Healthy,
            1 => HealthStatus::Warning,
            _ => HealthStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub total_instances: usize,
    pub running_instances: usize,
    pub stopped_instances: usize,
}

/// An anomalous metric found during a health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAnomaly {
    pub metric: String,
    pub value: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub inventory_summary: InventorySummary,
    pub metrics_analyzed: usize,
    pub anomalies: Vec<HealthAnomaly>,
    pub recommendation: String,
    pub tools_used: Vec<String>,
    pub raw_metrics: Vec<MetricSample>,
    pub checked_at: DateTime<Utc>,
}

/// Runs health checks against the running fleet.
pub struct MonitoringAgent {
    toolkit: Toolkit,
    time_range: String,
}

impl MonitoringAgent {
    pub fn new(toolkit: Toolkit) -> Self {
        Self {
            toolkit,
            time_range: "1h".to_string(),
        }
    }

    pub fn with_time_range(mut self, time_range: impl Into<String>) -> Self {
        self.time_range = time_range.into();
        self
    }

    pub async fn check_health(&self, client_id: &str) -> HealthReport {
        let mut tools_used = vec![tool_names::QUERY_CLIENT_INVENTORY.to_string()];

        let snapshot = match self.toolkit.inventory().query(client_id, Some("running")).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(client_id, "Health check aborted, inventory unavailable: {}", e);
                return HealthReport {
                    status: HealthStatus::Error,
                    client_id: client_id.to_string(),
                    message: Some(e.to_string()),
                    inventory_summary: InventorySummary::default(),
                    metrics_analyzed: 0,
                    anomalies: Vec::new(),
                    recommendation: "Inventory unavailable; health could not be assessed.".to_string(),
                    tools_used,
                    raw_metrics: Vec::new(),
                    checked_at: Utc::now(),
                };
            }
        };

        let mut raw_metrics = Vec::new();
        for metric_name in [metric::CPU_UTILIZATION, metric::MEMORY_UTILIZATION] {
            tools_used.push(tool_names::ANALYZE_CLOUDWATCH_METRICS.to_string());
            match self.toolkit.metrics().analyze(client_id, metric_name, &self.time_range).await {
                Ok(sample) => raw_metrics.push(sample),
                Err(e) => warn!(client_id, metric = metric_name, "Metric lookup failed: {}", e),
            }
        }

        let anomalies: Vec<HealthAnomaly> = raw_metrics
            .iter()
            .filter(|s| s.anomaly_detected)
            .map(|s| HealthAnomaly {
                metric: s.metric_name.clone(),
                value: s.current_value,
                recommendation: s.recommendation.clone(),
            })
            .collect();

        let status = HealthStatus::from_anomalies(anomalies.len());
        info!(client_id, status = ?status, anomalies = anomalies.len(), "Health check complete");

        HealthReport {
            status,
            client_id: client_id.to_string(),
            message: None,
            inventory_summary: InventorySummary {
                total_instances: snapshot.total_instances,
                running_instances: snapshot.running_instances,
                stopped_instances: snapshot.stopped_instances,
            },
            metrics_analyzed: raw_metrics.len(),
            recommendation: recommendation(status, &anomalies),
            anomalies,
            tools_used,
            raw_metrics,
            checked_at: Utc::now(),
        }
    }
}

fn recommendation(status: HealthStatus, anomalies: &[HealthAnomaly]) -> String {
    match (status, anomalies.first()) {
        (HealthStatus::Healthy, _) => "All systems operating normally. No action required.".to_string(),
        (HealthStatus::Warning, Some(first)) => format!(
            "Minor issues detected: {}. Consider proactive remediation.",
            first.recommendation
        ),
        (HealthStatus::Critical, _) => format!(
            "Multiple critical issues detected: {}. Immediate remediation recommended.",
            anomalies
                .iter()
                .map(|a| a.recommendation.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        _ => "Health could not be assessed.".to_string(),
    }
}
