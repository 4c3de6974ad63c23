//! Collaborator capability traits and types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rmm_core::{ActionType, InventorySnapshot, MetricSample};

use crate::error::ToolResult;

/// Names recorded in the incident context's tool trail.
pub mod tool_names {
    pub const QUERY_CLIENT_INVENTORY: &str = "query_client_inventory";
    pub const ANALYZE_CLOUDWATCH_METRICS: &str = "analyze_cloudwatch_metrics";
    pub const EXECUTE_REMEDIATION_ACTION: &str = "execute_remediation_action";
}

/// Outcome of an executed remediation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub client_id: String,
    pub instance_id: String,
    pub action_type: ActionType,
    pub execution_id: String,
    pub status: String,
    pub message: String,
    pub commands_executed: Vec<String>,
    pub execution_time_seconds: f64,
    pub executed_at: DateTime<Utc>,
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl ExecutionReport {
    pub fn success(&self) -> bool {
        self.status == "success"
    }
}

/// Instance inventory lookup.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// List a client's instances, optionally filtered by state (e.g. `running`).
    async fn query(&self, client_id: &str, filter_by: Option<&str>) -> ToolResult<InventorySnapshot>;
}

/// Metric statistics and anomaly detection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsService: Send + Sync {
    /// Analyze one metric for a client over a time range such as `1h` or `24h`.
    async fn analyze(
        &self,
        client_id: &str,
        metric_name: &str,
        time_range: &str,
    ) -> ToolResult<MetricSample>;
}

/// Remediation execution.
///
/// Only invoked after a human approved a plan; the pipeline never calls it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemediationExecutor: Send + Sync {
    async fn execute(
        &self,
        client_id: &str,
        instance_id: &str,
        action_type: ActionType,
        parameters: &BTreeMap<String, serde_json::Value>,
    ) -> ToolResult<ExecutionReport>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use mockall::predicate::eq;
    use rmm_core::Severity;

    #[tokio::test]
    async fn test_metrics_trait_object_dispatch() {
        let mut mock = MockMetricsService::new();
        mock.expect_analyze()
            .with(eq("acme-01"), eq("CPUUtilization"), eq("1h"))
            .times(1)
            .returning(|_, metric, range| {
                Ok(MetricSample {
                    metric_name: metric.to_string(),
                    current_value: 91.0,
                    average: 60.0,
                    maximum: 95.0,
                    minimum: 40.0,
                    anomaly_detected: true,
                    severity: Severity::Critical,
                    recommendation: format!("High {} detected", metric),
                    time_range: range.to_string(),
                    data_points: 24,
                    unit: "Percent".to_string(),
                })
            });

        let service: Box<dyn MetricsService> = Box::new(mock);
        let sample = service.analyze("acme-01", "CPUUtilization", "1h").await.unwrap();
        assert!(sample.anomaly_detected);
        assert_eq!(sample.recommendation, "High CPUUtilization detected");
    }

    #[tokio::test]
    async fn test_executor_error_passthrough() {
        let mut mock = MockRemediationExecutor::new();
        mock.expect_execute()
            .returning(|_, _, _, _| Err(ToolError::Execution("ssm rejected command".to_string())));

        let result = mock
            .execute("acme-01", "i-1", ActionType::ClearCache, &BTreeMap::new())
            .await;
        assert_eq!(result, Err(ToolError::Execution("ssm rejected command".to_string())));
    }
}
