//! Mock collaborators for testing.
//!
//! [`MockToolkit`] implements all three collaborator traits with fixed,
//! deterministic data. Tests choose which metrics look anomalous, which calls
//! fail and how long lookups take, then inspect the captured calls.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use rmm_core::{metric, ActionType, Instance, InventorySnapshot, MetricSample};

use crate::error::{ToolError, ToolResult};
use crate::service::{ExecutionReport, InventoryService, MetricsService, RemediationExecutor};
use crate::simulated::{command_template, metric_range, sample_from_stats};
use crate::toolkit::Toolkit;

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCall {
    pub method: String,
    pub client_id: String,
    /// Metric name, state filter or instance id, depending on the method.
    pub target: Option<String>,
}

/// Fixed current values for a metric: (normal, anomalous).
fn canned_values(metric_name: &str) -> (f64, f64) {
    match metric_name {
        metric::CPU_UTILIZATION => (55.0, 92.5),
        metric::MEMORY_UTILIZATION => (62.0, 82.0),
        metric::NETWORK_IN => (12_000_000.0, 48_000_000.0),
        metric::DISK_READ_OPS => (120.0, 480.0),
        _ => (50.0, 95.0),
    }
}

/// Deterministic inventory, metrics and executor.
#[derive(Clone, Default)]
pub struct MockToolkit {
    anomalies: Arc<RwLock<HashSet<String>>>,
    values: Arc<RwLock<HashMap<String, f64>>>,
    failing_metrics: Arc<RwLock<HashMap<String, String>>>,
    inventory_failure: Arc<RwLock<Option<String>>>,
    execution_failure: Arc<RwLock<Option<String>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl MockToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the named metric above its anomaly threshold.
    pub fn with_anomaly(self, metric_name: impl Into<String>) -> Self {
        self.anomalies.write().insert(metric_name.into());
        self
    }

    /// Report an explicit current value for a metric.
    pub fn with_value(self, metric_name: impl Into<String>, current: f64) -> Self {
        self.values.write().insert(metric_name.into(), current);
        self
    }

    /// Make lookups of the named metric fail.
    pub fn fail_metric(self, metric_name: impl Into<String>, message: impl Into<String>) -> Self {
        self.failing_metrics.write().insert(metric_name.into(), message.into());
        self
    }

    pub fn fail_inventory(self, message: impl Into<String>) -> Self {
        *self.inventory_failure.write() = Some(message.into());
        self
    }

    pub fn fail_execution(self, message: impl Into<String>) -> Self {
        *self.execution_failure.write() = Some(message.into());
        self
    }

    /// Delay lookups of the named metric.
    pub fn with_delay(self, metric_name: impl Into<String>, delay: Duration) -> Self {
        self.delays.write().insert(metric_name.into(), delay);
        self
    }

    /// Bundle this mock as a [`Toolkit`]; calls stay visible through `self`.
    pub fn toolkit(&self) -> Toolkit {
        Toolkit::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
    }

    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn record_call(&self, method: &str, client_id: &str, target: Option<&str>) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            client_id: client_id.to_string(),
            target: target.map(|t| t.to_string()),
        });
    }

    fn fleet(client_id: &str) -> Vec<Instance> {
        [
            ("i-0a1b2c3d", "web-1", "t3.large", "running"),
            ("i-0e4f5a6b", "web-2", "t3.large", "running"),
            ("i-0c7d8e9f", "db-1", "m5.xlarge", "stopped"),
        ]
        .into_iter()
        .map(|(id, name, kind, status)| {
            let mut tags = HashMap::new();
            tags.insert("ClientId".to_string(), client_id.to_string());
            tags.insert("Environment".to_string(), "Production".to_string());
            Instance {
                instance_id: id.to_string(),
                name: name.to_string(),
                instance_type: kind.to_string(),
                status: status.to_string(),
                availability_zone: "us-east-1a".to_string(),
                cpu_count: 4,
                memory_gb: 16,
                uptime_hours: 240,
                tags,
            }
        })
        .collect()
    }
}

#[async_trait]
impl InventoryService for MockToolkit {
    async fn query(&self, client_id: &str, filter_by: Option<&str>) -> ToolResult<InventorySnapshot> {
        self.record_call("query_inventory", client_id, filter_by);
        if let Some(message) = self.inventory_failure.read().clone() {
            return Err(ToolError::unavailable("inventory", message));
        }

        let instances = Self::fleet(client_id)
            .into_iter()
            .filter(|i| filter_by.map_or(true, |f| i.status == f))
            .collect();
        Ok(InventorySnapshot::from_instances(client_id, instances, filter_by))
    }
}

#[async_trait]
impl MetricsService for MockToolkit {
    async fn analyze(
        &self,
        client_id: &str,
        metric_name: &str,
        time_range: &str,
    ) -> ToolResult<MetricSample> {
        self.record_call("analyze_metric", client_id, Some(metric_name));

        let delay = self.delays.read().get(metric_name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failing_metrics.read().get(metric_name).cloned() {
            return Err(ToolError::unavailable("metrics", message));
        }

        let (min, max) = metric_range(metric_name);
        let (normal, anomalous) = canned_values(metric_name);
        let current = match self.values.read().get(metric_name) {
            Some(value) => *value,
            None if self.anomalies.read().contains(metric_name) => anomalous,
            None => normal,
        };

        Ok(sample_from_stats(
            metric_name,
            time_range,
            current,
            (min + max) / 2.0,
            max,
            min,
            24,
        ))
    }
}

#[async_trait]
impl RemediationExecutor for MockToolkit {
    async fn execute(
        &self,
        client_id: &str,
        instance_id: &str,
        action_type: ActionType,
        parameters: &BTreeMap<String, serde_json::Value>,
    ) -> ToolResult<ExecutionReport> {
        self.record_call("execute_action", client_id, Some(instance_id));
        if let Some(message) = self.execution_failure.read().clone() {
            return Err(ToolError::Execution(message));
        }

        let (message, commands) = command_template(action_type, parameters);
        Ok(ExecutionReport {
            client_id: client_id.to_string(),
            instance_id: instance_id.to_string(),
            action_type,
            execution_id: "exec-000001".to_string(),
            status: "success".to_string(),
            message,
            commands_executed: commands,
            execution_time_seconds: 0.0,
            executed_at: Utc::now(),
            parameters: parameters.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmm_core::Severity;

    #[tokio::test]
    async fn test_mock_metrics_normal_and_anomalous() {
        let mock = MockToolkit::new().with_anomaly(metric::CPU_UTILIZATION);

        let cpu = mock.analyze("acme-01", metric::CPU_UTILIZATION, "1h").await.unwrap();
        assert!(cpu.anomaly_detected);
        assert_eq!(cpu.summary_line(), "CPUUtilization: 92.5 (avg: 67.5, severity: critical)");

        let mem = mock.analyze("acme-01", metric::MEMORY_UTILIZATION, "1h").await.unwrap();
        assert!(!mem.anomaly_detected);
        assert_eq!(mem.severity, Severity::Normal);
    }

    #[tokio::test]
    async fn test_mock_explicit_value() {
        let mock = MockToolkit::new().with_value(metric::DISK_READ_OPS, 499.0);
        let sample = mock.analyze("c", metric::DISK_READ_OPS, "24h").await.unwrap();
        assert!(sample.anomaly_detected);
        assert_eq!(sample.time_range, "24h");
        assert_eq!(sample.unit, "Bytes");
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let mock = MockToolkit::new()
            .fail_inventory("throttled")
            .fail_metric(metric::NETWORK_IN, "no datapoints");

        let err = mock.query("acme-01", None).await.unwrap_err();
        assert_eq!(err, ToolError::unavailable("inventory", "throttled"));

        let err = mock.analyze("acme-01", metric::NETWORK_IN, "1h").await.unwrap_err();
        assert_eq!(err.to_string(), "metrics unavailable: no datapoints");

        assert!(mock.analyze("acme-01", metric::CPU_UTILIZATION, "1h").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_captures_calls() {
        let mock = MockToolkit::new();
        let toolkit = mock.toolkit();

        toolkit.inventory().query("acme-01", Some("running")).await.unwrap();
        toolkit
            .metrics()
            .analyze("acme-01", metric::CPU_UTILIZATION, "1h")
            .await
            .unwrap();

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "query_inventory");
        assert_eq!(calls[0].target.as_deref(), Some("running"));
        assert_eq!(calls[1].target.as_deref(), Some("CPUUtilization"));

        mock.clear_calls();
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_inventory_filter() {
        let mock = MockToolkit::new();
        let all = mock.query("acme-01", None).await.unwrap();
        assert_eq!(all.total_instances, 3);
        assert_eq!(all.running_instances, 2);

        let running = mock.query("acme-01", Some("running")).await.unwrap();
        assert_eq!(running.total_instances, 2);
    }

    #[tokio::test]
    async fn test_mock_execution() {
        let mock = MockToolkit::new();
        let report = mock
            .execute("acme-01", "i-0a1b2c3d", ActionType::ClearCache, &BTreeMap::new())
            .await
            .unwrap();
        assert!(report.success());
        assert_eq!(report.message, "Cache cleared successfully");

        let mock = mock.fail_execution("agent offline");
        let err = mock
            .execute("acme-01", "i-0a1b2c3d", ActionType::ClearCache, &BTreeMap::new())
            .await;
        assert!(matches!(err, Err(ToolError::Execution(_))));
        assert_eq!(mock.get_method_calls("execute_action").len(), 2);
    }
}
