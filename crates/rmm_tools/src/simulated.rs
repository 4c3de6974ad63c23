//! Simulated collaborators for demo mode.
//!
//! These produce plausible inventory, metrics and execution reports without
//! any cloud access. Every simulator takes an optional seed so runs can be
//! reproduced.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use rmm_core::{metric, ActionType, Instance, InventorySnapshot, MetricSample, Severity};

use crate::error::{ToolError, ToolResult};
use crate::service::{ExecutionReport, InventoryService, MetricsService, RemediationExecutor};

/// A sample is anomalous when its current value exceeds this fraction of the maximum.
pub const ANOMALY_THRESHOLD: f64 = 0.9;

fn rng_from(seed: Option<u64>) -> Mutex<StdRng> {
    Mutex::new(match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Expected value range for a metric.
pub(crate) fn metric_range(metric_name: &str) -> (f64, f64) {
    match metric_name {
        metric::CPU_UTILIZATION => (40.0, 95.0),
        metric::MEMORY_UTILIZATION => (50.0, 85.0),
        metric::NETWORK_IN => (1_000_000.0, 50_000_000.0),
        metric::DISK_READ_OPS => (10.0, 500.0),
        _ => (10.0, 100.0),
    }
}

fn metric_unit(metric_name: &str) -> &'static str {
    if metric_name.contains("Utilization") {
        "Percent"
    } else {
        "Bytes"
    }
}

/// Build a sample from raw statistics, flagging anomalies against the maximum.
pub fn sample_from_stats(
    metric_name: &str,
    time_range: &str,
    current: f64,
    average: f64,
    maximum: f64,
    minimum: f64,
    data_points: u32,
) -> MetricSample {
    let anomalous = current > maximum * ANOMALY_THRESHOLD;
    MetricSample {
        metric_name: metric_name.to_string(),
        current_value: round2(current),
        average: round2(average),
        maximum: round2(maximum),
        minimum: round2(minimum),
        anomaly_detected: anomalous,
        severity: if anomalous { Severity::Critical } else { Severity::Normal },
        recommendation: if anomalous {
            format!("High {} detected", metric_name)
        } else {
            "Operating normally".to_string()
        },
        time_range: time_range.to_string(),
        data_points,
        unit: metric_unit(metric_name).to_string(),
    }
}

/// Random metrics within per-metric ranges.
pub struct SimulatedMetrics {
    rng: Mutex<StdRng>,
}

impl SimulatedMetrics {
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: rng_from(seed) }
    }
}

#[async_trait]
impl MetricsService for SimulatedMetrics {
    async fn analyze(
        &self,
        client_id: &str,
        metric_name: &str,
        time_range: &str,
    ) -> ToolResult<MetricSample> {
        if metric_name.is_empty() {
            return Err(ToolError::InvalidRequest("metric name is required".to_string()));
        }
        let (min, max) = metric_range(metric_name);
        let current = self.rng.lock().gen_range(min..max);
        debug!(client_id, metric_name, current, "Simulated metric sample");
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

const INSTANCE_TYPES: &[&str] = &["t3.medium", "t3.large", "m5.xlarge", "c5.2xlarge"];
const STATUSES: &[&str] = &["running", "stopped", "running", "running", "running"];
const ENVIRONMENTS: &[&str] = &["Production", "Staging", "Development"];
const APPLICATIONS: &[&str] = &["WebServer", "Database", "AppServer"];

/// Random fleet of three to eight instances.
pub struct SimulatedInventory {
    region: String,
    rng: Mutex<StdRng>,
}

impl SimulatedInventory {
    pub fn new(region: impl Into<String>, seed: Option<u64>) -> Self {
        Self {
            region: region.into(),
            rng: rng_from(seed),
        }
    }
}

#[async_trait]
impl InventoryService for SimulatedInventory {
    async fn query(&self, client_id: &str, filter_by: Option<&str>) -> ToolResult<InventorySnapshot> {
        let filter = filter_by.map(|f| f.to_lowercase());
        let mut rng = self.rng.lock();
        let count = rng.gen_range(3..=8);

        let mut instances = Vec::with_capacity(count);
        for i in 0..count {
            let status = *STATUSES.choose(&mut *rng).unwrap_or(&"running");
            if let Some(ref f) = filter {
                if !status.contains(f.as_str()) {
                    continue;
                }
            }

            let mut tags = HashMap::new();
            tags.insert(
                "Environment".to_string(),
                ENVIRONMENTS.choose(&mut *rng).unwrap_or(&"Production").to_string(),
            );
            tags.insert(
                "Application".to_string(),
                APPLICATIONS.choose(&mut *rng).unwrap_or(&"WebServer").to_string(),
            );
            tags.insert("ClientId".to_string(), client_id.to_string());

            instances.push(Instance {
                instance_id: format!("i-{:08x}", rng.gen_range(10_000_000u32..99_999_999)),
                name: format!("server-{}", i + 1),
                instance_type: INSTANCE_TYPES.choose(&mut *rng).unwrap_or(&"t3.medium").to_string(),
                status: status.to_string(),
                availability_zone: format!("{}a", self.region),
                cpu_count: *[2u32, 4, 8].choose(&mut *rng).unwrap_or(&2),
                memory_gb: *[8u32, 16, 32].choose(&mut *rng).unwrap_or(&8),
                uptime_hours: rng.gen_range(1..=720),
                tags,
            });
        }

        debug!(client_id, count = instances.len(), "Simulated inventory");
        Ok(InventorySnapshot::from_instances(client_id, instances, filter_by))
    }
}

/// Pretends to run remediation commands.
pub struct SimulatedExecutor {
    rng: Mutex<StdRng>,
    /// Upper bound of the simulated execution delay.
    max_delay: Duration,
}

impl SimulatedExecutor {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: rng_from(seed),
            max_delay: Duration::from_millis(500),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

fn param_str<'a>(parameters: &'a BTreeMap<String, serde_json::Value>, key: &str, default: &'a str) -> String {
    parameters
        .get(key)
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| default.to_string())
}

/// Message and commands a remediation action would run.
pub fn command_template(
    action_type: ActionType,
    parameters: &BTreeMap<String, serde_json::Value>,
) -> (String, Vec<String>) {
    match action_type {
        ActionType::RestartService => {
            let service = param_str(parameters, "service_name", "httpd");
            (
                format!("Service '{}' restarted successfully", service),
                vec![format!("sudo systemctl restart {}", service)],
            )
        }
        ActionType::ClearCache => (
            "Cache cleared successfully".to_string(),
            vec!["sudo sync && echo 3 | sudo tee /proc/sys/vm/drop_caches".to_string()],
        ),
        ActionType::IncreaseMemory => (
            "Memory allocation increased".to_string(),
            vec![format!(
                "sudo service resize-memory {}",
                param_str(parameters, "new_size_gb", "16")
            )],
        ),
        ActionType::UpdatePackage => {
            let package = param_str(parameters, "package_name", "nginx");
            (
                format!("Package '{}' updated", package),
                vec![format!("sudo yum update -y {}", package)],
            )
        }
        other => (
            format!("Action '{}' executed", other),
            vec!["generic command".to_string()],
        ),
    }
}

#[async_trait]
impl RemediationExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        client_id: &str,
        instance_id: &str,
        action_type: ActionType,
        parameters: &BTreeMap<String, serde_json::Value>,
    ) -> ToolResult<ExecutionReport> {
        if instance_id.is_empty() {
            return Err(ToolError::InvalidRequest("instance id is required".to_string()));
        }

        let (delay, execution_id) = {
            let mut rng = self.rng.lock();
            let max_ms = self.max_delay.as_millis().max(1) as u64;
            (
                Duration::from_millis(rng.gen_range(0..=max_ms)),
                format!("exec-{}", rng.gen_range(100_000..=999_999)),
            )
        };
        tokio::time::sleep(delay).await;

        let (message, commands) = command_template(action_type, parameters);
        Ok(ExecutionReport {
            client_id: client_id.to_string(),
            instance_id: instance_id.to_string(),
            action_type,
            execution_id,
            status: "success".to_string(),
            message,
            commands_executed: commands,
            execution_time_seconds: round2(delay.as_secs_f64()),
            executed_at: Utc::now(),
            parameters: parameters.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_threshold() {
        let sample = sample_from_stats("CPUUtilization", "1h", 90.0, 67.5, 95.0, 40.0, 24);
        assert!(sample.anomaly_detected);
        assert_eq!(sample.severity, Severity::Critical);
        assert_eq!(sample.recommendation, "High CPUUtilization detected");
        assert_eq!(sample.unit, "Percent");

        let sample = sample_from_stats("CPUUtilization", "1h", 85.0, 67.5, 95.0, 40.0, 24);
        assert!(!sample.anomaly_detected);
        assert_eq!(sample.recommendation, "Operating normally");
    }

    #[tokio::test]
    async fn test_simulated_metrics_within_range() {
        let metrics = SimulatedMetrics::new(Some(7));
        for _ in 0..20 {
            let sample = metrics.analyze("acme-01", "MemoryUtilization", "1h").await.unwrap();
            assert!(sample.current_value >= 50.0 && sample.current_value <= 85.0);
            assert_eq!(sample.maximum, 85.0);
            assert_eq!(sample.average, 67.5);
        }
    }

    #[tokio::test]
    async fn test_seeded_metrics_are_reproducible() {
        let a = SimulatedMetrics::new(Some(42));
        let b = SimulatedMetrics::new(Some(42));
        let sa = a.analyze("c", "CPUUtilization", "1h").await.unwrap();
        let sb = b.analyze("c", "CPUUtilization", "1h").await.unwrap();
        assert_eq!(sa, sb);
    }

    #[tokio::test]
    async fn test_simulated_inventory_filter() {
        let inventory = SimulatedInventory::new("us-east-1", Some(3));
        let snapshot = inventory.query("acme-01", Some("running")).await.unwrap();
        assert!(snapshot.instances.iter().all(|i| i.status == "running"));
        assert_eq!(snapshot.stopped_instances, 0);
        assert_eq!(snapshot.filter_applied, "running");
        assert!(snapshot.instances.iter().all(|i| i.availability_zone == "us-east-1a"));
    }

    #[tokio::test]
    async fn test_simulated_inventory_counts() {
        let inventory = SimulatedInventory::new("us-east-1", Some(11));
        let snapshot = inventory.query("acme-01", None).await.unwrap();
        assert!((3..=8).contains(&snapshot.total_instances));
        assert_eq!(
            snapshot.running_instances + snapshot.stopped_instances,
            snapshot.total_instances
        );
    }

    #[tokio::test]
    async fn test_simulated_executor_templates() {
        let executor = SimulatedExecutor::new(Some(1)).with_max_delay(Duration::from_millis(1));
        let mut params = BTreeMap::new();
        params.insert("service_name".to_string(), serde_json::json!("nginx"));

        let report = executor
            .execute("acme-01", "i-0abc", ActionType::RestartService, &params)
            .await
            .unwrap();
        assert!(report.success());
        assert_eq!(report.message, "Service 'nginx' restarted successfully");
        assert_eq!(report.commands_executed, vec!["sudo systemctl restart nginx"]);
        assert!(report.execution_id.starts_with("exec-"));

        let err = executor
            .execute("acme-01", "", ActionType::ClearCache, &BTreeMap::new())
            .await;
        assert!(matches!(err, Err(ToolError::InvalidRequest(_))));
    }
}
