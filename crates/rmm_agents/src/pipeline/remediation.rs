//! Remediation proposal stage.
//!
//! A pure rule table over the anomaly flags of the gathered context. Every
//! triggered rule contributes one action and a risk tier; the plan's risk is
//! the highest contribution. When no metric is anomalous the plan falls back
//! to a single investigation step.

use serde_json::json;

use rmm_core::{
    metric, ActionType, IncidentContext, RemediationAction, RemediationPlan, RiskLevel, RootCause,
};

/// Default resolution estimate for generated plans.
pub const DEFAULT_ESTIMATED_TIME: &str = "10 minutes";

/// One `anomalous metric -> action` rule.
#[derive(Debug, Clone)]
pub struct RemediationRule {
    pub metric_name: String,
    pub action: RemediationAction,
    pub risk: RiskLevel,
}

impl RemediationRule {
    pub fn new(metric_name: impl Into<String>, action: RemediationAction, risk: RiskLevel) -> Self {
        Self {
            metric_name: metric_name.into(),
            action,
            risk,
        }
    }
}

/// Ordered rule table plus the no-anomaly fallback.
#[derive(Debug, Clone)]
pub struct RemediationRules {
    rules: Vec<RemediationRule>,
    fallback: RemediationAction,
    estimated_time: String,
}

impl Default for RemediationRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl RemediationRules {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                RemediationRule::new(
                    metric::CPU_UTILIZATION,
                    RemediationAction::new(
                        ActionType::RestartService,
                        "application_server",
                        "High CPU detected, service restart may clear memory leak",
                    )
                    .with_parameter("service_name", json!("httpd")),
                    RiskLevel::Low,
                ),
                RemediationRule::new(
                    metric::MEMORY_UTILIZATION,
                    RemediationAction::new(
                        ActionType::ClearCache,
                        "system",
                        "High memory usage, clearing cache may free resources",
                    ),
                    RiskLevel::Low,
                ),
            ],
            fallback: RemediationAction::new(
                ActionType::Investigate,
                "system_logs",
                "No clear automated fix, manual investigation recommended",
            ),
            estimated_time: DEFAULT_ESTIMATED_TIME.to_string(),
        }
    }

    /// Append a rule; it is evaluated after the existing ones.
    pub fn register(&mut self, rule: RemediationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[RemediationRule] {
        &self.rules
    }

    /// Build the plan for a context.
    pub fn propose(&self, _root_cause: &RootCause, context: &IncidentContext) -> RemediationPlan {
        let triggered: Vec<&RemediationRule> = self
            .rules
            .iter()
            .filter(|rule| context.is_anomalous(&rule.metric_name))
            .collect();

        if triggered.is_empty() {
            return RemediationPlan::new(
                vec![self.fallback.clone()],
                RiskLevel::None,
                self.estimated_time.clone(),
                true,
            );
        }

        let risk = triggered.iter().map(|r| r.risk).max().unwrap_or_default();
        let actions = triggered.into_iter().map(|r| r.action.clone()).collect();
        RemediationPlan::new(actions, risk, self.estimated_time.clone(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmm_core::{MetricReading, MetricSample, Severity};

    fn context_with(anomalies: &[&str]) -> IncidentContext {
        let mut context = IncidentContext::new("acme-01", None);
        for name in [metric::CPU_UTILIZATION, metric::MEMORY_UTILIZATION] {
            let anomalous = anomalies.contains(&name);
            context.metrics.push(MetricReading::Sampled(MetricSample {
                metric_name: name.to_string(),
                current_value: if anomalous { 93.0 } else { 50.0 },
                average: 60.0,
                maximum: 95.0,
                minimum: 40.0,
                anomaly_detected: anomalous,
                severity: if anomalous { Severity::Critical } else { Severity::Normal },
                recommendation: String::new(),
                time_range: "1h".to_string(),
                data_points: 24,
                unit: "Percent".to_string(),
            }));
        }
        context
    }

    fn root_cause() -> RootCause {
        RootCause {
            analysis: String::new(),
            confidence: 0.85,
            evidence: vec![],
            model_used: None,
        }
    }

    fn action_types(plan: &RemediationPlan) -> Vec<ActionType> {
        plan.actions().iter().map(|a| a.action_type).collect()
    }

    #[test]
    fn test_cpu_anomaly_restarts_service() {
        let plan = RemediationRules::standard().propose(&root_cause(), &context_with(&[metric::CPU_UTILIZATION]));
        assert_eq!(action_types(&plan), vec![ActionType::RestartService]);
        assert_eq!(plan.actions()[0].target, "application_server");
        assert_eq!(plan.actions()[0].parameters["service_name"], "httpd");
        assert_eq!(plan.risk(), RiskLevel::Low);
        assert!(!plan.requires_approval());
    }

    #[test]
    fn test_memory_anomaly_clears_cache() {
        let plan = RemediationRules::standard().propose(&root_cause(), &context_with(&[metric::MEMORY_UTILIZATION]));
        assert_eq!(action_types(&plan), vec![ActionType::ClearCache]);
        assert_eq!(plan.risk(), RiskLevel::Low);
    }

    #[test]
    fn test_both_anomalies_accumulate() {
        let plan = RemediationRules::standard().propose(
            &root_cause(),
            &context_with(&[metric::CPU_UTILIZATION, metric::MEMORY_UTILIZATION]),
        );
        assert_eq!(action_types(&plan), vec![ActionType::RestartService, ActionType::ClearCache]);
        assert_eq!(plan.risk(), RiskLevel::Low);
        assert!(!plan.requires_approval());
    }

    #[test]
    fn test_no_anomaly_investigates() {
        let plan = RemediationRules::standard().propose(&root_cause(), &context_with(&[]));
        assert_eq!(action_types(&plan), vec![ActionType::Investigate]);
        assert_eq!(plan.actions()[0].target, "system_logs");
        assert_eq!(plan.risk(), RiskLevel::None);
        assert_eq!(plan.estimated_time(), "10 minutes");
        assert!(plan.rollback_available());
    }

    #[test]
    fn test_default_rules_never_require_approval() {
        let rules = RemediationRules::standard();
        for anomalies in [
            &[][..],
            &[metric::CPU_UTILIZATION][..],
            &[metric::MEMORY_UTILIZATION][..],
            &[metric::CPU_UTILIZATION, metric::MEMORY_UTILIZATION][..],
        ] {
            let plan = rules.propose(&root_cause(), &context_with(anomalies));
            assert!(!plan.requires_approval());
        }
    }

    #[test]
    fn test_registered_rule_raises_risk() {
        let mut rules = RemediationRules::standard();
        rules.register(RemediationRule::new(
            metric::DISK_READ_OPS,
            RemediationAction::new(ActionType::IncreaseMemory, "db-1", "I/O bound"),
            RiskLevel::High,
        ));

        let mut context = context_with(&[metric::CPU_UTILIZATION]);
        context.metrics.push(MetricReading::Sampled(MetricSample {
            metric_name: metric::DISK_READ_OPS.to_string(),
            current_value: 480.0,
            average: 255.0,
            maximum: 500.0,
            minimum: 10.0,
            anomaly_detected: true,
            severity: Severity::Critical,
            recommendation: String::new(),
            time_range: "1h".to_string(),
            data_points: 24,
            unit: "Bytes".to_string(),
        }));

        let plan = rules.propose(&root_cause(), &context);
        assert_eq!(plan.actions().len(), 2);
        assert_eq!(plan.risk(), RiskLevel::High);
        assert!(plan.requires_approval());
    }
}
