//! Remediation actions, risk tiers and plans.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Ordinal risk tier. `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Medium and high risk plans need a human to sign off.
    pub fn requires_approval(&self) -> bool {
        matches!(self, RiskLevel::Medium | RiskLevel::High)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of remediation the execution service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RestartService,
    ClearCache,
    Investigate,
    IncreaseMemory,
    UpdatePackage,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::RestartService => "restart_service",
            ActionType::ClearCache => "clear_cache",
            ActionType::Investigate => "investigate",
            ActionType::IncreaseMemory => "increase_memory",
            ActionType::UpdatePackage => "update_package",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "restart_service" => Some(Self::RestartService),
            "clear_cache" => Some(Self::ClearCache),
            "investigate" => Some(Self::Investigate),
            "increase_memory" => Some(Self::IncreaseMemory),
            "update_package" => Some(Self::UpdatePackage),
            _ => None,
        }
    }

    /// Human-readable title, e.g. `Restart Service`.
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single proposed remediation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub target: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub rationale: String,
}

impl RemediationAction {
    pub fn new(action_type: ActionType, target: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            action_type,
            target: target.into(),
            parameters: BTreeMap::new(),
            rationale: rationale.into(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Ordered remediation proposal.
///
/// Immutable once built. Approval is derived from the risk tier and is
/// never stored on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationPlan {
    actions: Vec<RemediationAction>,
    risk: RiskLevel,
    estimated_time: String,
    rollback_available: bool,
}

impl RemediationPlan {
    pub fn new(
        actions: Vec<RemediationAction>,
        risk: RiskLevel,
        estimated_time: impl Into<String>,
        rollback_available: bool,
    ) -> Self {
        Self {
            actions,
            risk,
            estimated_time: estimated_time.into(),
            rollback_available,
        }
    }

    pub fn actions(&self) -> &[RemediationAction] {
        &self.actions
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk
    }

    pub fn estimated_time(&self) -> &str {
        &self.estimated_time
    }

    pub fn rollback_available(&self) -> bool {
        self.rollback_available
    }

    pub fn requires_approval(&self) -> bool {
        self.risk.requires_approval()
    }
}

#[derive(Serialize)]
struct PlanView<'a> {
    actions: &'a [RemediationAction],
    risk: RiskLevel,
    estimated_time: &'a str,
    rollback_available: bool,
    requires_approval: bool,
}

impl Serialize for RemediationPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PlanView {
            actions: &self.actions,
            risk: self.risk,
            estimated_time: &self.estimated_time,
            rollback_available: self.rollback_available,
            requires_approval: self.requires_approval(),
        }
        .serialize(serializer)
    }
}
