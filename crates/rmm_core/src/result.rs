//! Results returned to callers of the request/response entry point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::IncidentContext;
use crate::remediation::RemediationPlan;
use crate::route::Route;

/// Root-cause narrative synthesized by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub analysis: String,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub evidence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// The four incident pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ContextGather,
    RootCauseAnalysis,
    RemediationProposal,
    ResponseAssembly,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ContextGather => "context_gather",
            PipelineStage::RootCauseAnalysis => "root_cause_analysis",
            PipelineStage::RemediationProposal => "remediation_proposal",
            PipelineStage::ResponseAssembly => "response_assembly",
        }
    }

    /// Progress label shown while the stage runs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::ContextGather => "Gathering incident context",
            PipelineStage::RootCauseAnalysis => "Determining root cause",
            PipelineStage::RemediationProposal => "Proposing remediation plan",
            PipelineStage::ResponseAssembly => "Assembling response",
        }
    }

    pub fn ordered() -> [PipelineStage; 4] {
        [
            PipelineStage::ContextGather,
            PipelineStage::RootCauseAnalysis,
            PipelineStage::RemediationProposal,
            PipelineStage::ResponseAssembly,
        ]
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timing and outcome for one stage of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StageRecord {
    pub fn started(stage: PipelineStage) -> Self {
        let now = Utc::now();
        Self {
            stage,
            started_at: now,
            completed_at: now,
            ok: true,
            message: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }

    /// Mark the stage as having completed with degraded input.
    pub fn degraded(mut self, message: impl Into<String>) -> Self {
        self.ok = false;
        self.message = Some(message.into());
        self.finish()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}

/// Token accounting reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Output of the incident pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentResult {
    pub status: String,
    pub incident_id: String,
    pub client_id: String,
    pub root_cause: RootCause,
    pub remediation_plan: RemediationPlan,
    pub incident_context: IncidentContext,
    pub requires_approval: bool,
    pub tools_used: Vec<String>,
    pub confidence: f64,
    pub estimated_resolution_time: String,
    /// Rendered report; streaming delivers exactly this text as tokens.
    pub response: String,
    pub stage_trace: Vec<StageRecord>,
}

/// Output of the general conversational route.
#[derive(Debug, Clone, Serialize)]
pub struct GeneralResult {
    pub status: String,
    pub response: String,
    pub model: String,
    pub usage: Usage,
    pub tools_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Incident(Box<IncidentResult>),
    General(GeneralResult),
}

/// Envelope returned by the request/response entry point.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub orchestrator: String,
    pub routed_to: Route,
    pub prompt: String,
    pub client_id: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl InvocationResult {
    pub fn route(&self) -> Route {
        self.routed_to
    }

    pub fn response_text(&self) -> &str {
        match &self.outcome {
            Outcome::Incident(result) => &result.response,
            Outcome::General(result) => &result.response,
        }
    }

    pub fn tools_used(&self) -> &[String] {
        match &self.outcome {
            Outcome::Incident(result) => &result.tools_used,
            Outcome::General(result) => &result.tools_used,
        }
    }

    pub fn incident(&self) -> Option<&IncidentResult> {
        match &self.outcome {
            Outcome::Incident(result) => Some(result),
            Outcome::General(_) => None,
        }
    }

    pub fn incident_id(&self) -> Option<&str> {
        self.incident().map(|r| r.incident_id.as_str())
    }
}
