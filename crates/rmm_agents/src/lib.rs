//! # rmm_agents
//!
//! Request routing, the incident pipeline and event streaming for the RMM
//! operations agent.
//!
//! ## Architecture
//!
//! ```text
//! prompt ──▶ Router ──┬──▶ IncidentPipeline ──┐
//!                     │   (gather → root cause │
//!                     │    → remediation       ├──▶ InvocationResult
//!                     │    → assembly)         │        or
//!                     └──▶ GeneralQueryHandler ┘    InvocationStream
//! ```
//!
//! - [`Orchestrator`]: request/response and streaming entry points
//! - [`IncidentPipeline`]: the four-stage incident analysis
//! - [`StreamEmitter`]: ordered event delivery with cancellation
//! - [`LlmAdapter`]: model collaborator with degraded fallback
//! - [`MonitoringAgent`]: fleet health checks
//! - [`ScriptedModel`]: deterministic model for tests

pub mod error;
pub mod general;
pub mod llm;
pub mod monitoring;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod scripted;
pub mod stream;

pub use error::{AgentError, AgentResult};
pub use general::GeneralQueryHandler;
pub use llm::{
    canned_stream, LlmAdapter, ModelClient, ModelResponse, ModelStream, ModelStreamEvent,
    DEFAULT_STOP_REASON,
};
pub use monitoring::{HealthAnomaly, HealthReport, HealthStatus, InventorySummary, MonitoringAgent};
pub use orchestrator::{Orchestrator, ORCHESTRATOR_NAME};
pub use pipeline::{
    ConfidenceStrategy, FixedConfidence, IncidentIdGenerator, IncidentPipeline, MetricRule,
    MetricTable, NoProgress, ProgressReporter, RandomIncidentIds, RemediationRule,
    RemediationRules, SeededIncidentIds,
};
pub use report::{format_incident_report, tokenize};
pub use scripted::{ModelCall, ScriptedModel};
pub use stream::{InvocationStream, StreamEmitter, CANCELLED_MESSAGE};
