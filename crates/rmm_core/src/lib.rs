//! # rmm_core
//!
//! Domain model for the RMM operations agent.
//!
//! This crate holds everything the router, the incident pipeline and the
//! stream sequencer agree on, without any I/O:
//!
//! - **Routing**: keyword table mapping a prompt to a [`Route`]
//! - **Context**: prompts, metric samples, inventory and the incident context
//! - **Remediation**: actions, risk tiers and immutable plans
//! - **Results**: the request/response envelope and stage trace
//! - **Events**: the ordered [`StreamEvent`] contract
//! - **Config**: [`AgentConfig`] loaded from env or a settings file
//!
//! # Example
//!
//! ```rust
//! use rmm_core::{Route, Router};
//!
//! let router = Router::default();
//! assert_eq!(router.classify("Web tier is DOWN"), Route::Incident);
//! assert_eq!(router.classify("What's the weather today?"), Route::General);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod remediation;
pub mod result;
pub mod route;

pub use config::{AgentConfig, ModelProvider};
pub use context::{
    metric, IncidentContext, Instance, InventoryReading, InventorySnapshot, MetricReading,
    MetricSample, Prompt, Severity, INCIDENT_ID_KEY,
};
pub use error::{CoreError, CoreResult};
pub use event::{check_sequence, collect_text, StreamEvent, ToolStatus};
pub use remediation::{ActionType, RemediationAction, RemediationPlan, RiskLevel};
pub use result::{
    GeneralResult, IncidentResult, InvocationResult, Outcome, PipelineStage, RootCause,
    StageRecord, Usage,
};
pub use route::{Route, RouteDecision, RouteRule, RouteTable, Router, INCIDENT_KEYWORDS};
