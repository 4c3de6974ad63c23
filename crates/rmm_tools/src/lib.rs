//! # rmm_tools
//!
//! Collaborators the incident pipeline talks to:
//!
//! - [`InventoryService`]: instance inventory per client
//! - [`MetricsService`]: metric statistics with anomaly detection
//! - [`RemediationExecutor`]: runs an approved remediation action
//!
//! Each comes with a seedable simulated implementation for demo mode and a
//! deterministic [`MockToolkit`] for tests.

pub mod error;
pub mod mock;
pub mod service;
pub mod simulated;
pub mod toolkit;

pub use error::{ToolError, ToolResult};
pub use mock::{CapturedCall, MockToolkit};
pub use service::{tool_names, ExecutionReport, InventoryService, MetricsService, RemediationExecutor};
pub use simulated::{
    command_template, sample_from_stats, SimulatedExecutor, SimulatedInventory, SimulatedMetrics,
    ANOMALY_THRESHOLD,
};
pub use toolkit::{Toolkit, DEFAULT_REGION};
