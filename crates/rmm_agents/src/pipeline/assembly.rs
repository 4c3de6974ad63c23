//! Response assembly stage.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rmm_core::{IncidentContext, IncidentResult, RemediationPlan, RootCause, StageRecord};

use crate::report::format_incident_report;

/// Source of incident identifiers.
pub trait IncidentIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

fn format_id(n: u32) -> String {
    format!("INC-{:08}", n)
}

/// `INC-` followed by eight random digits.
#[derive(Debug, Default)]
pub struct RandomIncidentIds;

impl IncidentIdGenerator for RandomIncidentIds {
    fn next_id(&self) -> String {
        format_id(rand::thread_rng().gen_range(10_000_000..=99_999_999))
    }
}

/// Reproducible identifier sequence.
#[derive(Debug)]
pub struct SeededIncidentIds {
    rng: Mutex<StdRng>,
}

impl SeededIncidentIds {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IncidentIdGenerator for SeededIncidentIds {
    fn next_id(&self) -> String {
        format_id(self.rng.lock().gen_range(10_000_000..=99_999_999))
    }
}

/// Merge the stage outputs into the final result.
///
/// Uses the context's incident id when the caller supplied one.
pub fn assemble_response(
    context: IncidentContext,
    root_cause: RootCause,
    plan: RemediationPlan,
    ids: &dyn IncidentIdGenerator,
    stage_trace: Vec<StageRecord>,
) -> IncidentResult {
    let incident_id = context.incident_id.clone().unwrap_or_else(|| ids.next_id());
    let response = format_incident_report(&incident_id, &root_cause, &plan);

    let mut context = context;
    context.incident_id = Some(incident_id.clone());

    IncidentResult {
        status: "analyzed".to_string(),
        client_id: context.client_id.clone(),
        tools_used: context.tools_invoked().to_vec(),
        requires_approval: plan.requires_approval(),
        confidence: root_cause.confidence,
        estimated_resolution_time: plan.estimated_time().to_string(),
        incident_id,
        root_cause,
        remediation_plan: plan,
        incident_context: context,
        response,
        stage_trace,
    }
}
