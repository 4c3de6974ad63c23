//! Root-cause synthesis stage.

use tracing::debug;

use rmm_core::{IncidentContext, RootCause};

use crate::llm::{ModelClient, ModelResponse};
use crate::prompts::{analysis_prompt, INCIDENT_SYSTEM_PROMPT};

/// Confidence assigned when no better estimate is available.
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Strategy for scoring a root-cause narrative.
#[cfg_attr(test, mockall::automock)]
pub trait ConfidenceStrategy: Send + Sync {
    fn score(&self, response: &ModelResponse, context: &IncidentContext) -> f64;
}

/// Always reports the same confidence.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f64);

impl Default for FixedConfidence {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE)
    }
}

impl ConfidenceStrategy for FixedConfidence {
    fn score(&self, _response: &ModelResponse, _context: &IncidentContext) -> f64 {
        self.0
    }
}

/// Summary lines for every anomalous sample, in lookup order.
pub fn anomaly_evidence(context: &IncidentContext) -> Vec<String> {
    context
        .samples()
        .filter(|s| s.anomaly_detected)
        .map(|s| s.summary_line())
        .collect()
}

/// Ask the model for a root-cause narrative.
pub async fn analyze_root_cause(
    model: &dyn ModelClient,
    confidence: &dyn ConfidenceStrategy,
    context: &IncidentContext,
    prompt: &str,
) -> RootCause {
    let evidence = anomaly_evidence(context);
    let request = analysis_prompt(prompt, context, &evidence);
    debug!(
        client_id = %context.client_id,
        anomalies = evidence.len(),
        "Requesting root-cause analysis"
    );

    let response = model.invoke(&request, INCIDENT_SYSTEM_PROMPT).await;
    let score = confidence.score(&response, context);

    RootCause {
        analysis: response.content,
        confidence: if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) },
        evidence,
        model_used: Some(response.model),
    }
}
