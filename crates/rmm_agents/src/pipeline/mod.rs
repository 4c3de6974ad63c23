//! Incident pipeline.
//!
//! Four strictly sequential stages, each consuming the previous one's output:
//!
//! 1. [`gather_context`]: inventory plus selected metrics
//! 2. [`analyze_root_cause`]: model narrative with a confidence score
//! 3. [`RemediationRules::propose`]: rule-table remediation plan
//! 4. [`assemble_response`]: final result and rendered report
//!
//! Cancellation is checked before every stage and raced against every
//! collaborator call.

mod assembly;
mod gather;
mod remediation;
mod root_cause;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rmm_core::{CoreError, IncidentResult, PipelineStage, Prompt, StageRecord, ToolStatus};
use rmm_tools::Toolkit;

use crate::error::AgentResult;
use crate::llm::ModelClient;

pub use assembly::{assemble_response, IncidentIdGenerator, RandomIncidentIds, SeededIncidentIds};
pub use gather::{gather_context, MetricRule, MetricTable};
pub use remediation::{RemediationRule, RemediationRules, DEFAULT_ESTIMATED_TIME};
pub use root_cause::{
    analyze_root_cause, anomaly_evidence, ConfidenceStrategy, FixedConfidence, DEFAULT_CONFIDENCE,
};

/// Receives stage and collaborator progress while a pipeline runs.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, name: &str, status: ToolStatus);
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

#[async_trait]
impl ProgressReporter for NoProgress {
    async fn report(&self, _name: &str, _status: ToolStatus) {}
}

/// Run `fut` unless the token fires first.
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> AgentResult<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CoreError::Cancelled.into()),
        out = fut => Ok(out),
    }
}

/// The four-stage incident analysis pipeline.
pub struct IncidentPipeline {
    toolkit: Toolkit,
    model: Arc<dyn ModelClient>,
    metrics: MetricTable,
    rules: RemediationRules,
    confidence: Arc<dyn ConfidenceStrategy>,
    ids: Arc<dyn IncidentIdGenerator>,
    time_range: String,
}

impl IncidentPipeline {
    pub fn new(toolkit: Toolkit, model: Arc<dyn ModelClient>) -> Self {
        Self {
            toolkit,
            model,
            metrics: MetricTable::standard(),
            rules: RemediationRules::standard(),
            confidence: Arc::new(FixedConfidence::default()),
            ids: Arc::new(RandomIncidentIds),
            time_range: "1h".to_string(),
        }
    }

    pub fn with_metric_table(mut self, metrics: MetricTable) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_rules(mut self, rules: RemediationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_confidence(mut self, confidence: Arc<dyn ConfidenceStrategy>) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IncidentIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_time_range(mut self, time_range: impl Into<String>) -> Self {
        self.time_range = time_range.into();
        self
    }

    pub fn toolkit(&self) -> &Toolkit {
        &self.toolkit
    }

    async fn begin(
        &self,
        stage: PipelineStage,
        index: usize,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> AgentResult<StageRecord> {
        if cancel.is_cancelled() {
            warn!("Pipeline cancelled before stage {}", stage);
            return Err(CoreError::Cancelled.into());
        }
        info!(
            "Executing stage [{}/{}]: {}",
            index + 1,
            PipelineStage::ordered().len(),
            stage.label()
        );
        progress.report(stage.as_str(), ToolStatus::Running).await;
        Ok(StageRecord::started(stage))
    }

    async fn end(&self, record: StageRecord, progress: &dyn ProgressReporter, trace: &mut Vec<StageRecord>) {
        progress.report(record.stage.as_str(), ToolStatus::Completed).await;
        trace.push(record);
    }

    /// Run all four stages for one prompt.
    pub async fn run(
        &self,
        prompt: &Prompt,
        client_id: &str,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> AgentResult<IncidentResult> {
        prompt.validate()?;
        info!(client_id, "Starting incident pipeline");
        let mut trace = Vec::with_capacity(PipelineStage::ordered().len());

        let record = self.begin(PipelineStage::ContextGather, 0, progress, cancel).await?;
        let context = until_cancelled(
            cancel,
            gather_context(
                &self.toolkit,
                &self.metrics,
                &prompt.text,
                client_id,
                prompt.incident_id(),
                &self.time_range,
                progress,
            ),
        )
        .await?;
        let failed_calls = context.metrics.iter().filter(|m| m.sample().is_none()).count()
            + usize::from(context.snapshot().is_none());
        let record = if failed_calls > 0 {
            record.degraded(format!("{} collaborator call(s) failed", failed_calls))
        } else {
            record.finish()
        };
        self.end(record, progress, &mut trace).await;

        let record = self.begin(PipelineStage::RootCauseAnalysis, 1, progress, cancel).await?;
        let root_cause = until_cancelled(
            cancel,
            analyze_root_cause(self.model.as_ref(), self.confidence.as_ref(), &context, &prompt.text),
        )
        .await?;
        self.end(record.finish(), progress, &mut trace).await;

        let record = self.begin(PipelineStage::RemediationProposal, 2, progress, cancel).await?;
        let plan = self.rules.propose(&root_cause, &context);
        self.end(record.finish(), progress, &mut trace).await;

        let record = self.begin(PipelineStage::ResponseAssembly, 3, progress, cancel).await?;
        // The assembly record is final before the trace is handed over.
        progress.report(PipelineStage::ResponseAssembly.as_str(), ToolStatus::Completed).await;
        trace.push(record.finish());
        let result = assemble_response(context, root_cause, plan, self.ids.as_ref(), trace);

        info!(
            client_id,
            incident_id = %result.incident_id,
            risk = %result.remediation_plan.risk(),
            "Incident pipeline complete"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for IncidentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentPipeline")
            .field("model", &self.model.model_id())
            .field("metrics", &self.metrics)
            .field("time_range", &self.time_range)
            .finish()
    }
}
