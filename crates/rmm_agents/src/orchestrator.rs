//! Invocation entry points.
//!
//! [`Orchestrator::invoke`] routes a prompt and returns the assembled
//! result. [`Orchestrator::invoke_stream`] does the same work on a spawned
//! task and delivers it as an ordered [`StreamEvent`] sequence.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rmm_core::{AgentConfig, InvocationResult, Outcome, Prompt, Route, Router, StreamEvent};
use rmm_tools::Toolkit;

use crate::error::AgentResult;
use crate::general::GeneralQueryHandler;
use crate::llm::{LlmAdapter, ModelClient, ModelStreamEvent, DEFAULT_STOP_REASON};
use crate::monitoring::MonitoringAgent;
use crate::pipeline::{until_cancelled, IncidentPipeline, NoProgress};
use crate::report::tokenize;
use crate::stream::{InvocationStream, StreamEmitter};

/// Name reported in result envelopes and routing events.
pub const ORCHESTRATOR_NAME: &str = "main";

/// Routes prompts to the incident pipeline or the general handler.
#[derive(Clone)]
pub struct Orchestrator {
    router: Arc<Router>,
    pipeline: Arc<IncidentPipeline>,
    general: GeneralQueryHandler,
    default_client_id: String,
}

impl Orchestrator {
    pub fn new(toolkit: Toolkit, model: Arc<dyn ModelClient>) -> Self {
        Self {
            router: Arc::new(Router::default()),
            pipeline: Arc::new(IncidentPipeline::new(toolkit, model.clone())),
            general: GeneralQueryHandler::new(model),
            default_client_id: AgentConfig::default().default_client_id,
        }
    }

    /// Simulated collaborators and the configured model adapter.
    pub fn from_config(config: &AgentConfig) -> Self {
        let model: Arc<dyn ModelClient> = Arc::new(LlmAdapter::from_config(config));
        let pipeline = IncidentPipeline::new(Toolkit::simulated(None), model.clone())
            .with_time_range(config.metric_time_range.clone());

        info!(
            model = %model.model_id(),
            mock_mode = !config.uses_live_model(),
            "Orchestrator initialized"
        );

        Self {
            router: Arc::new(Router::default()),
            pipeline: Arc::new(pipeline),
            general: GeneralQueryHandler::new(model),
            default_client_id: config.default_client_id.clone(),
        }
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.router = Arc::new(router);
        self
    }

    pub fn with_pipeline(mut self, pipeline: IncidentPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn with_default_client(mut self, client_id: impl Into<String>) -> Self {
        self.default_client_id = client_id.into();
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Health checks over the same collaborators the pipeline uses.
    pub fn monitoring(&self) -> MonitoringAgent {
        MonitoringAgent::new(self.pipeline.toolkit().clone())
    }

    /// Route and run a prompt, returning the complete result.
    pub async fn invoke(&self, prompt: Prompt) -> AgentResult<InvocationResult> {
        self.invoke_with_cancel(prompt, &CancellationToken::new()).await
    }

    pub async fn invoke_with_cancel(
        &self,
        prompt: Prompt,
        cancel: &CancellationToken,
    ) -> AgentResult<InvocationResult> {
        prompt.validate()?;
        let route = self.router.classify(&prompt.text);
        let client_id = prompt.client_or(&self.default_client_id).to_string();
        info!(route = %route, client_id = %client_id, "Routing prompt");

        let outcome = match route {
            Route::Incident => {
                let result = self.pipeline.run(&prompt, &client_id, &NoProgress, cancel).await?;
                Outcome::Incident(Box::new(result))
            }
            Route::General => {
                Outcome::General(until_cancelled(cancel, self.general.handle(&prompt.text)).await?)
            }
        };

        Ok(InvocationResult {
            orchestrator: ORCHESTRATOR_NAME.to_string(),
            routed_to: route,
            prompt: prompt.text,
            client_id,
            outcome,
        })
    }

    /// Route and run a prompt, streaming events as they are produced.
    ///
    /// An empty prompt is rejected before anything is emitted. Must be
    /// called from within a Tokio runtime.
    pub fn invoke_stream(&self, prompt: Prompt) -> AgentResult<InvocationStream> {
        self.invoke_stream_with_cancel(prompt, CancellationToken::new())
    }

    /// Like [`Orchestrator::invoke_stream`], stopped when `cancel` fires.
    ///
    /// `cancel` may be shared across invocations; each one runs on its own
    /// child token.
    pub fn invoke_stream_with_cancel(
        &self,
        prompt: Prompt,
        cancel: CancellationToken,
    ) -> AgentResult<InvocationStream> {
        prompt.validate()?;
        let (emitter, stream) = StreamEmitter::channel(cancel);
        let this = self.clone();
        tokio::spawn(async move {
            this.drive_stream(prompt, emitter).await;
        });
        Ok(stream)
    }

    async fn drive_stream(&self, prompt: Prompt, emitter: StreamEmitter) {
        let cancel = emitter.cancellation_token().clone();
        let route = self.router.classify(&prompt.text);
        let client_id = prompt.client_or(&self.default_client_id).to_string();
        info!(route = %route, client_id = %client_id, "Streaming prompt");

        if !emitter.emit(StreamEvent::routing(route)).await {
            return;
        }

        match route {
            Route::Incident => self.stream_incident(&prompt, &client_id, &emitter, &cancel).await,
            Route::General => self.stream_general(&prompt, &emitter, &cancel).await,
        }
    }

    async fn stream_incident(
        &self,
        prompt: &Prompt,
        client_id: &str,
        emitter: &StreamEmitter,
        cancel: &CancellationToken,
    ) {
        let result = match self.pipeline.run(prompt, client_id, emitter, cancel).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                emitter.cancelled().await;
                return;
            }
            Err(e) => {
                error!(client_id, "Incident pipeline failed: {}", e);
                emitter.fail(e.to_string()).await;
                return;
            }
        };

        for token in tokenize(&result.response) {
            if cancel.is_cancelled() {
                emitter.cancelled().await;
                return;
            }
            if !emitter.emit(StreamEvent::token(token)).await {
                return;
            }
        }

        emitter
            .emit(StreamEvent::Metadata {
                tools_used: result.tools_used.clone(),
                confidence: result.confidence,
                incident_id: result.incident_id.clone(),
                requires_approval: result.requires_approval,
            })
            .await;

        if cancel.is_cancelled() {
            emitter.cancelled().await;
        } else {
            emitter.complete(DEFAULT_STOP_REASON).await;
        }
    }

    async fn stream_general(&self, prompt: &Prompt, emitter: &StreamEmitter, cancel: &CancellationToken) {
        let mut tokens = match until_cancelled(cancel, self.general.stream(&prompt.text)).await {
            Ok(stream) => stream,
            Err(_) => {
                emitter.cancelled().await;
                return;
            }
        };

        let mut stop_reason = DEFAULT_STOP_REASON.to_string();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    emitter.cancelled().await;
                    return;
                }
                item = tokens.next() => item,
            };

            match next {
                Some(Ok(ModelStreamEvent::Token(content))) => {
                    if !emitter.emit(StreamEvent::token(content)).await {
                        return;
                    }
                }
                Some(Ok(ModelStreamEvent::ToolUseStart { tool_name })) => {
                    debug!(tool_name = %tool_name, "Ignoring model tool use on general route");
                }
                Some(Ok(ModelStreamEvent::Complete { stop_reason: reason })) => {
                    stop_reason = reason;
                    break;
                }
                Some(Err(e)) => {
                    warn!("Model stream failed: {}", e);
                    emitter.fail(e.to_string()).await;
                    return;
                }
                None => break,
            }
        }

        emitter.complete(&stop_reason).await;
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("routes", &self.router.table().len())
            .field("pipeline", &self.pipeline)
            .field("default_client_id", &self.default_client_id)
            .finish()
    }
}
