//! General conversational route.

use std::sync::Arc;

use tracing::debug;

use rmm_core::GeneralResult;

use crate::llm::{ModelClient, ModelStream};
use crate::prompts::GENERAL_SYSTEM_PROMPT;

/// Forwards the prompt verbatim to the model with a fixed system preamble.
#[derive(Clone)]
pub struct GeneralQueryHandler {
    model: Arc<dyn ModelClient>,
}

impl GeneralQueryHandler {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    pub async fn handle(&self, prompt: &str) -> GeneralResult {
        debug!(model = %self.model.model_id(), "Handling general query");
        let response = self.model.invoke(prompt, GENERAL_SYSTEM_PROMPT).await;
        GeneralResult {
            status: "completed".to_string(),
            response: response.content,
            model: response.model,
            usage: response.usage,
            tools_used: Vec::new(),
        }
    }

    pub async fn stream(&self, prompt: &str) -> ModelStream {
        self.model.invoke_stream(prompt, GENERAL_SYSTEM_PROMPT).await
    }
}
