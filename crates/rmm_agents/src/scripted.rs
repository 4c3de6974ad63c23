//! Scripted model for testing.
//!
//! [`ScriptedModel`] replays a fixed reply, optionally failing part way
//! through a stream or pausing between tokens, and records every call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::RwLock;

use rmm_core::Usage;

use crate::error::{AgentError, AgentResult};
use crate::llm::{ModelClient, ModelResponse, ModelStream, ModelStreamEvent, DEFAULT_STOP_REASON};
use crate::report::tokenize;

/// Captured model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCall {
    pub prompt: String,
    pub system: String,
    pub streamed: bool,
}

/// Deterministic model collaborator.
#[derive(Clone)]
pub struct ScriptedModel {
    model_id: String,
    tokens: Arc<RwLock<Vec<String>>>,
    stop_reason: Arc<RwLock<String>>,
    /// Fail the stream with this message after N tokens.
    fail_after: Arc<RwLock<Option<(usize, String)>>>,
    tool_use: Arc<RwLock<Option<String>>>,
    token_delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<ModelCall>>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            model_id: "scripted-model".to_string(),
            tokens: Arc::new(RwLock::new(tokenize("Scripted response."))),
            stop_reason: Arc::new(RwLock::new(DEFAULT_STOP_REASON.to_string())),
            fail_after: Arc::new(RwLock::new(None)),
            tool_use: Arc::new(RwLock::new(None)),
            token_delay: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Reply with `text`, streamed as space-delimited tokens.
    pub fn with_response(self, text: &str) -> Self {
        *self.tokens.write() = tokenize(text);
        self
    }

    /// Reply with exactly these stream tokens.
    pub fn with_tokens<I, S>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.tokens.write() = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stop_reason(self, stop_reason: impl Into<String>) -> Self {
        *self.stop_reason.write() = stop_reason.into();
        self
    }

    /// End streams with an error after `tokens` tokens.
    pub fn fail_after(self, tokens: usize, message: impl Into<String>) -> Self {
        *self.fail_after.write() = Some((tokens, message.into()));
        self
    }

    /// Announce a tool use before the first token.
    pub fn with_tool_use(self, tool_name: impl Into<String>) -> Self {
        *self.tool_use.write() = Some(tool_name.into());
        self
    }

    pub fn with_token_delay(self, delay: Duration) -> Self {
        *self.token_delay.write() = Some(delay);
        self
    }

    pub fn response_text(&self) -> String {
        self.tokens.read().concat()
    }

    pub fn get_calls(&self) -> Vec<ModelCall> {
        self.calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    fn record_call(&self, prompt: &str, system: &str, streamed: bool) {
        self.calls.write().push(ModelCall {
            prompt: prompt.to_string(),
            system: system.to_string(),
            streamed,
        });
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, prompt: &str, system: &str) -> ModelResponse {
        self.record_call(prompt, system, false);
        ModelResponse {
            content: self.response_text(),
            stop_reason: self.stop_reason.read().clone(),
            usage: Usage {
                input_tokens: prompt.split_whitespace().count() as u64,
                output_tokens: self.tokens.read().len() as u64,
            },
            model: self.model_id.clone(),
        }
    }

    async fn invoke_stream(&self, prompt: &str, system: &str) -> ModelStream {
        self.record_call(prompt, system, true);

        let mut items: Vec<AgentResult<ModelStreamEvent>> = Vec::new();
        if let Some(tool_name) = self.tool_use.read().clone() {
            items.push(Ok(ModelStreamEvent::ToolUseStart { tool_name }));
        }

        let tokens = self.tokens.read().clone();
        let failure = self.fail_after.read().clone();
        match failure {
            Some((after, message)) => {
                items.extend(tokens.into_iter().take(after).map(|t| Ok(ModelStreamEvent::Token(t))));
                items.push(Err(AgentError::Model(message)));
            }
            None => {
                items.extend(tokens.into_iter().map(|t| Ok(ModelStreamEvent::Token(t))));
                items.push(Ok(ModelStreamEvent::Complete {
                    stop_reason: self.stop_reason.read().clone(),
                }));
            }
        }

        let delay = *self.token_delay.read();
        let stream = stream::iter(items);
        match delay {
            Some(delay) => stream
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed(),
            None => stream.boxed(),
        }
    }
}
