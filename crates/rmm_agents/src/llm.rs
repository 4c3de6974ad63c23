//! Model collaborator.
//!
//! [`ModelClient`] is the text-completion capability the pipeline and the
//! general handler depend on. [`LlmAdapter`] implements it against the
//! Anthropic Messages API or OpenAI chat completions, selected by
//! [`AgentConfig`]. A model call never fails past this boundary: transport
//! errors before the first token become a labeled degraded response.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rmm_core::{AgentConfig, ModelProvider, Usage};

use crate::error::{AgentError, AgentResult};
use crate::report::tokenize;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_RETRIES: u32 = 3;

/// Stop reason reported when the provider gives none.
pub const DEFAULT_STOP_REASON: &str = "end_turn";

/// A complete model reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResponse {
    pub content: String,
    pub stop_reason: String,
    pub usage: Usage,
    pub model: String,
}

/// One item of a streamed model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStreamEvent {
    Token(String),
    ToolUseStart { tool_name: String },
    Complete { stop_reason: String },
}

/// Lazy, finite sequence of stream items. An `Err` item ends the stream.
pub type ModelStream = BoxStream<'static, AgentResult<ModelStreamEvent>>;

/// Text-completion capability.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_id(&self) -> &str;

    /// Complete a prompt. Failures are replaced by a degraded response.
    async fn invoke(&self, prompt: &str, system: &str) -> ModelResponse;

    /// Stream a completion. Each call starts a fresh stream.
    async fn invoke_stream(&self, prompt: &str, system: &str) -> ModelStream;
}

/// Stream that replays `content` as space-delimited tokens, then completes.
pub fn canned_stream(content: &str, stop_reason: &str) -> ModelStream {
    let mut items: Vec<AgentResult<ModelStreamEvent>> = tokenize(content)
        .into_iter()
        .map(|t| Ok(ModelStreamEvent::Token(t)))
        .collect();
    items.push(Ok(ModelStreamEvent::Complete {
        stop_reason: stop_reason.to_string(),
    }));
    stream::iter(items).boxed()
}

/// Model adapter that handles API calls.
pub struct LlmAdapter {
    provider: ModelProvider,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    mock_mode: bool,
    client: reqwest::Client,
}

impl LlmAdapter {
    /// Create an adapter with explicit provider settings.
    ///
    /// Without an API key the adapter runs in mock mode.
    pub fn new(provider: ModelProvider, api_key: Option<String>, model: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        Self {
            provider,
            mock_mode: api_key.is_none(),
            api_key,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            temperature: 0.3,
            max_tokens: 2048,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            provider: config.provider,
            api_key: config.api_key.clone(),
            model: config.model_id.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            mock_mode: !config.uses_live_model(),
            client,
        }
    }

    pub fn provider(&self) -> ModelProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_mock(&self) -> bool {
        self.mock_mode
    }

    fn mock_content(prompt: &str) -> String {
        let head: String = prompt.chars().take(100).collect();
        format!("[Mock Mode] Processed prompt: {}...", head)
    }

    fn degraded_content(err: &AgentError) -> String {
        format!(
            "[Degraded] The language model is currently unavailable ({}). \
             Automated analysis could not be completed; review the gathered data manually.",
            err
        )
    }

    fn mock_response(&self, prompt: &str) -> ModelResponse {
        ModelResponse {
            content: Self::mock_content(prompt),
            stop_reason: DEFAULT_STOP_REASON.to_string(),
            usage: Usage {
                input_tokens: 50,
                output_tokens: 100,
            },
            model: self.model.clone(),
        }
    }

    fn request_body(&self, prompt: &str, system: &str, stream: bool) -> serde_json::Value {
        match self.provider {
            ModelProvider::Anthropic => serde_json::to_value(AnthropicRequest {
                model: self.model.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                system: Some(system.to_string()).filter(|s| !s.is_empty()),
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                }],
                stream,
            }),
            ModelProvider::OpenAI => {
                let mut messages = Vec::with_capacity(2);
                if !system.is_empty() {
                    messages.push(ChatMessage {
                        role: "system".to_string(),
                        content: system.to_string(),
                    });
                }
                messages.push(ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                });
                serde_json::to_value(OpenAIRequest {
                    model: self.model.clone(),
                    messages,
                    max_completion_tokens: Some(self.max_tokens),
                    temperature: self.temperature,
                    stream,
                })
            }
        }
        .unwrap_or_default()
    }

    /// POST the request, retrying network errors, 5xx and 429 with backoff.
    async fn send(&self, body: &serde_json::Value) -> AgentResult<reqwest::Response> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AgentError::Model("no API key configured".to_string()))?;
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 2s, 4s
                let delay = Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let request = match self.provider {
                ModelProvider::Anthropic => self
                    .client
                    .post(ANTHROPIC_URL)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", "2023-06-01"),
                ModelProvider::OpenAI => self
                    .client
                    .post(OPENAI_URL)
                    .header("Authorization", format!("Bearer {}", api_key)),
            };

            let response = match request.json(body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(AgentError::Model(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(AgentError::Model(format!(
                    "API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    body
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AgentError::Model(format!("API error {}: {}", status, body)));
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| AgentError::Model("Max retries exceeded".to_string())))
    }

    async fn complete(&self, prompt: &str, system: &str) -> AgentResult<ModelResponse> {
        let body = self.request_body(prompt, system, false);
        let response = self.send(&body).await?;

        match self.provider {
            ModelProvider::Anthropic => {
                let result: AnthropicResponse = response
                    .json()
                    .await
                    .map_err(|e| AgentError::Model(format!("Failed to parse response: {}", e)))?;
                let content = result
                    .content
                    .iter()
                    .filter_map(|c| c.text.as_deref())
                    .collect::<String>();
                Ok(ModelResponse {
                    content,
                    stop_reason: result
                        .stop_reason
                        .unwrap_or_else(|| DEFAULT_STOP_REASON.to_string()),
                    usage: result
                        .usage
                        .map(|u| Usage {
                            input_tokens: u.input_tokens,
                            output_tokens: u.output_tokens,
                        })
                        .unwrap_or_default(),
                    model: self.model.clone(),
                })
            }
            ModelProvider::OpenAI => {
                let result: OpenAIResponse = response
                    .json()
                    .await
                    .map_err(|e| AgentError::Model(format!("Failed to parse response: {}", e)))?;
                let choice = result
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| AgentError::Model("No response from OpenAI".to_string()))?;
                Ok(ModelResponse {
                    content: choice.message.content.unwrap_or_default(),
                    stop_reason: choice
                        .finish_reason
                        .unwrap_or_else(|| DEFAULT_STOP_REASON.to_string()),
                    usage: result
                        .usage
                        .map(|u| Usage {
                            input_tokens: u.prompt_tokens,
                            output_tokens: u.completion_tokens,
                        })
                        .unwrap_or_default(),
                    model: self.model.clone(),
                })
            }
        }
    }
}

#[async_trait]
impl ModelClient for LlmAdapter {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &str, system: &str) -> ModelResponse {
        if self.mock_mode {
            return self.mock_response(prompt);
        }

        match self.complete(prompt, system).await {
            Ok(response) => response,
            Err(e) => {
                warn!(model = %self.model, "Model invocation failed, using degraded response: {}", e);
                ModelResponse {
                    content: Self::degraded_content(&e),
                    stop_reason: DEFAULT_STOP_REASON.to_string(),
                    usage: Usage::default(),
                    model: self.model.clone(),
                }
            }
        }
    }

    async fn invoke_stream(&self, prompt: &str, system: &str) -> ModelStream {
        if self.mock_mode {
            return canned_stream(&Self::mock_content(prompt), DEFAULT_STOP_REASON);
        }

        let body = self.request_body(prompt, system, true);
        match self.send(&body).await {
            Ok(response) => {
                debug!(model = %self.model, "Model stream opened");
                let bytes = response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| e.to_string()))
                    .boxed();
                decode_sse(bytes, self.provider)
            }
            Err(e) => {
                warn!(model = %self.model, "Model stream failed to open, using degraded response: {}", e);
                canned_stream(&Self::degraded_content(&e), DEFAULT_STOP_REASON)
            }
        }
    }
}

/// Splits a byte stream into server-sent-event `data:` payloads.
#[derive(Debug, Default)]
struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Turns provider stream payloads into [`ModelStreamEvent`]s.
#[derive(Debug)]
struct StreamDecoder {
    provider: ModelProvider,
    stop_reason: Option<String>,
    completed: bool,
}

impl StreamDecoder {
    fn new(provider: ModelProvider) -> Self {
        Self {
            provider,
            stop_reason: None,
            completed: false,
        }
    }

    fn complete(&mut self) -> ModelStreamEvent {
        self.completed = true;
        ModelStreamEvent::Complete {
            stop_reason: self
                .stop_reason
                .take()
                .unwrap_or_else(|| DEFAULT_STOP_REASON.to_string()),
        }
    }

    fn decode(&mut self, payload: &str) -> AgentResult<Option<ModelStreamEvent>> {
        if self.provider == ModelProvider::OpenAI && payload == "[DONE]" {
            return Ok(Some(self.complete()));
        }

        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| AgentError::Stream(format!("malformed stream payload: {}", e)))?;

        match self.provider {
            ModelProvider::Anthropic => self.decode_anthropic(&value),
            ModelProvider::OpenAI => Ok(self.decode_openai(&value)),
        }
    }

    fn decode_anthropic(&mut self, value: &serde_json::Value) -> AgentResult<Option<ModelStreamEvent>> {
        match value["type"].as_str() {
            Some("content_block_delta") if value["delta"]["type"] == "text_delta" => Ok(value["delta"]
                ["text"]
                .as_str()
                .map(|t| ModelStreamEvent::Token(t.to_string()))),
            Some("content_block_start") if value["content_block"]["type"] == "tool_use" => {
                Ok(Some(ModelStreamEvent::ToolUseStart {
                    tool_name: value["content_block"]["name"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                }))
            }
            Some("message_delta") => {
                if let Some(reason) = value["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(reason.to_string());
                }
                Ok(None)
            }
            Some("message_stop") => Ok(Some(self.complete())),
            Some("error") => Err(AgentError::Model(
                value["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown stream error")
                    .to_string(),
            )),
            _ => Ok(None),
        }
    }

    fn decode_openai(&mut self, value: &serde_json::Value) -> Option<ModelStreamEvent> {
        let choice = &value["choices"][0];
        if let Some(reason) = choice["finish_reason"].as_str() {
            self.stop_reason = Some(reason.to_string());
        }
        if let Some(name) = choice["delta"]["tool_calls"][0]["function"]["name"].as_str() {
            return Some(ModelStreamEvent::ToolUseStart {
                tool_name: name.to_string(),
            });
        }
        choice["delta"]["content"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(|t| ModelStreamEvent::Token(t.to_string()))
    }
}

struct SseState {
    body: BoxStream<'static, Result<Vec<u8>, String>>,
    buffer: SseBuffer,
    decoder: StreamDecoder,
    pending: VecDeque<AgentResult<ModelStreamEvent>>,
    delivered_token: bool,
    done: bool,
}

/// Decode a raw SSE body into a model stream.
///
/// A transport failure before any token was delivered is replaced by a
/// degraded reply; after that it ends the stream with an error item.
fn decode_sse(body: BoxStream<'static, Result<Vec<u8>, String>>, provider: ModelProvider) -> ModelStream {
    let state = SseState {
        body,
        buffer: SseBuffer::default(),
        decoder: StreamDecoder::new(provider),
        pending: VecDeque::new(),
        delivered_token: false,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                match &item {
                    Ok(ModelStreamEvent::Token(_)) => st.delivered_token = true,
                    Ok(ModelStreamEvent::Complete { .. }) | Err(_) => {
                        st.pending.clear();
                        st.done = true;
                    }
                    Ok(ModelStreamEvent::ToolUseStart { .. }) => {}
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    for payload in st.buffer.push(&chunk) {
                        match st.decoder.decode(&payload) {
                            Ok(Some(event)) => st.pending.push_back(Ok(event)),
                            Ok(None) => {}
                            Err(e) => st.pending.push_back(Err(e)),
                        }
                    }
                }
                Some(Err(message)) => {
                    let err = AgentError::Model(format!("stream interrupted: {}", message));
                    if st.delivered_token {
                        st.pending.push_back(Err(err));
                    } else {
                        warn!("Model stream failed before first token, using degraded response: {}", err);
                        for token in tokenize(&LlmAdapter::degraded_content(&err)) {
                            st.pending.push_back(Ok(ModelStreamEvent::Token(token)));
                        }
                        st.pending.push_back(Ok(ModelStreamEvent::Complete {
                            stop_reason: DEFAULT_STOP_REASON.to_string(),
                        }));
                    }
                }
                None => {
                    if st.decoder.completed {
                        return None;
                    }
                    st.pending.push_back(Ok(st.decoder.complete()));
                }
            }
        }
    })
    .boxed()
}

// Provider API types
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> BoxStream<'static, Result<Vec<u8>, String>> {
        let items: Vec<Result<Vec<u8>, String>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(items).boxed()
    }

    async fn drain(stream: ModelStream) -> Vec<AgentResult<ModelStreamEvent>> {
        stream.collect().await
    }

    #[test]
    fn test_default_models() {
        let anthropic = LlmAdapter::new(ModelProvider::Anthropic, Some("key".to_string()), None);
        assert_eq!(anthropic.model(), "claude-sonnet-4-20250514");
        assert!(!anthropic.is_mock());

        let openai = LlmAdapter::new(ModelProvider::OpenAI, None, Some("gpt-4o".to_string()));
        assert_eq!(openai.model(), "gpt-4o");
        assert!(openai.is_mock());
    }

    #[test]
    fn test_from_config_respects_mock_mode() {
        let mut config = AgentConfig::default();
        config.api_key = Some("sk-test".to_string());
        assert!(LlmAdapter::from_config(&config).is_mock());

        config.mock_mode = false;
        let adapter = LlmAdapter::from_config(&config);
        assert!(!adapter.is_mock());
        assert_eq!(adapter.provider(), ModelProvider::Anthropic);
    }

    #[tokio::test]
    async fn test_mock_invoke_and_stream_agree() {
        let adapter = LlmAdapter::new(ModelProvider::Anthropic, None, None);
        let response = adapter.invoke("How do I rotate IAM keys?", "system").await;
        assert_eq!(response.content, "[Mock Mode] Processed prompt: How do I rotate IAM keys?...");
        assert_eq!(response.usage.output_tokens, 100);

        let items = drain(adapter.invoke_stream("How do I rotate IAM keys?", "system").await).await;
        let text: String = items
            .iter()
            .filter_map(|i| match i {
                Ok(ModelStreamEvent::Token(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, response.content);
        assert!(matches!(items.last(), Some(Ok(ModelStreamEvent::Complete { .. }))));
    }

    #[test]
    fn test_sse_buffer_handles_split_lines() {
        let mut buffer = SseBuffer::default();
        assert!(buffer.push(b"event: ping\ndata: {\"a\"").is_empty());
        let payloads = buffer.push(b": 1}\r\n\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"a\": 1}".to_string(), "[DONE]".to_string()]);
    }

    #[tokio::test]
    async fn test_decode_anthropic_stream() {
        let body = chunks(&[
            "data: {\"type\":\"message_start\"}\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\" there\"}}\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\"}}\n",
            "data: {\"type\":\"message_stop\"}\n",
        ]);

        let items = drain(decode_sse(body, ModelProvider::Anthropic)).await;
        let events: Vec<ModelStreamEvent> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                ModelStreamEvent::Token("Hello".to_string()),
                ModelStreamEvent::Token(" there".to_string()),
                ModelStreamEvent::Complete {
                    stop_reason: "max_tokens".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_openai_stream() {
        let body = chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ]);

        let items = drain(decode_sse(body, ModelProvider::OpenAI)).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Ok(ModelStreamEvent::Token(t)) if t == "Hi"));
        assert!(matches!(&items[1], Ok(ModelStreamEvent::Complete { stop_reason }) if stop_reason == "stop"));
    }

    #[tokio::test]
    async fn test_failure_after_first_token_is_an_error_item() {
        let items: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Par\"}}\n".to_vec()),
            Err("connection reset".to_string()),
        ];
        let stream = decode_sse(stream::iter(items).boxed(), ModelProvider::Anthropic);
        let items = drain(stream).await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(AgentError::Model(m)) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_failure_before_first_token_degrades() {
        let items: Vec<Result<Vec<u8>, String>> = vec![Err("timed out".to_string())];
        let stream = decode_sse(stream::iter(items).boxed(), ModelProvider::Anthropic);
        let items = drain(stream).await;

        assert!(items.iter().all(|i| i.is_ok()));
        let first = match &items[0] {
            Ok(ModelStreamEvent::Token(t)) => t.clone(),
            other => panic!("unexpected item: {:?}", other),
        };
        assert!(first.starts_with("[Degraded]"));
        assert!(matches!(items.last(), Some(Ok(ModelStreamEvent::Complete { .. }))));
    }

    #[tokio::test]
    async fn test_stream_without_stop_event_still_completes() {
        let body = chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n"]);
        let items = drain(decode_sse(body, ModelProvider::OpenAI)).await;
        assert!(matches!(items.last(), Some(Ok(ModelStreamEvent::Complete { stop_reason })) if stop_reason == "end_turn"));
    }
}
