//! Model-streaming transports.
//!
//! A transport takes the request path for a response and delivers
//! [`StreamEvent`]s over a channel: any number of chunks followed by exactly
//! one `Complete` or `Error`.

pub mod scripted;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::config::Config;
use crate::types::image::{ImageAttachment, ImageSource};
use crate::types::message::{MessageNode, Role};
use crate::types::stream::StreamEvent;

pub use scripted::ScriptedTransport;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Produces a streamed model response for a request path.
pub trait ModelTransport: Send + Sync {
    /// Streams a response to `request` into `tx`.
    ///
    /// Implementations send exactly one terminal event, even on failure.
    fn stream(
        &self,
        request: Vec<MessageNode>,
        tx: mpsc::Sender<StreamEvent>,
    ) -> impl Future<Output = ()> + Send;
}

/// Streams responses from the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicTransport {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    /// Set for reasoning models only.
    thinking_budget: Option<u32>,
    base_url: String,
}

impl std::fmt::Debug for AnthropicTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicTransport")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("thinking_budget", &self.thinking_budget)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Serialize, PartialEq)]
struct ApiMessage<'a> {
    role: &'static str,
    content: Vec<ApiBlock<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock<'a> {
    Text { text: &'a str },
    Image { source: ApiImageSource<'a> },
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiImageSource<'a> {
    Base64 { media_type: &'static str, data: &'a str },
    Url { url: &'a str },
}

#[derive(Deserialize)]
struct StreamLine {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<Delta>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    delta_type: Option<String>,
    text: Option<String>,
    thinking: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl AnthropicTransport {
    /// Creates a transport for the configured model.
    ///
    /// Extended thinking is requested only when the model is a reasoning model.
    #[must_use]
    pub fn new(api_key: SecretString, config: &Config) -> Self {
        let thinking_budget = config
            .is_reasoning_model()
            .then_some(config.thinking_budget_tokens);
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            thinking_budget,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, request: &'a [MessageNode]) -> ApiRequest<'a> {
        let system: Vec<&str> = request
            .iter()
            .filter(|node| node.role == Role::System && !node.content.trim().is_empty())
            .map(|node| node.content.as_str())
            .collect();

        ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            stream: true,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: to_api_messages(request),
            thinking: self.thinking_budget.map(|budget_tokens| ThinkingConfig {
                kind: "enabled",
                budget_tokens,
            }),
        }
    }

    async fn run(&self, request: &[MessageNode], tx: &mpsc::Sender<StreamEvent>) -> Result<(), String> {
        use futures::StreamExt;

        let body = self.build_request(request);
        debug!(model = %self.model, messages = body.messages.len(), "Sending request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{}: {}", status, body));
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream read failed: {}", e))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                match parse_line(line.trim()) {
                    Some(StreamEvent::Error(message)) => return Err(message),
                    Some(StreamEvent::Complete) => return Ok(()),
                    Some(event) => {
                        if tx.send(event).await.is_err() {
                            debug!("Receiver dropped, abandoning stream");
                            return Ok(());
                        }
                    }
                    None => {}
                }
            }
        }

        Err("stream ended before message_stop".to_string())
    }
}

impl ModelTransport for AnthropicTransport {
    async fn stream(&self, request: Vec<MessageNode>, tx: mpsc::Sender<StreamEvent>) {
        let terminal = match self.run(&request, &tx).await {
            Ok(()) => StreamEvent::Complete,
            Err(message) => {
                warn!(model = %self.model, error = %message, "Model stream failed");
                StreamEvent::Error(message)
            }
        };
        let _ = tx.send(terminal).await;
    }
}

/// Parses one SSE line into an event, if it carries one.
fn parse_line(line: &str) -> Option<StreamEvent> {
    let json = line.strip_prefix("data:")?.trim_start();
    if json == "[DONE]" {
        return None;
    }
    let parsed: StreamLine = serde_json::from_str(json).ok()?;

    match parsed.event_type.as_str() {
        "content_block_delta" => {
            let delta = parsed.delta?;
            match delta.delta_type.as_deref() {
                Some("thinking_delta") => delta.thinking.map(StreamEvent::ThinkingChunk),
                _ => delta.text.map(StreamEvent::Chunk),
            }
        }
        "message_stop" => Some(StreamEvent::Complete),
        "error" => Some(StreamEvent::Error(
            parsed
                .error
                .map_or_else(|| "unknown API error".to_string(), |e| e.message),
        )),
        _ => None,
    }
}

/// Converts a request path into API messages.
///
/// System nodes go to the top-level system prompt instead. Consecutive
/// nodes with the same role are merged, as the API requires alternation.
fn to_api_messages(request: &[MessageNode]) -> Vec<ApiMessage<'_>> {
    let mut messages: Vec<ApiMessage<'_>> = Vec::new();

    for node in request {
        let role = match node.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => continue,
        };

        let mut blocks: Vec<ApiBlock<'_>> =
            node.metadata.images.iter().filter_map(image_block).collect();
        if !node.content.is_empty() {
            blocks.push(ApiBlock::Text { text: &node.content });
        }
        if blocks.is_empty() {
            continue;
        }

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(ApiMessage { role, content: blocks }),
        }
    }
    messages
}

fn image_block(image: &ImageAttachment) -> Option<ApiBlock<'_>> {
    let source = match &image.source {
        ImageSource::Base64 { data } => ApiImageSource::Base64 {
            media_type: image.media_type.as_str(),
            data,
        },
        ImageSource::Url { url } => ApiImageSource::Url { url },
        ImageSource::Stored { key } => {
            warn!(key = %key, "Skipping image from external store; it cannot be inlined");
            return None;
        }
    };
    Some(ApiBlock::Image { source })
}
