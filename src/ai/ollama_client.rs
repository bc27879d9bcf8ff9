//! Ollama client for local LLM inference
//! Communicates with an Ollama server via its HTTP API. Every backend
//! failure is reported as a value rather than an `Err`, so the scheduler
//! can degrade instead of unwinding.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::{Availability, InferenceBackend};

pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-call generation settings.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: Option<u32>,
    pub system: Option<String>,
    pub timeout: Duration,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            num_predict: Some(500),
            system: None,
            timeout: DEFAULT_GENERATE_TIMEOUT,
        }
    }
}

/// Typed result of a generate call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ns: Option<u64>,
}

impl GenerateOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Typed result of a tool-calling chat request.
#[derive(Debug, Clone, Default)]
pub struct ToolChatOutcome {
    pub success: bool,
    pub tool_calls: Vec<ToolInvocation>,
    pub message: Option<String>,
    pub error: Option<String>,
    /// The backend rejected tool calling outright; callers should fall back
    /// to the free-text protocol.
    pub tools_unsupported: bool,
}

/// A tool the model may invoke, in Ollama's function wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolFunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: ToolFunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// One tool invocation returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaVersionResponse {
    version: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaToolFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaToolFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

// ============================================================================
// OllamaClient Implementation
// ============================================================================

/// Ollama client bound to one server and one model for its lifetime.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(180)) // Longer timeout for local inference
            .build()
            .unwrap_or_else(|e| {
                // Extremely unlikely, but avoid panicking in production.
                tracing::error!("Failed to build HTTP client, using default client: {}", e);
                Client::new()
            });

        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Probe the server version endpoint. 5 s timeout.
    pub async fn check_version(&self) -> Result<String, String> {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<OllamaVersionResponse>().await {
                    Ok(v) => Ok(v.version),
                    Err(e) => Err(format!("malformed version response: {}", e)),
                }
            }
            Ok(resp) => Err(format!("version probe returned {}", resp.status())),
            Err(e) => Err(describe_request_error(&e, PROBE_TIMEOUT)),
        }
    }

    /// Check whether the configured model is installed. Matches exact names
    /// and tag-qualified names ("llama3.2" matches "llama3.2:latest").
    pub async fn has_model(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => {
                if let Ok(tags) = resp.json::<OllamaTagsResponse>().await {
                    tags.models
                        .iter()
                        .any(|m| model_matches(&m.name, &self.model))
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    /// List installed models (for diagnostics).
    pub async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        use anyhow::Context;
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .context("Failed to connect to Ollama")?;

        let tags: OllamaTagsResponse = resp.json().await.context("Failed to parse model list")?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Blocking generate call.
    pub async fn generate_text(&self, prompt: &str, options: &GenerateOptions) -> GenerateOutcome {
        let url = format!("{}/api/generate", self.base_url);
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            system: options.system.clone(),
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.num_predict,
            },
        };

        tracing::debug!("Ollama generate request to {} with model {}", url, self.model);
        let started = Instant::now();

        let response = match self
            .client
            .post(&url)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return GenerateOutcome::failure(format!(
                    "Ollama request failed: {}",
                    describe_request_error(&e, options.timeout)
                ))
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return GenerateOutcome::failure(format!("Ollama API error {}: {}", status, body));
        }

        match response.json::<OllamaGenerateResponse>().await {
            Ok(result) => GenerateOutcome {
                success: true,
                response: Some(result.response.trim().to_string()),
                error: None,
                model: result.model.or_else(|| Some(self.model.clone())),
                duration_ns: result
                    .total_duration
                    .or(Some(started.elapsed().as_nanos() as u64)),
            },
            Err(e) => GenerateOutcome::failure(format!("Failed to parse Ollama response: {}", e)),
        }
    }

    /// Streaming generate call. Forwards incremental chunks over `tx`,
    /// skipping any line that fails to parse rather than aborting the whole
    /// stream, and returns the assembled text.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        tx: mpsc::Sender<String>,
    ) -> GenerateOutcome {
        let url = format!("{}/api/generate", self.base_url);
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: true,
            system: options.system.clone(),
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.num_predict,
            },
        };

        let started = Instant::now();
        let response = match self
            .client
            .post(&url)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return GenerateOutcome::failure(format!(
                    "Ollama request failed: {}",
                    describe_request_error(&e, options.timeout)
                ))
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return GenerateOutcome::failure(format!("Ollama API error {}: {}", status, body));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut assembled = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => return GenerateOutcome::failure(format!("Ollama stream error: {}", e)),
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);
                forward_stream_line(&line, &mut assembled, &tx).await;
            }
        }
        // The server may omit the trailing newline on the final object.
        let leftover = buffer.trim().to_string();
        forward_stream_line(&leftover, &mut assembled, &tx).await;

        GenerateOutcome {
            success: true,
            response: Some(assembled),
            error: None,
            model: Some(self.model.clone()),
            duration_ns: Some(started.elapsed().as_nanos() as u64),
        }
    }

    /// Tool-calling chat request against `/api/chat`.
    pub async fn chat(
        &self,
        system: &str,
        prompt: &str,
        tools: &[ToolSpec],
        options: &GenerateOptions,
    ) -> ToolChatOutcome {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::new();
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

        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            tools: tools.to_vec(),
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.num_predict,
            },
        };

        tracing::debug!("Ollama chat request to {} with {} tool(s)", url, tools.len());

        let response = match self
            .client
            .post(&url)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return ToolChatOutcome {
                    success: false,
                    error: Some(format!(
                        "Ollama request failed: {}",
                        describe_request_error(&e, options.timeout)
                    )),
                    ..ToolChatOutcome::default()
                }
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return ToolChatOutcome {
                success: false,
                tools_unsupported: is_tools_unsupported(&body),
                error: Some(format!("Ollama API error {}: {}", status, body)),
                ..ToolChatOutcome::default()
            };
        }

        match response.json::<OllamaChatResponse>().await {
            Ok(result) => ToolChatOutcome {
                success: true,
                tool_calls: result
                    .message
                    .tool_calls
                    .into_iter()
                    .map(|c| ToolInvocation {
                        name: c.function.name,
                        arguments: c.function.arguments,
                    })
                    .collect(),
                message: Some(result.message.content),
                error: None,
                tools_unsupported: false,
            },
            Err(e) => ToolChatOutcome {
                success: false,
                error: Some(format!("Failed to parse Ollama chat response: {}", e)),
                ..ToolChatOutcome::default()
            },
        }
    }
}

async fn forward_stream_line(line: &str, assembled: &mut String, tx: &mpsc::Sender<String>) {
    if line.is_empty() {
        return;
    }
    let parsed: OllamaStreamChunk = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(_) => return, // skip malformed lines, keep streaming
    };
    if let Some(text) = parsed.response {
        if !text.is_empty() {
            assembled.push_str(&text);
            let _ = tx.send(text).await;
        }
    }
}

/// Installed "llama3.2:latest" satisfies a request for "llama3.2".
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted || installed.split(':').next() == Some(wanted)
}

/// Tool-rejecting backends name the capability in the error body.
fn is_tools_unsupported(body: &str) -> bool {
    body.contains("does not support tools") || body.contains("tool calling")
}

/// A timeout must stay distinguishable from other failures so the scheduler
/// degrades instead of retrying.
fn describe_request_error(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs())
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn availability(&self) -> Availability {
        match self.check_version().await {
            Err(e) => Availability::down(e),
            Ok(version) => {
                tracing::debug!("Ollama {} reachable at {}", version, self.base_url);
                if self.has_model().await {
                    Availability::up()
                } else {
                    Availability::down(format!("model {} is not installed", self.model))
                }
            }
        }
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> GenerateOutcome {
        self.generate_text(prompt, options).await
    }

    async fn chat_with_tools(
        &self,
        system: &str,
        prompt: &str,
        tools: &[ToolSpec],
        options: &GenerateOptions,
    ) -> ToolChatOutcome {
        self.chat(system, prompt, tools, options).await
    }
}
