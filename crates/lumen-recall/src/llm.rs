use std::time::Duration;

use lumen_core::{LlmConfig, LumenError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use lumen_recall::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Which symbols does this code use?");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use lumen_recall::llm::Role;
///
/// assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Endpoint settings shared by every provider.
#[derive(Debug, Clone)]
pub struct Endpoint {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

/// The streaming chat channel, selected once from `[llm] provider`.
///
/// # Examples
///
/// ```
/// use lumen_core::LlmConfig;
/// use lumen_recall::ChatProvider;
///
/// let provider = ChatProvider::from_config(&LlmConfig::default()).unwrap();
/// assert_eq!(provider.name(), "openai");
///
/// let config = LlmConfig { provider: "gemini".into(), ..LlmConfig::default() };
/// assert!(ChatProvider::from_config(&config).is_err());
/// ```
#[derive(Debug, Clone)]
pub enum ChatProvider {
    /// OpenAI-compatible `/v1/chat/completions`, streamed as server-sent
    /// events.
    OpenAi(Endpoint),
    /// Ollama `/api/chat`, streamed as newline-delimited JSON.
    Ollama(Endpoint),
}

impl ChatProvider {
    /// Build the provider named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Config`] for an unknown provider name and
    /// [`LumenError::Llm`] if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LumenError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LumenError::Llm(format!("failed to create HTTP client: {e}")))?;
        let endpoint = |default_base: &str| Endpoint {
            http: http.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        };
        match config.provider.to_lowercase().as_str() {
            "openai" => Ok(ChatProvider::OpenAi(endpoint("https://api.openai.com"))),
            "ollama" => Ok(ChatProvider::Ollama(endpoint("http://127.0.0.1:11434"))),
            other => Err(LumenError::Config(format!("unknown LLM provider: {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi(_) => "openai",
            ChatProvider::Ollama(_) => "ollama",
        }
    }

    pub fn model(&self) -> &str {
        &self.endpoint().model
    }

    fn endpoint(&self) -> &Endpoint {
        match self {
            ChatProvider::OpenAi(e) | ChatProvider::Ollama(e) => e,
        }
    }

    /// Stream a chat completion and return the full reply.
    ///
    /// `on_text` receives the reply accumulated so far after every delta.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Cancelled`] when `cancel` fires before the
    /// stream ends, [`LumenError::Llm`] on HTTP or stream errors.
    pub async fn chat<F>(
        &self,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
        mut on_text: F,
    ) -> Result<String, LumenError>
    where
        F: FnMut(&str) + Send,
    {
        let endpoint = self.endpoint();
        let (url, body) = match self {
            ChatProvider::OpenAi(e) => (
                format!("{}/v1/chat/completions", e.base_url),
                serde_json::json!({
                    "model": e.model,
                    "messages": messages,
                    "temperature": 0.1,
                    "stream": true,
                }),
            ),
            ChatProvider::Ollama(e) => (
                format!("{}/api/chat", e.base_url),
                serde_json::json!({
                    "model": e.model,
                    "messages": messages,
                    "stream": true,
                }),
            ),
        };

        let mut request = endpoint.http.post(&url).json(&body);
        if let Some(api_key) = &endpoint.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LumenError::Cancelled),
            sent = request.send() => sent.map_err(|e| LumenError::Llm(format!("request failed: {e}")))?,
        };
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LumenError::Llm(format!("LLM API error {status}: {body_text}")));
        }

        let mut lines = LineBuffer::default();
        let mut text = String::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LumenError::Cancelled),
                chunk = response.chunk() => chunk.map_err(|e| LumenError::Llm(format!("stream failed: {e}")))?,
            };
            let Some(chunk) = chunk else {
                break;
            };
            for line in lines.push(&chunk) {
                let delta = match self {
                    ChatProvider::OpenAi(_) => parse_sse_line(&line)?,
                    ChatProvider::Ollama(_) => parse_ndjson_line(&line)?,
                };
                match delta {
                    StreamEvent::Delta(delta) if !delta.is_empty() => {
                        text.push_str(&delta);
                        on_text(&text);
                    }
                    StreamEvent::Delta(_) | StreamEvent::Skip => {}
                    StreamEvent::Done => return Ok(text),
                }
            }
        }
        if let Some(line) = lines.finish() {
            let delta = match self {
                ChatProvider::OpenAi(_) => parse_sse_line(&line)?,
                ChatProvider::Ollama(_) => parse_ndjson_line(&line)?,
            };
            if let StreamEvent::Delta(delta) = delta {
                text.push_str(&delta);
                on_text(&text);
            }
        }
        Ok(text)
    }

    /// [`ChatProvider::chat`] without progress callbacks.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String, LumenError> {
        self.chat(messages, cancel, |_| {}).await
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    Delta(String),
    Done,
    Skip,
}

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

#[derive(Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

fn parse_sse_line(line: &str) -> Result<StreamEvent, LumenError> {
    let Some(data) = line.strip_prefix("data:") else {
        // Comments, `event:` and `id:` lines carry no text.
        return Ok(StreamEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    let chunk: OpenAiChunk = serde_json::from_str(data)
        .map_err(|e| LumenError::Llm(format!("malformed stream chunk: {e}")))?;
    let delta = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect::<String>();
    Ok(StreamEvent::Delta(delta))
}

#[derive(Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<ChatMessageDelta>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageDelta {
    #[serde(default)]
    content: String,
}

fn parse_ndjson_line(line: &str) -> Result<StreamEvent, LumenError> {
    let chunk: OllamaChunk = serde_json::from_str(line)
        .map_err(|e| LumenError::Llm(format!("malformed stream chunk: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(LumenError::Llm(error));
    }
    let delta = chunk.message.map(|m| m.content).unwrap_or_default();
    if chunk.done && delta.is_empty() {
        return Ok(StreamEvent::Done);
    }
    Ok(StreamEvent::Delta(delta))
}
