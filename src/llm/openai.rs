use std::io::{BufRead, BufReader};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, EngineError, NarrationEngine};

// ---------------------------------------------------------------------------
// Provider configuration
// ---------------------------------------------------------------------------

pub struct OpenAiConfig {
    /// Root of an OpenAI-compatible API, without the trailing endpoint.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Maximum tokens to generate per narrator turn.
    pub max_tokens: u32,
    /// Whole-request limit, streaming included. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            temperature: 1.0,
            max_tokens: 1000,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Delta(String),
    Done,
    Skip,
}

/// Interpret one line of the server-sent event stream.
fn parse_stream_line(line: &str) -> Result<StreamLine, EngineError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(StreamLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }
    if data.is_empty() {
        return Ok(StreamLine::Skip);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| EngineError::Transport(format!("malformed stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|piece| !piece.is_empty())
        .map_or(StreamLine::Skip, StreamLine::Delta))
}

/// The `error.message` of a provider error body, or an empty string.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|body| body.error.message)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Streams narration from an OpenAI-compatible chat completions endpoint.
pub struct OpenAiEngine {
    client: reqwest::blocking::Client,
    config: OpenAiConfig,
}

impl OpenAiEngine {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        info!(
            "Narration provider: {} (model={}, max_tokens={})",
            config.base_url, config.model, config.max_tokens
        );
        Ok(Self { client, config })
    }
}

impl NarrationEngine for OpenAiEngine {
    fn narrate(
        &mut self,
        messages: &[ChatMessage],
        credential: Option<&str>,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String, EngineError> {
        let credential = credential.ok_or_else(|| EngineError::Provider {
            status: 401,
            message: "API key is required".into(),
        })?;

        info!("=== NARRATION CALL: {} messages ===", messages.len());
        for (i, msg) in messages.iter().enumerate() {
            debug!("  msg[{i}] {msg}");
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .json(&ApiRequest {
                model: &self.config.model,
                messages,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                stream: true,
            })
            .send()
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            debug!("Provider error body: {body}");
            return Err(EngineError::Provider {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }

        let mut output = String::new();
        for line in BufReader::new(response).lines() {
            let line =
                line.map_err(|e| EngineError::Transport(format!("stream interrupted: {e}")))?;
            match parse_stream_line(&line)? {
                StreamLine::Delta(piece) => {
                    on_chunk(&piece);
                    output.push_str(&piece);
                }
                StreamLine::Done => break,
                StreamLine::Skip => {}
            }
        }

        info!("Narration complete: {} chars", output.len());
        trace!("=== RAW OUTPUT ===\n{output}\n=== END OUTPUT ===");

        if output.trim().is_empty() {
            return Err(EngineError::Transport("the model returned no text".into()));
        }
        Ok(output)
    }
}
