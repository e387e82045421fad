//! LLM enrichment for coaching text
//!
//! Defines the boundary the coach uses to ask an external model for a richer
//! version of the deterministic text, and a Claude-backed implementation of
//! it. Providers report failure through the outcome, never by erroring, so
//! the coach can always fall back to its baseline.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::CoachConfig;
use crate::models::{ChatMessage, ChatRole, ContentKind};

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 600;

const MAX_RESPONSE_CHARS: usize = 700;
/// Only cut back to a sentence end if that keeps at least this much text
const MIN_SENTENCE_CUT: usize = 400;

const HISTORY_TURNS: usize = 4;
const HISTORY_SNIPPET_CHARS: usize = 150;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Enrichment Boundary
/// ---------------------------------------------------------------------------

/// What the coach hands to a provider
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentPayload {
  Workout(Map<String, Value>),
  Weekly(Map<String, Value>),
  Chat {
    message: String,
    context: Map<String, Value>,
    history: Vec<ChatMessage>,
  },
}

impl EnrichmentPayload {
  pub fn kind(&self) -> ContentKind {
    match self {
      EnrichmentPayload::Workout(_) => ContentKind::Workout,
      EnrichmentPayload::Weekly(_) => ContentKind::Weekly,
      EnrichmentPayload::Chat { .. } => ContentKind::Chat,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentMeta {
  pub model: String,
  pub context_type: String,
  pub duration_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
  pub text: Option<String>,
  pub success: bool,
  pub meta: EnrichmentMeta,
}

impl EnrichmentOutcome {
  pub fn succeeded(text: String, meta: EnrichmentMeta) -> Self {
    Self { text: Some(text), success: true, meta }
  }

  pub fn failed(meta: EnrichmentMeta) -> Self {
    Self { text: None, success: false, meta }
  }

  /// The usable text, if the provider both succeeded and said something
  pub fn into_text(self) -> Option<String> {
    match self.text {
      Some(text) if self.success && !text.trim().is_empty() => Some(text),
      _ => None,
    }
  }
}

/// An external source of enriched coaching text.
///
/// Implementations must not panic or block indefinitely on purpose, but the
/// coach guards against both anyway.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
  async fn enrich(&self, payload: &EnrichmentPayload, user_id: &str) -> EnrichmentOutcome;
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  api_key: String,
  api_url: String,
  model: String,
}

impl ClaudeClient {
  pub fn from_config(config: &CoachConfig) -> Result<Self, LlmError> {
    let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
    Ok(Self::with_endpoint(api_key, &config.llm_api_url, &config.llm_model))
  }

  pub fn with_endpoint(
    api_key: impl Into<String>,
    api_url: impl Into<String>,
    model: impl Into<String>,
  ) -> Self {
    Self {
      client: Client::new(),
      api_key: api_key.into(),
      api_url: api_url.into(),
      model: model.into(),
    }
  }

  pub fn model(&self) -> &str {
    &self.model
  }

  /// Call Claude with a system prompt and user message
  pub async fn complete(
    &self,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
  ) -> Result<(String, Usage), LlmError> {
    let request = ClaudeRequest {
      model: self.model.clone(),
      max_tokens,
      system: system_prompt.to_string(),
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
      }],
    };

    let response = self
      .client
      .post(&self.api_url)
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    let text = claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))?;

    Ok((text, claude_response.usage))
  }
}

#[async_trait]
impl EnrichmentProvider for ClaudeClient {
  async fn enrich(&self, payload: &EnrichmentPayload, user_id: &str) -> EnrichmentOutcome {
    let kind = payload.kind();
    let started = Instant::now();
    let (system_prompt, user_message) = build_prompt(payload);

    let result = self.complete(system_prompt, &user_message, MAX_TOKENS).await;

    let elapsed = started.elapsed().as_secs_f64();
    let meta = EnrichmentMeta {
      model: self.model.clone(),
      context_type: kind.as_str().to_string(),
      duration_seconds: (elapsed * 100.0).round() / 100.0,
    };

    match result {
      Ok((text, usage)) => {
        let cleaned = clean_response(&text);
        if cleaned.is_empty() {
          warn!(kind = %kind, user_id, "LLM returned an empty response");
          return EnrichmentOutcome::failed(meta);
        }
        info!(
          kind = %kind,
          user_id,
          seconds = meta.duration_seconds,
          input_tokens = usage.input_tokens,
          output_tokens = usage.output_tokens,
          "LLM enrichment succeeded"
        );
        EnrichmentOutcome::succeeded(cleaned, meta)
      }
      Err(e) => {
        warn!(kind = %kind, user_id, error = %e, "LLM enrichment failed");
        EnrichmentOutcome::failed(meta)
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Prompt Construction
/// ---------------------------------------------------------------------------

/// Pick the system prompt and render the user message for a payload
pub fn build_prompt(payload: &EnrichmentPayload) -> (&'static str, String) {
  match payload {
    EnrichmentPayload::Workout(stats) => (
      include_str!("prompts/coach_session.txt"),
      format!(
        "SESSION DATA:\n{}\n\nReview this session as a supportive running coach.",
        format_context(stats)
      ),
    ),
    EnrichmentPayload::Weekly(stats) => (
      include_str!("prompts/coach_weekly.txt"),
      format!(
        "WEEK STATS:\n{}\n\nWrite a motivating, personal weekly review based on these numbers.",
        format_context(stats)
      ),
    ),
    EnrichmentPayload::Chat { message, context, history } => (
      include_str!("prompts/coach_chat.txt"),
      format!(
        "ATHLETE DATA:\n{}\n\nCONVERSATION SO FAR:\n{}\n\nQUESTION: {}\n\nAnswer as a motivating running coach.",
        format_context(context),
        format_history(history),
        message
      ),
    ),
  }
}

/// One `- key: value` line per non-empty field
fn format_context(data: &Map<String, Value>) -> String {
  let lines: Vec<String> = data
    .iter()
    .filter(|(_, value)| !is_blank(value))
    .map(|(key, value)| match value {
      Value::String(s) => format!("- {}: {}", key, s),
      other => format!("- {}: {}", key, other),
    })
    .collect();

  if lines.is_empty() {
    "No data".to_string()
  } else {
    lines.join("\n")
  }
}

fn is_blank(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.is_empty(),
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
    _ => false,
  }
}

/// Last few turns, each clipped
fn format_history(history: &[ChatMessage]) -> String {
  if history.is_empty() {
    return "Start of conversation".to_string();
  }

  let start = history.len().saturating_sub(HISTORY_TURNS);
  history[start..]
    .iter()
    .map(|msg| {
      let role = match msg.role {
        ChatRole::User => "User",
        ChatRole::Coach => "Coach",
      };
      let snippet: String = msg.content.chars().take(HISTORY_SNIPPET_CHARS).collect();
      format!("{}: {}", role, snippet)
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Tidy a model reply: trim, drop wrapping quotes, cap the length.
///
/// Over-long replies are cut at the last sentence end when that still leaves
/// a reasonable amount of text.
pub fn clean_response(response: &str) -> String {
  let mut text = response.trim();
  if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
    text = &text[1..text.len() - 1];
  }

  let chars: Vec<char> = text.chars().collect();
  if chars.len() <= MAX_RESPONSE_CHARS {
    return text.trim().to_string();
  }

  let head = &chars[..MAX_RESPONSE_CHARS];
  let cut = match head.iter().rposition(|c| matches!(c, '.' | '!' | '?')) {
    Some(pos) if pos > MIN_SENTENCE_CUT => &head[..=pos],
    _ => head,
  };
  cut.iter().collect::<String>().trim().to_string()
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
