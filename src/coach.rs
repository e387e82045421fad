//! Coaching cascade: cache, deterministic baseline, optional enrichment
//!
//! Every request is answered. A cache hit returns the stored text; a miss
//! takes the analyzer's summary as the baseline and asks the enrichment
//! provider for something better within a deadline. Whatever comes out is
//! cached (workout and weekly only) and returned with a flag saying whether
//! enrichment was used.
//!
//! Concurrent misses on the same fingerprint each call the provider; the
//! last one to finish owns the cache entry.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheStats, Clock, SystemClock, TtlCache};
use crate::config::CoachConfig;
use crate::llm::{ClaudeClient, EnrichmentMeta, EnrichmentPayload, EnrichmentProvider};
use crate::metrics::{CoachMetrics, MetricsSnapshot, ResponsePath};
use crate::models::{ChatMessage, ContentKind, SessionAnalysis, WeeklyAnalysis, WorkoutInput};

/// Reply used when both enrichment and the template responder fail
pub const APOLOGY_TEXT: &str = "Sorry, I couldn't process your request. Please try again.";

/// ---------------------------------------------------------------------------
/// Responses
/// ---------------------------------------------------------------------------

/// Coaching text plus whether the enrichment provider wrote it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachResponse {
  pub text: String,
  pub used_enrichment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ChatMetadata {
  Enrichment { model: String, duration_seconds: f64 },
  Template { suggestions: Vec<String> },
  Apology,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
  pub text: String,
  pub used_enrichment: bool,
  pub metadata: ChatMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearedCaches {
  pub cleared_workout: usize,
  pub cleared_weekly: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheReport {
  pub workout: CacheStats,
  pub weekly: CacheStats,
}

/// ---------------------------------------------------------------------------
/// Template Fallback Boundary
/// ---------------------------------------------------------------------------

/// Reply produced by the chat template engine
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateReply {
  pub response: String,
  pub suggestions: Vec<String>,
}

#[derive(Error, Debug, Serialize)]
pub enum ResponderError {
  #[error("No template matched: {0}")]
  NoMatch(String),

  #[error("Template engine failed: {0}")]
  Failed(String),
}

/// Deterministic chat replies, used when enrichment is unavailable
#[async_trait]
pub trait FallbackResponder: Send + Sync {
  async fn respond(&self, message: &str, user_id: &str) -> Result<TemplateReply, ResponderError>;
}

/// ---------------------------------------------------------------------------
/// Enrichment Stage
/// ---------------------------------------------------------------------------

/// Why an enrichment attempt produced nothing usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentFailure {
  NotConfigured,
  Timeout,
  /// Provider answered but reported failure or returned blank text
  Declined,
  Panicked,
}

impl std::fmt::Display for EnrichmentFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::NotConfigured => write!(f, "not configured"),
      Self::Timeout => write!(f, "timed out"),
      Self::Declined => write!(f, "declined"),
      Self::Panicked => write!(f, "provider panicked"),
    }
  }
}

#[derive(Debug, Clone)]
pub enum EnrichmentStage {
  Enriched { text: String, meta: EnrichmentMeta },
  Failed(EnrichmentFailure),
}

/// Run one provider call under a deadline.
///
/// The call runs in its own task so a panic inside the provider surfaces as
/// a join error instead of unwinding through the caller.
async fn attempt_enrichment(
  provider: Option<Arc<dyn EnrichmentProvider>>,
  payload: EnrichmentPayload,
  user_id: String,
  deadline: Duration,
) -> EnrichmentStage {
  let Some(provider) = provider else {
    return EnrichmentStage::Failed(EnrichmentFailure::NotConfigured);
  };

  let mut call = tokio::spawn(async move { provider.enrich(&payload, &user_id).await });

  match tokio::time::timeout(deadline, &mut call).await {
    Err(_) => {
      call.abort();
      EnrichmentStage::Failed(EnrichmentFailure::Timeout)
    }
    Ok(Err(_)) => EnrichmentStage::Failed(EnrichmentFailure::Panicked),
    Ok(Ok(outcome)) => {
      let meta = outcome.meta.clone();
      match outcome.into_text() {
        Some(text) => EnrichmentStage::Enriched { text, meta },
        None => EnrichmentStage::Failed(EnrichmentFailure::Declined),
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Coach Service
/// ---------------------------------------------------------------------------

type SharedCache = Arc<Mutex<TtlCache<CoachResponse>>>;

pub struct CoachService {
  workout_cache: SharedCache,
  weekly_cache: SharedCache,
  metrics: Arc<CoachMetrics>,
  provider: Option<Arc<dyn EnrichmentProvider>>,
  enrichment_timeout: Duration,
}

impl CoachService {
  pub fn new(config: &CoachConfig, provider: Option<Arc<dyn EnrichmentProvider>>) -> Self {
    Self::with_clock(config, provider, Arc::new(SystemClock))
  }

  pub fn with_clock(
    config: &CoachConfig,
    provider: Option<Arc<dyn EnrichmentProvider>>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let make_cache = || {
      Arc::new(Mutex::new(TtlCache::with_clock(
        config.cache_ttl,
        config.max_cache_size,
        Arc::clone(&clock),
      )))
    };

    Self {
      workout_cache: make_cache(),
      weekly_cache: make_cache(),
      metrics: Arc::new(CoachMetrics::new()),
      provider,
      enrichment_timeout: config.enrichment_timeout,
    }
  }

  /// Service backed by the Claude provider when an API key is configured
  pub fn from_config(config: &CoachConfig) -> Self {
    let provider: Option<Arc<dyn EnrichmentProvider>> = match ClaudeClient::from_config(config) {
      Ok(client) => {
        info!(model = client.model(), "Coach enrichment enabled");
        Some(Arc::new(client))
      }
      Err(e) => {
        info!(reason = %e, "Coach enrichment disabled, using deterministic text only");
        None
      }
    };
    Self::new(config, provider)
  }

  /// Coaching text for a single workout
  pub async fn analyze_workout(
    &self,
    workout: &WorkoutInput,
    analysis: &SessionAnalysis,
    user_id: &str,
  ) -> CoachResponse {
    let key = cache_key(ContentKind::Workout.as_str(), &workout.fingerprint_parts());
    let payload = EnrichmentPayload::Workout(workout_stats(workout, analysis));
    self
      .cascade(ContentKind::Workout, &self.workout_cache, key, &analysis.summary, payload, user_id)
      .await
  }

  /// Coaching text for a week of training
  pub async fn weekly_review(&self, analysis: &WeeklyAnalysis, user_id: &str) -> CoachResponse {
    let key = cache_key(ContentKind::Weekly.as_str(), &analysis.fingerprint_parts());
    let payload = EnrichmentPayload::Weekly(weekly_stats(analysis));
    self
      .cascade(ContentKind::Weekly, &self.weekly_cache, key, &analysis.summary, payload, user_id)
      .await
  }

  /// Conversational reply. Never cached.
  pub async fn chat_response(
    &self,
    message: &str,
    context: Map<String, Value>,
    history: &[ChatMessage],
    user_id: &str,
    responder: &dyn FallbackResponder,
  ) -> ChatReply {
    let started = Instant::now();
    let payload = EnrichmentPayload::Chat {
      message: message.to_string(),
      context,
      history: history.to_vec(),
    };

    let stage = attempt_enrichment(
      self.provider.clone(),
      payload,
      user_id.to_string(),
      self.enrichment_timeout,
    )
    .await;

    let reply = match stage {
      EnrichmentStage::Enriched { text, meta } => {
        info!(user_id, model = %meta.model, seconds = meta.duration_seconds, "Chat reply enriched");
        ChatReply {
          text,
          used_enrichment: true,
          metadata: ChatMetadata::Enrichment {
            model: meta.model,
            duration_seconds: meta.duration_seconds,
          },
        }
      }
      EnrichmentStage::Failed(reason) => {
        warn!(user_id, %reason, "Chat falling back to templates");
        match responder.respond(message, user_id).await {
          Ok(template) => ChatReply {
            text: template.response,
            used_enrichment: false,
            metadata: ChatMetadata::Template { suggestions: template.suggestions },
          },
          Err(e) => {
            warn!(user_id, error = %e, "Template fallback failed");
            ChatReply {
              text: APOLOGY_TEXT.to_string(),
              used_enrichment: false,
              metadata: ChatMetadata::Apology,
            }
          }
        }
      }
    };

    let path = if reply.used_enrichment {
      ResponsePath::Enriched
    } else {
      ResponsePath::Fallback
    };
    self.metrics.record(ContentKind::Chat, path, started.elapsed());
    reply
  }

  async fn cascade(
    &self,
    kind: ContentKind,
    cache: &SharedCache,
    key: String,
    baseline: &str,
    payload: EnrichmentPayload,
    user_id: &str,
  ) -> CoachResponse {
    let started = Instant::now();

    let hit = lock(cache).get(&key);
    if let Some(cached) = hit {
      debug!(kind = %kind, key = &key[..8], "Cache hit");
      self.metrics.record(kind, ResponsePath::CacheHit, started.elapsed());
      return cached;
    }

    // Enrichment, the cache write and the metrics outlive a cancelled caller
    let task = {
      let provider = self.provider.clone();
      let cache = Arc::clone(cache);
      let metrics = Arc::clone(&self.metrics);
      let baseline = baseline.to_string();
      let user_id = user_id.to_string();
      let deadline = self.enrichment_timeout;

      tokio::spawn(async move {
        let stage = attempt_enrichment(provider, payload, user_id.clone(), deadline).await;
        let (response, path) = match stage {
          EnrichmentStage::Enriched { text, meta } => {
            info!(kind = %kind, user_id = %user_id, seconds = meta.duration_seconds, "Coaching text enriched");
            (CoachResponse { text, used_enrichment: true }, ResponsePath::Enriched)
          }
          EnrichmentStage::Failed(reason) => {
            warn!(kind = %kind, user_id = %user_id, %reason, "Falling back to deterministic text");
            (CoachResponse { text: baseline, used_enrichment: false }, ResponsePath::Fallback)
          }
        };
        lock(&cache).put(key, response.clone());
        metrics.record(kind, path, started.elapsed());
        response
      })
    };

    match task.await {
      Ok(response) => response,
      Err(e) => {
        warn!(kind = %kind, error = %e, "Enrichment task failed");
        self.metrics.record(kind, ResponsePath::Fallback, started.elapsed());
        CoachResponse { text: baseline.to_string(), used_enrichment: false }
      }
    }
  }

  /// ---------------------------------------------------------------------------
  /// Operator Surface
  /// ---------------------------------------------------------------------------

  pub fn clear_cache(&self) -> ClearedCaches {
    let cleared = ClearedCaches {
      cleared_workout: lock(&self.workout_cache).clear(),
      cleared_weekly: lock(&self.weekly_cache).clear(),
    };
    info!(
      workout = cleared.cleared_workout,
      weekly = cleared.cleared_weekly,
      "Coach caches cleared"
    );
    cleared
  }

  pub fn cache_stats(&self) -> CacheReport {
    CacheReport {
      workout: lock(&self.workout_cache).stats(),
      weekly: lock(&self.weekly_cache).stats(),
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  /// Zero the counters, returning the values they held
  pub fn reset_metrics(&self) -> MetricsSnapshot {
    self.metrics.reset()
  }
}

fn lock(cache: &SharedCache) -> MutexGuard<'_, TtlCache<CoachResponse>> {
  cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// ---------------------------------------------------------------------------
/// Provider Payloads
/// ---------------------------------------------------------------------------

fn workout_stats(workout: &WorkoutInput, analysis: &SessionAnalysis) -> Map<String, Value> {
  into_map(json!({
    "distance_km": workout.distance_km.unwrap_or(0.0),
    "duration_min": workout.duration_minutes.unwrap_or(0.0),
    "pace": analysis.pace_str.as_deref().unwrap_or("N/A"),
    "avg_hr": workout.avg_heart_rate,
    "max_hr": workout.max_heart_rate,
    "elevation_m": workout.elevation_gain_m,
    "type": workout.workout_type,
    "zones": workout.effort_zone_distribution,
    "splits": analysis.splits_analysis,
    "comparison": analysis.comparison.progression.as_deref().unwrap_or(""),
    "strengths": analysis.strengths,
    "improvements": analysis.improvements,
  }))
}

fn weekly_stats(analysis: &WeeklyAnalysis) -> Map<String, Value> {
  let metrics = &analysis.metrics;
  into_map(json!({
    "weekly_km": metrics.total_km,
    "session_count": metrics.session_count,
    "avg_pace": metrics.avg_pace.as_deref().unwrap_or("N/A"),
    "avg_cadence": metrics.avg_cadence.unwrap_or(0.0),
    "zones": metrics.zones,
    "load_ratio": metrics.load_ratio,
    "strengths": analysis.strengths,
    "improvements": analysis.improvements,
    "trend": analysis.comparison.evolution.as_deref().unwrap_or("stable"),
  }))
}

fn into_map(value: Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map,
    _ => Map::new(),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{
    sample_session_analysis, sample_weekly_analysis, sample_workout, ManualClock, Script,
    ScriptedProvider,
  };

  const ENRICHED: &str = "Great controlled run, keep building that base.";

  fn test_config() -> CoachConfig {
    CoachConfig {
      enrichment_timeout: Duration::from_millis(200),
      ..Default::default()
    }
  }

  fn service_with(script: Script) -> (CoachService, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new(script));
    let dyn_provider: Arc<dyn EnrichmentProvider> = provider.clone();
    (CoachService::new(&test_config(), Some(dyn_provider)), provider)
  }

  struct StaticResponder;

  #[async_trait]
  impl FallbackResponder for StaticResponder {
    async fn respond(&self, _message: &str, _user_id: &str) -> Result<TemplateReply, ResponderError> {
      Ok(TemplateReply {
        response: "Keep it easy today.".to_string(),
        suggestions: vec!["How is my week?".to_string()],
      })
    }
  }

  struct BrokenResponder;

  #[async_trait]
  impl FallbackResponder for BrokenResponder {
    async fn respond(&self, message: &str, _user_id: &str) -> Result<TemplateReply, ResponderError> {
      Err(ResponderError::NoMatch(message.to_string()))
    }
  }

  /// ---------------------------------------------------------------------------
  /// Workout Cascade Tests
  /// ---------------------------------------------------------------------------

  #[tokio::test]
  async fn test_repeated_fingerprint_calls_provider_once() {
    // Arrange
    let (service, provider) = service_with(Script::Reply(ENRICHED.to_string()));
    let workout = sample_workout();
    let analysis = sample_session_analysis();

    // Act
    let first = service.analyze_workout(&workout, &analysis, "athlete").await;
    let second = service.analyze_workout(&workout, &analysis, "athlete").await;

    // Assert
    assert_eq!(provider.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first.text, ENRICHED);
    assert!(first.used_enrichment);

    let metrics = service.metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.llm_success, 1);
    assert_eq!(metrics.workout_requests, 2);
  }

  #[tokio::test]
  async fn test_fallback_is_cached_with_its_flag() {
    let (service, provider) = service_with(Script::Fail);
    let workout = sample_workout();
    let analysis = sample_session_analysis();

    let first = service.analyze_workout(&workout, &analysis, "athlete").await;
    let second = service.analyze_workout(&workout, &analysis, "athlete").await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(first.text, analysis.summary);
    assert!(!first.used_enrichment);
    assert_eq!(first, second);
    assert_eq!(service.metrics().llm_fallback, 1);
  }

  #[tokio::test]
  async fn test_timeout_falls_back_to_baseline() {
    // Arrange: provider sleeps well past the 200ms deadline
    let (service, _provider) =
      service_with(Script::Slow(Duration::from_secs(5), ENRICHED.to_string()));
    let analysis = sample_session_analysis();

    // Act
    let response = service.analyze_workout(&sample_workout(), &analysis, "athlete").await;

    // Assert
    assert_eq!(response.text, analysis.summary);
    assert!(!response.used_enrichment);
  }

  #[tokio::test]
  async fn test_missing_provider_falls_back() {
    let service = CoachService::new(&test_config(), None);
    let analysis = sample_session_analysis();

    let response = service.analyze_workout(&sample_workout(), &analysis, "athlete").await;

    assert_eq!(response.text, analysis.summary);
    assert!(!response.used_enrichment);
    assert_eq!(service.cache_stats().workout.size, 1);
  }

  #[tokio::test]
  async fn test_panicking_provider_falls_back() {
    let (service, provider) = service_with(Script::Panic);
    let analysis = sample_session_analysis();

    let response = service.analyze_workout(&sample_workout(), &analysis, "athlete").await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(response.text, analysis.summary);
    assert!(!response.used_enrichment);
  }

  #[tokio::test]
  async fn test_cancelled_caller_still_populates_cache() {
    // Arrange
    let (service, provider) =
      service_with(Script::Slow(Duration::from_millis(50), ENRICHED.to_string()));
    let service = Arc::new(service);
    let workout = sample_workout();
    let analysis = sample_session_analysis();

    // Act: abort the caller while enrichment is in flight
    let caller = {
      let service = Arc::clone(&service);
      let workout = workout.clone();
      let analysis = analysis.clone();
      tokio::spawn(async move { service.analyze_workout(&workout, &analysis, "athlete").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    caller.abort();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Assert: the next request is served from cache
    let response = service.analyze_workout(&workout, &analysis, "athlete").await;
    assert_eq!(provider.calls(), 1);
    assert_eq!(response.text, ENRICHED);
    assert!(response.used_enrichment);

    // Both the aborted request and the cache hit are counted
    let metrics = service.metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.llm_success, 1);
    assert_eq!(metrics.cache_hits, 1);
  }

  #[tokio::test]
  async fn test_concurrent_misses_each_call_provider() {
    // Arrange
    let (service, provider) =
      service_with(Script::Slow(Duration::from_millis(30), ENRICHED.to_string()));
    let workout = sample_workout();
    let analysis = sample_session_analysis();

    // Act: both requests miss before either writes the cache
    let (first, second) = tokio::join!(
      service.analyze_workout(&workout, &analysis, "athlete"),
      service.analyze_workout(&workout, &analysis, "athlete"),
    );

    // Assert: no dedupe, one surviving entry
    assert_eq!(provider.calls(), 2);
    assert_eq!(first, second);
    assert!(first.used_enrichment);
    assert_eq!(service.cache_stats().workout.size, 1);
    assert_eq!(service.metrics().llm_success, 2);
  }

  #[tokio::test]
  async fn test_expired_entry_triggers_new_enrichment() {
    let provider = Arc::new(ScriptedProvider::replying(ENRICHED));
    let dyn_provider: Arc<dyn EnrichmentProvider> = provider.clone();
    let clock = Arc::new(ManualClock::new());
    let service = CoachService::with_clock(&test_config(), Some(dyn_provider), clock.clone());
    let workout = sample_workout();
    let analysis = sample_session_analysis();

    service.analyze_workout(&workout, &analysis, "athlete").await;
    clock.advance(chrono::Duration::seconds(3600));
    service.analyze_workout(&workout, &analysis, "athlete").await;

    assert_eq!(provider.calls(), 2);
  }

  #[tokio::test]
  async fn test_workout_payload_fields() {
    let (service, provider) = service_with(Script::Reply(ENRICHED.to_string()));

    service
      .analyze_workout(&sample_workout(), &sample_session_analysis(), "athlete")
      .await;

    let Some(EnrichmentPayload::Workout(stats)) = provider.last_payload() else {
      panic!("expected a workout payload");
    };
    assert_eq!(stats["distance_km"], 10.0);
    assert_eq!(stats["pace"], "5:30");
    assert_eq!(stats["avg_hr"], 145);
    assert_eq!(stats["comparison"], "slightly faster than usual");
    assert_eq!(stats["zones"]["z2"], 65.0);
  }

  /// ---------------------------------------------------------------------------
  /// Weekly Cascade Tests
  /// ---------------------------------------------------------------------------

  #[tokio::test]
  async fn test_weekly_review_caches_by_volume() {
    let (service, provider) = service_with(Script::Reply(ENRICHED.to_string()));
    let weekly = sample_weekly_analysis();
    let mut reworded = weekly.clone();
    reworded.summary = "Different wording, same numbers.".to_string();

    let first = service.weekly_review(&weekly, "athlete").await;
    let second = service.weekly_review(&reworded, "athlete").await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(service.metrics().weekly_requests, 2);

    let Some(EnrichmentPayload::Weekly(stats)) = provider.last_payload() else {
      panic!("expected a weekly payload");
    };
    assert_eq!(stats["session_count"], 4);
    assert_eq!(stats["trend"], "up");
  }

  #[tokio::test]
  async fn test_workout_and_weekly_caches_are_separate() {
    let service = CoachService::new(&test_config(), None);

    service
      .analyze_workout(&sample_workout(), &sample_session_analysis(), "athlete")
      .await;
    service.weekly_review(&sample_weekly_analysis(), "athlete").await;
    service.weekly_review(&sample_weekly_analysis(), "athlete").await;

    let report = service.cache_stats();
    assert_eq!(report.workout.size, 1);
    assert_eq!(report.weekly.size, 1);
    assert_eq!(report.weekly.ttl_seconds, 3600);
    assert_eq!(report.weekly.max_size, 500);

    let cleared = service.clear_cache();
    assert_eq!(cleared, ClearedCaches { cleared_workout: 1, cleared_weekly: 1 });
    assert_eq!(service.cache_stats().workout.size, 0);
  }

  /// ---------------------------------------------------------------------------
  /// Chat Tests
  /// ---------------------------------------------------------------------------

  #[tokio::test]
  async fn test_chat_uses_enrichment_and_never_caches() {
    let (service, provider) = service_with(Script::Reply(ENRICHED.to_string()));
    let history = vec![ChatMessage::user("Hi"), ChatMessage::coach("Hello!")];

    let first = service
      .chat_response("Should I rest?", Map::new(), &history, "athlete", &StaticResponder)
      .await;
    service
      .chat_response("Should I rest?", Map::new(), &history, "athlete", &StaticResponder)
      .await;

    assert_eq!(provider.calls(), 2);
    assert!(first.used_enrichment);
    assert_eq!(
      first.metadata,
      ChatMetadata::Enrichment { model: "scripted".to_string(), duration_seconds: 0.0 }
    );
    assert_eq!(service.metrics().chat_requests, 2);
  }

  #[tokio::test]
  async fn test_chat_falls_back_to_templates() {
    let (service, _provider) = service_with(Script::Fail);

    let reply = service
      .chat_response("Should I rest?", Map::new(), &[], "athlete", &StaticResponder)
      .await;

    assert_eq!(reply.text, "Keep it easy today.");
    assert!(!reply.used_enrichment);
    assert_eq!(
      reply.metadata,
      ChatMetadata::Template { suggestions: vec!["How is my week?".to_string()] }
    );
    assert_eq!(service.metrics().llm_fallback, 1);
  }

  #[tokio::test]
  async fn test_chat_apologizes_when_templates_fail() {
    let service = CoachService::new(&test_config(), None);

    let reply = service
      .chat_response("???", Map::new(), &[], "athlete", &BrokenResponder)
      .await;

    assert_eq!(reply.text, APOLOGY_TEXT);
    assert_eq!(reply.metadata, ChatMetadata::Apology);

    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["metadata"]["source"], "apology");
  }

  /// ---------------------------------------------------------------------------
  /// Operator Surface Tests
  /// ---------------------------------------------------------------------------

  #[tokio::test]
  async fn test_reset_metrics_returns_previous_counts() {
    let service = CoachService::new(&test_config(), None);
    service
      .analyze_workout(&sample_workout(), &sample_session_analysis(), "athlete")
      .await;
    service
      .analyze_workout(&sample_workout(), &sample_session_analysis(), "athlete")
      .await;

    let before = service.reset_metrics();

    assert_eq!(before.total_requests, 2);
    assert_eq!(before.cache_hits, 1);
    assert_eq!(before.cache_hit_rate, 50.0);
    assert_eq!(service.metrics().total_requests, 0);
  }

  #[test]
  fn test_from_config_without_key_has_no_provider() {
    let service = CoachService::from_config(&CoachConfig::default());

    assert!(service.provider.is_none());
  }
}
