//! Request telemetry for the coaching cascade
//!
//! Counts how each request was served (cache, enrichment, fallback) and keeps
//! exponential moving averages of latency. Averages start at zero and are not
//! warm-started, so the first few samples under-report.

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

use crate::models::ContentKind;

/// EMA smoothing factor
pub const EMA_ALPHA: f64 = 0.1;

/// How a request was ultimately answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePath {
  CacheHit,
  Enriched,
  Fallback,
}

#[derive(Debug, Clone, Default)]
struct MetricsState {
  llm_success: u64,
  llm_fallback: u64,
  cache_hits: u64,
  total_requests: u64,
  workout_requests: u64,
  weekly_requests: u64,
  chat_requests: u64,
  avg_latency_ms: f64,
  avg_llm_latency_ms: f64,
  avg_cache_latency_ms: f64,
}

/// Point-in-time copy of the counters with derived rates (percentages)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
  pub llm_success: u64,
  pub llm_fallback: u64,
  pub cache_hits: u64,
  pub total_requests: u64,
  pub workout_requests: u64,
  pub weekly_requests: u64,
  pub chat_requests: u64,
  pub avg_latency_ms: f64,
  pub avg_llm_latency_ms: f64,
  pub avg_cache_latency_ms: f64,
  pub success_rate: f64,
  pub cache_hit_rate: f64,
}

impl MetricsState {
  fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      llm_success: self.llm_success,
      llm_fallback: self.llm_fallback,
      cache_hits: self.cache_hits,
      total_requests: self.total_requests,
      workout_requests: self.workout_requests,
      weekly_requests: self.weekly_requests,
      chat_requests: self.chat_requests,
      avg_latency_ms: self.avg_latency_ms,
      avg_llm_latency_ms: self.avg_llm_latency_ms,
      avg_cache_latency_ms: self.avg_cache_latency_ms,
      success_rate: percentage(self.llm_success, self.llm_success + self.llm_fallback),
      cache_hit_rate: percentage(self.cache_hits, self.total_requests),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Coach Metrics
/// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CoachMetrics {
  state: Mutex<MetricsState>,
}

impl CoachMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record one finished request
  pub fn record(&self, kind: ContentKind, path: ResponsePath, latency: Duration) {
    let sample_ms = latency.as_secs_f64() * 1000.0;
    let mut state = self.lock();

    state.total_requests += 1;
    match kind {
      ContentKind::Workout => state.workout_requests += 1,
      ContentKind::Weekly => state.weekly_requests += 1,
      ContentKind::Chat => state.chat_requests += 1,
    }
    state.avg_latency_ms = ema(state.avg_latency_ms, sample_ms);

    match path {
      ResponsePath::CacheHit => {
        state.cache_hits += 1;
        state.avg_cache_latency_ms = ema(state.avg_cache_latency_ms, sample_ms);
      }
      ResponsePath::Enriched => {
        state.llm_success += 1;
        state.avg_llm_latency_ms = ema(state.avg_llm_latency_ms, sample_ms);
      }
      ResponsePath::Fallback => {
        state.llm_fallback += 1;
        state.avg_llm_latency_ms = ema(state.avg_llm_latency_ms, sample_ms);
      }
    }
  }

  pub fn snapshot(&self) -> MetricsSnapshot {
    self.lock().snapshot()
  }

  /// Zero all counters, returning what they held
  pub fn reset(&self) -> MetricsSnapshot {
    let mut state = self.lock();
    let before = state.snapshot();
    *state = MetricsState::default();
    before
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, MetricsState> {
    // Counters stay usable even if a holder panicked
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

fn ema(previous: f64, sample: f64) -> f64 {
  previous * (1.0 - EMA_ALPHA) + sample * EMA_ALPHA
}

/// `part / whole` as a percentage with one decimal, 0 for an empty whole
fn percentage(part: u64, whole: u64) -> f64 {
  if whole == 0 {
    return 0.0;
  }
  (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
