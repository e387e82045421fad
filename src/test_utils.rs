//! Test utilities shared by the unit tests
//!
//! This module provides:
//! - A manually driven clock for TTL tests
//! - A scripted enrichment provider that counts its calls
//! - Mock data factories for analyzer output

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::cache::Clock;
use crate::llm::{EnrichmentMeta, EnrichmentOutcome, EnrichmentPayload, EnrichmentProvider};
use crate::models::{Comparison, SessionAnalysis, WeeklyAnalysis, WeeklyMetrics, WorkoutInput};

/// ---------------------------------------------------------------------------
/// Manual Clock
/// ---------------------------------------------------------------------------

/// Clock that only moves when a test tells it to
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new() -> Self {
    let start = Utc
      .with_ymd_and_hms(2026, 3, 2, 7, 0, 0)
      .single()
      .expect("valid start time");
    Self { now: Mutex::new(start) }
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap();
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap()
  }
}

/// ---------------------------------------------------------------------------
/// Scripted Provider
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Script {
  Reply(String),
  Fail,
  /// Sleep, then reply
  Slow(std::time::Duration, String),
  Panic,
}

/// Enrichment provider that plays back a fixed behaviour
pub struct ScriptedProvider {
  script: Script,
  calls: AtomicUsize,
  payloads: Mutex<Vec<EnrichmentPayload>>,
}

impl ScriptedProvider {
  pub fn new(script: Script) -> Self {
    Self {
      script,
      calls: AtomicUsize::new(0),
      payloads: Mutex::new(Vec::new()),
    }
  }

  pub fn replying(text: &str) -> Self {
    Self::new(Script::Reply(text.to_string()))
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_payload(&self) -> Option<EnrichmentPayload> {
    self.payloads.lock().unwrap().last().cloned()
  }
}

fn test_meta(payload: &EnrichmentPayload) -> EnrichmentMeta {
  EnrichmentMeta {
    model: "scripted".to_string(),
    context_type: payload.kind().as_str().to_string(),
    duration_seconds: 0.0,
  }
}

#[async_trait]
impl EnrichmentProvider for ScriptedProvider {
  async fn enrich(&self, payload: &EnrichmentPayload, _user_id: &str) -> EnrichmentOutcome {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.payloads.lock().unwrap().push(payload.clone());

    match &self.script {
      Script::Reply(text) => EnrichmentOutcome::succeeded(text.clone(), test_meta(payload)),
      Script::Fail => EnrichmentOutcome::failed(test_meta(payload)),
      Script::Slow(delay, text) => {
        tokio::time::sleep(*delay).await;
        EnrichmentOutcome::succeeded(text.clone(), test_meta(payload))
      }
      Script::Panic => panic!("scripted provider panic"),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// A 10 km easy run
pub fn sample_workout() -> WorkoutInput {
  let zones = json!({"z1": 20.0, "z2": 65.0, "z3": 15.0});
  WorkoutInput {
    id: Some("run_2026_03_02".to_string()),
    distance_km: Some(10.0),
    duration_minutes: Some(55.0),
    avg_heart_rate: Some(145),
    max_heart_rate: Some(168),
    elevation_gain_m: Some(85.0),
    workout_type: Some("easy".to_string()),
    effort_zone_distribution: zones.as_object().cloned().unwrap_or_default(),
  }
}

pub fn sample_session_analysis() -> SessionAnalysis {
  SessionAnalysis {
    summary: "Steady easy run, heart rate well controlled.".to_string(),
    pace_str: Some("5:30".to_string()),
    comparison: Comparison {
      progression: Some("slightly faster than usual".to_string()),
      evolution: None,
    },
    strengths: vec!["Even pacing".to_string()],
    improvements: vec!["Cadence could be higher".to_string()],
    ..Default::default()
  }
}

pub fn sample_weekly_analysis() -> WeeklyAnalysis {
  WeeklyAnalysis {
    summary: "Four sessions, volume up 10% on last week.".to_string(),
    metrics: WeeklyMetrics {
      session_count: 4,
      total_km: 42.5,
      total_duration_min: 240.0,
      avg_pace: Some("5:39".to_string()),
      avg_cadence: Some(172.0),
      load_ratio: 1.1,
      ..Default::default()
    },
    strengths: vec!["Consistency".to_string()],
    improvements: vec!["Add one quality session".to_string()],
    comparison: Comparison {
      progression: None,
      evolution: Some("up".to_string()),
    },
  }
}
