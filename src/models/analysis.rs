use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output of the deterministic session analyzer.
///
/// Only `summary` is required; it doubles as the fallback coaching text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionAnalysis {
  pub summary: String,
  pub pace_str: Option<String>,
  pub splits_analysis: Map<String, Value>,
  pub comparison: Comparison,
  pub strengths: Vec<String>,
  pub improvements: Vec<String>,
}

/// Comparison against the athlete's recent baseline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Comparison {
  /// Progression note for a single session, e.g. "faster than usual"
  pub progression: Option<String>,
  /// Week-over-week direction, e.g. "up" or "stable"
  pub evolution: Option<String>,
}

/// Output of the deterministic weekly analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyAnalysis {
  pub summary: String,
  pub metrics: WeeklyMetrics,
  pub strengths: Vec<String>,
  pub improvements: Vec<String>,
  pub comparison: Comparison,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyMetrics {
  pub session_count: u32,
  pub total_km: f64,
  pub total_duration_min: f64,
  pub avg_pace: Option<String>,
  pub avg_cadence: Option<f64>,
  pub zones: Map<String, Value>,
  /// Acute:chronic ratio as reported by the analyzer
  pub load_ratio: f64,
}

impl Default for WeeklyMetrics {
  fn default() -> Self {
    Self {
      session_count: 0,
      total_km: 0.0,
      total_duration_min: 0.0,
      avg_pace: None,
      avg_cadence: None,
      zones: Map::new(),
      load_ratio: 1.0,
    }
  }
}

impl WeeklyAnalysis {
  /// Weekly fingerprint fields: a synthetic id plus volume and duration.
  ///
  /// Heart rate and type slots stay empty so the key lines up with the
  /// workout fingerprint layout.
  pub fn fingerprint_parts(&self) -> Vec<String> {
    vec![
      format!("weekly_{}_{}", self.metrics.session_count, self.metrics.total_km),
      self.metrics.total_km.to_string(),
      self.metrics.total_duration_min.to_string(),
      String::new(),
      String::new(),
    ]
  }
}
