use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::render_part;

/// A completed workout as handed to the coach.
///
/// Everything is optional: the deterministic analyzer has already done the
/// heavy lifting and the coach only needs enough to fingerprint the workout
/// and describe it to the enrichment provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkoutInput {
  pub id: Option<String>,
  pub distance_km: Option<f64>,
  pub duration_minutes: Option<f64>,
  pub avg_heart_rate: Option<i64>,
  pub max_heart_rate: Option<i64>,
  pub elevation_gain_m: Option<f64>,
  #[serde(rename = "type")]
  pub workout_type: Option<String>,
  /// Zone name -> percentage of time
  pub effort_zone_distribution: Map<String, Value>,
}

impl WorkoutInput {
  /// Fields that make up the workout cache fingerprint, in key order.
  ///
  /// Two workouts agreeing on id, distance, duration, mean HR and type share
  /// a fingerprint even if their splits or zones differ.
  pub fn fingerprint_parts(&self) -> Vec<String> {
    vec![
      render_part(self.id.as_deref()),
      render_part(self.distance_km),
      render_part(self.duration_minutes),
      render_part(self.avg_heart_rate),
      render_part(self.workout_type.as_deref()),
    ]
  }
}
