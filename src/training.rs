//! Training load model
//!
//! Pure functions turning fitness aggregates (acute/chronic load, daily
//! loads, weekly volume) into the ratios the periodization engine and the
//! coach reason about. Nothing here is persisted; a context is rebuilt for
//! every request.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// ---------------------------------------------------------------------------
/// Thresholds
/// ---------------------------------------------------------------------------

/// Below this ACWR the athlete is undertraining
pub const ACWR_SAFE_MIN: f64 = 0.8;
/// Upper edge of the optimal ACWR band
pub const ACWR_SAFE_MAX: f64 = 1.3;
/// Injury-risk ACWR
pub const ACWR_DANGER: f64 = 1.5;

pub const TSB_FATIGUE_THRESHOLD: f64 = -20.0;
pub const TSB_FRESH_THRESHOLD: f64 = 10.0;
pub const TSB_CRITICAL_THRESHOLD: f64 = -30.0;
pub const TSB_MODERATE_THRESHOLD: f64 = -10.0;

const DEFAULT_CTL: f64 = 40.0;
const DEFAULT_WEEKLY_KM: f64 = 30.0;

/// ---------------------------------------------------------------------------
/// Risk Level
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
  Low,
  Moderate,
  High,
  Critical,
}

impl RiskLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      RiskLevel::Low => "low",
      RiskLevel::Moderate => "moderate",
      RiskLevel::High => "high",
      RiskLevel::Critical => "critical",
    }
  }
}

impl std::fmt::Display for RiskLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// ---------------------------------------------------------------------------
/// Load Metrics
/// ---------------------------------------------------------------------------

/// Acute:Chronic Workload Ratio.
///
/// Chronic load is the 28-day load averaged per week. With no chronic load
/// the ratio is neutral (1.0).
pub fn compute_acwr(load_7: f64, load_28: f64) -> f64 {
  if load_28 == 0.0 {
    return 1.0;
  }
  let chronic_avg = load_28 / 4.0;
  round_to(load_7 / chronic_avg, 2)
}

/// Training Stress Balance: positive is fresh, negative is fatigued
pub fn compute_tsb(ctl: f64, atl: f64) -> f64 {
  round_to(ctl - atl, 1)
}

/// Mean over population standard deviation of daily loads.
///
/// Returns 0 when there are fewer than two days or no variation at all.
pub fn compute_monotony(daily_loads: &[f64]) -> f64 {
  if daily_loads.len() < 2 {
    return 0.0;
  }

  let n = daily_loads.len() as f64;
  let mean = daily_loads.iter().sum::<f64>() / n;
  let variance = daily_loads.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
  let std_dev = variance.sqrt();

  if std_dev == 0.0 {
    return 0.0;
  }
  round_to(mean / std_dev, 2)
}

pub fn compute_strain(weekly_load: f64, monotony: f64) -> f64 {
  (weekly_load * monotony).round()
}

/// Injury/overtraining risk from load ratio and form.
///
/// Checks run in a fixed order and the bands overlap, so the order decides:
/// an undertrained athlete (low ACWR) reads as `Low` even when moderately
/// fatigued.
pub fn evaluate_risk(acwr: f64, tsb: f64) -> RiskLevel {
  if acwr > ACWR_DANGER || tsb < TSB_CRITICAL_THRESHOLD {
    RiskLevel::Critical
  } else if acwr > ACWR_SAFE_MAX || tsb < TSB_FATIGUE_THRESHOLD {
    RiskLevel::High
  } else if acwr < ACWR_SAFE_MIN {
    RiskLevel::Low
  } else if tsb < TSB_MODERATE_THRESHOLD {
    RiskLevel::Moderate
  } else {
    RiskLevel::Low
  }
}

/// Week of the training cycle containing `today`, starting at 1
pub fn compute_week_number(cycle_start: NaiveDate, today: NaiveDate) -> i32 {
  let days = (today - cycle_start).num_days();
  (days.div_euclid(7) + 1).max(1) as i32
}

/// ---------------------------------------------------------------------------
/// Fitness Context
/// ---------------------------------------------------------------------------

/// Raw aggregates as supplied by the caller. Any field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessInput {
  /// Load over the last 7 days
  pub load_7: Option<f64>,
  /// Load over the last 28 days
  pub load_28: Option<f64>,
  pub ctl: Option<f64>,
  pub atl: Option<f64>,
  pub weekly_km: Option<f64>,
  /// Per-day loads for monotony, most recent week
  pub daily_loads: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessContext {
  pub ctl: f64,
  pub atl: f64,
  pub tsb: f64,
  pub acwr: f64,
  pub weekly_km: f64,
  pub load_7: f64,
  pub load_28: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub monotony: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub strain: Option<f64>,
  pub risk_level: RiskLevel,
}

impl FitnessContext {
  /// Build a context from possibly incomplete aggregates.
  ///
  /// Gaps get neutral values: no loads means ACWR 1.0, no ATL means it
  /// matches CTL (TSB 0).
  pub fn build(input: &FitnessInput) -> Self {
    let load_7 = input.load_7.unwrap_or(0.0);
    let load_28 = input.load_28.unwrap_or(0.0);
    let ctl = input.ctl.unwrap_or(DEFAULT_CTL);
    let atl = input.atl.unwrap_or(ctl);
    let weekly_km = input.weekly_km.unwrap_or(DEFAULT_WEEKLY_KM);

    let acwr = compute_acwr(load_7, load_28);
    let tsb = compute_tsb(ctl, atl);

    let (monotony, strain) = match input.daily_loads.as_deref() {
      Some(loads) if !loads.is_empty() => {
        let monotony = compute_monotony(loads);
        (Some(monotony), Some(compute_strain(load_7, monotony)))
      }
      _ => (None, None),
    };

    Self {
      ctl,
      atl,
      tsb,
      acwr,
      weekly_km,
      load_7,
      load_28,
      monotony,
      strain,
      risk_level: evaluate_risk(acwr, tsb),
    }
  }

  /// Context from already-derived ratios, mainly for planning what-ifs
  pub fn from_ratios(ctl: f64, acwr: f64, tsb: f64, weekly_km: f64) -> Self {
    Self {
      ctl,
      atl: ctl - tsb,
      tsb,
      acwr,
      weekly_km,
      load_7: 0.0,
      load_28: 0.0,
      monotony: None,
      strain: None,
      risk_level: evaluate_risk(acwr, tsb),
    }
  }
}

fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
