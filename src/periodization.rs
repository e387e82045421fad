//! Periodization Engine
//!
//! Maps a week of a training cycle to a phase and turns the athlete's
//! fitness context into next week's targets:
//! - phase (build, deload, intensification, taper, race)
//! - target load and target kilometres
//! - long run / easy / intensity split for the race goal
//!
//! Key principles:
//! - Phase is a pure function of (week, cycle length)
//! - Fatigue adjustments stack on top of the phase multiplier
//! - High ACWR always trims volume

use serde::{Deserialize, Serialize};

use crate::training::{
    FitnessContext, FitnessInput, RiskLevel, ACWR_DANGER, ACWR_SAFE_MAX, TSB_FATIGUE_THRESHOLD,
    TSB_FRESH_THRESHOLD,
};

// ---------------------------------------------------------------------------
/// Phase: Where the week sits in the cycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Aerobic base building, first ~60% of the cycle
    Build,
    /// Recovery week to absorb the work
    Deload,
    /// Race-specific quality work
    Intensification,
    /// Final two weeks before the race
    Taper,
    /// Race week
    Race,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Deload => write!(f, "deload"),
            Self::Intensification => write!(f, "intensification"),
            Self::Taper => write!(f, "taper"),
            Self::Race => write!(f, "race"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown phase: {0}")]
pub struct PhaseParseError(pub String);

impl std::str::FromStr for Phase {
    type Err = PhaseParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(Self::Build),
            "deload" => Ok(Self::Deload),
            "intensification" => Ok(Self::Intensification),
            "taper" => Ok(Self::Taper),
            "race" => Ok(Self::Race),
            _ => Err(PhaseParseError(s.to_string())),
        }
    }
}

/// Human-facing description of a phase
#[derive(Debug, Clone, Serialize)]
pub struct PhaseInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub focus: &'static str,
    pub intensity_pct: u8,
    pub advice: &'static str,
}

impl Phase {
    /// Multiplier applied to CTL for the target load
    pub fn load_multiplier(&self) -> f64 {
        match self {
            Self::Build => 1.05,
            Self::Deload => 0.75,
            Self::Intensification => 1.10,
            Self::Taper => 0.65,
            Self::Race => 0.30,
        }
    }

    /// Multiplier applied to weekly km for the target volume
    pub fn volume_multiplier(&self) -> f64 {
        match self {
            Self::Build => 1.05,
            Self::Deload => 0.75,
            Self::Intensification => 1.0,
            Self::Taper => 0.60,
            Self::Race => 0.25,
        }
    }

    pub fn info(&self) -> PhaseInfo {
        match self {
            Self::Build => PhaseInfo {
                name: "Build",
                description: "Developing the aerobic base",
                focus: "Easy endurance volume (Z1-Z2)",
                intensity_pct: 15,
                advice: "Favour long runs at a comfortable pace",
            },
            Self::Deload => PhaseInfo {
                name: "Recovery",
                description: "Lighter week to absorb the training",
                focus: "Volume down 20-30%",
                intensity_pct: 10,
                advice: "Short easy runs, mobility and plenty of sleep",
            },
            Self::Intensification => PhaseInfo {
                name: "Intensification",
                description: "Specific work at goal pace",
                focus: "Quality sessions (tempo, threshold, intervals)",
                intensity_pct: 25,
                advice: "Add sessions at race pace",
            },
            Self::Taper => PhaseInfo {
                name: "Taper",
                description: "Gradual reduction before the race",
                focus: "Keep intensity, cut volume",
                intensity_pct: 20,
                advice: "Keep a few short pickups and rest up",
            },
            Self::Race => PhaseInfo {
                name: "Race",
                description: "Competition week",
                focus: "Maximum freshness",
                intensity_pct: 0,
                advice: "Easy shakeout beforehand and trust your training",
            },
        }
    }
}

/// Phase for `week` of a `total_weeks` cycle.
///
/// Race and taper are checked before deload, so a deload-eligible week in
/// the final two weeks is a taper week.
pub fn determine_phase(week: i32, total_weeks: i32) -> Phase {
    if week >= total_weeks {
        return Phase::Race;
    }

    if week >= total_weeks - 2 {
        return Phase::Taper;
    }

    // Mid-cycle recovery, plus every fourth week after the first block
    if week == total_weeks.div_euclid(2) || (week > 4 && week % 4 == 0) {
        return Phase::Deload;
    }

    if (week as f64) < total_weeks as f64 * 0.6 {
        return Phase::Build;
    }

    Phase::Intensification
}

// ---------------------------------------------------------------------------
/// Race Goals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RaceGoal {
    #[serde(rename = "5K")]
    FiveK,
    #[default]
    #[serde(rename = "10K")]
    TenK,
    #[serde(rename = "SEMI")]
    HalfMarathon,
    #[serde(rename = "MARATHON")]
    Marathon,
    #[serde(rename = "ULTRA")]
    Ultra,
}

/// Cycle length and weekly split for a goal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalConfig {
    pub cycle_weeks: i32,
    /// Share of weekly km in the long run
    pub long_run_ratio: f64,
    /// Share of weekly km at intensity, in percent
    pub intensity_pct: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown race goal: {0}")]
pub struct GoalParseError(pub String);

impl RaceGoal {
    pub fn config(&self) -> GoalConfig {
        let (cycle_weeks, long_run_ratio, intensity_pct, description) = match self {
            Self::FiveK => (6, 0.25, 20.0, "5 kilometres"),
            Self::TenK => (8, 0.30, 18.0, "10 kilometres"),
            Self::HalfMarathon => (12, 0.35, 15.0, "Half marathon"),
            Self::Marathon => (16, 0.40, 12.0, "Marathon"),
            Self::Ultra => (20, 0.45, 10.0, "Ultra trail"),
        };
        GoalConfig {
            cycle_weeks,
            long_run_ratio,
            intensity_pct,
            description: description.to_string(),
        }
    }
}

impl std::fmt::Display for RaceGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FiveK => write!(f, "5K"),
            Self::TenK => write!(f, "10K"),
            Self::HalfMarathon => write!(f, "SEMI"),
            Self::Marathon => write!(f, "MARATHON"),
            Self::Ultra => write!(f, "ULTRA"),
        }
    }
}

impl std::str::FromStr for RaceGoal {
    type Err = GoalParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "5K" => Ok(Self::FiveK),
            "10K" => Ok(Self::TenK),
            "SEMI" => Ok(Self::HalfMarathon),
            "MARATHON" => Ok(Self::Marathon),
            "ULTRA" => Ok(Self::Ultra),
            _ => Err(GoalParseError(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
/// Targets
// ---------------------------------------------------------------------------

/// Scale a base load for fatigue.
///
/// ACWR and TSB adjustments are independent and multiply together.
pub fn adjust_load_by_fatigue(base_load: f64, tsb: f64, acwr: f64) -> f64 {
    let mut adjusted = base_load;

    if acwr > ACWR_DANGER {
        adjusted *= 0.70;
    } else if acwr > ACWR_SAFE_MAX {
        adjusted *= 0.85;
    }

    if tsb < TSB_FATIGUE_THRESHOLD {
        adjusted *= 0.90;
    } else if tsb > TSB_FRESH_THRESHOLD {
        adjusted *= 1.05;
    }

    adjusted
}

/// Target weekly load in load units, rounded to the nearest whole unit
pub fn determine_target_load(context: &FitnessContext, phase: Phase) -> i64 {
    let base = context.ctl * phase.load_multiplier();
    adjust_load_by_fatigue(base, context.tsb, context.acwr).round() as i64
}

/// Target weekly distance in km, one decimal
pub fn determine_target_km(context: &FitnessContext, phase: Phase) -> f64 {
    let mut target = context.weekly_km * phase.volume_multiplier();
    if context.acwr > ACWR_SAFE_MAX {
        target *= 0.85;
    }
    round_1(target)
}

// ---------------------------------------------------------------------------
/// Week Recommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KmDistribution {
    pub long_run_km: f64,
    /// Whatever is left after long run and intensity; negative if a goal's
    /// ratios add up to more than the whole week
    pub easy_km: f64,
    pub intensity_km: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekRecommendation {
    pub phase: Phase,
    pub phase_info: PhaseInfo,
    pub target_load: i64,
    pub target_km: f64,
    pub distribution: KmDistribution,
    pub risk_level: RiskLevel,
    pub acwr: f64,
    pub tsb: f64,
    pub advice: String,
}

pub fn generate_week_recommendation(
    context: &FitnessContext,
    phase: Phase,
    goal: RaceGoal,
) -> WeekRecommendation {
    recommend_with_config(context, phase, &goal.config())
}

/// Recommendation for an arbitrary goal split.
///
/// The split is not validated; ratios summing past 1.0 give a negative
/// easy volume.
pub fn recommend_with_config(
    context: &FitnessContext,
    phase: Phase,
    goal: &GoalConfig,
) -> WeekRecommendation {
    let phase_info = phase.info();
    let target_load = determine_target_load(context, phase);
    let target_km = determine_target_km(context, phase);

    let intensity_share = goal.intensity_pct / 100.0;
    let distribution = KmDistribution {
        long_run_km: round_1(target_km * goal.long_run_ratio),
        easy_km: round_1(target_km * (1.0 - goal.long_run_ratio - intensity_share)),
        intensity_km: round_1(target_km * intensity_share),
    };

    WeekRecommendation {
        phase,
        advice: phase_info.advice.to_string(),
        phase_info,
        target_load,
        target_km,
        distribution,
        risk_level: context.risk_level,
        acwr: context.acwr,
        tsb: context.tsb,
    }
}

/// Build the context, place the week in the goal's cycle and recommend
pub fn recommend_for_week(input: &FitnessInput, week: i32, goal: RaceGoal) -> WeekRecommendation {
    let context = FitnessContext::build(input);
    let config = goal.config();
    let phase = determine_phase(week, config.cycle_weeks);
    recommend_with_config(&context, phase, &config)
}

fn round_1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
