pub mod cache;
pub mod coach;
pub mod config;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod periodization;
pub mod training;

#[cfg(test)]
mod test_utils;

pub use coach::{
  ChatMetadata, ChatReply, CoachResponse, CoachService, FallbackResponder, ResponderError,
  TemplateReply,
};
pub use config::{CoachConfig, ConfigError};
pub use llm::{ClaudeClient, EnrichmentOutcome, EnrichmentPayload, EnrichmentProvider};
pub use logging::try_init_logging;
pub use metrics::MetricsSnapshot;
pub use periodization::{determine_phase, Phase, RaceGoal, WeekRecommendation};
pub use training::{FitnessContext, FitnessInput, RiskLevel};
