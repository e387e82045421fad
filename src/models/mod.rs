pub mod analysis;
pub mod content;
pub mod workout;

pub use analysis::{Comparison, SessionAnalysis, WeeklyAnalysis, WeeklyMetrics};
pub use content::{ChatMessage, ChatRole, ContentKind};
pub use workout::WorkoutInput;
