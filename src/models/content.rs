use serde::{Deserialize, Serialize};

/// The kind of coaching text being produced.
///
/// Drives the provider prompt, the cache namespace and the per-category
/// request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
  /// Single-session analysis
  Workout,
  /// Weekly review
  Weekly,
  /// Conversational reply
  Chat,
}

impl ContentKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ContentKind::Workout => "workout",
      ContentKind::Weekly => "weekly",
      ContentKind::Chat => "chat",
    }
  }
}

impl std::fmt::Display for ContentKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
  User,
  Coach,
}

/// One turn of a coaching conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: ChatRole,
  pub content: String,
}

impl ChatMessage {
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: ChatRole::User, content: content.into() }
  }

  pub fn coach(content: impl Into<String>) -> Self {
    Self { role: ChatRole::Coach, content: content.into() }
  }
}
