//! Learner: the per-user state the feed reads and the store mutates.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Difficulty ──────────────────────────────────────────────────────────────

/// Expertise tier used both for enrolled subjects and per-topic progression.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
}

impl Difficulty {
  /// The tier used for the generic fallback subject.
  pub fn lowest() -> Self { Self::Beginner }

  /// One step up after a correct answer; `Advanced` is the ceiling.
  pub fn promote(self) -> Self {
    match self {
      Self::Beginner => Self::Intermediate,
      Self::Intermediate | Self::Advanced => Self::Advanced,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Beginner => "beginner",
      Self::Intermediate => "intermediate",
      Self::Advanced => "advanced",
    }
  }
}

impl std::str::FromStr for Difficulty {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "beginner" => Ok(Self::Beginner),
      "intermediate" => Ok(Self::Intermediate),
      "advanced" => Ok(Self::Advanced),
      _ => Err(Error::UnknownDifficulty(s.to_owned())),
    }
  }
}

impl std::fmt::Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// A subject the learner enrolled in during onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledSubject {
  pub name:       String,
  #[serde(default)]
  pub difficulty: Difficulty,
}

impl EnrolledSubject {
  pub fn new(name: impl Into<String>, difficulty: Difficulty) -> Self {
    Self { name: name.into(), difficulty }
  }
}

/// Everything the feed needs to know about a learner besides exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProfile {
  pub user_id:         String,
  #[serde(default)]
  pub subjects:        Vec<EnrolledSubject>,
  /// Expertise reached per topic through quiz answers.
  #[serde(default)]
  pub topic_expertise: HashMap<String, Difficulty>,
  #[serde(default)]
  pub xp:              u64,
}

impl LearnerProfile {
  /// An empty profile for a user the store has not seen yet.
  pub fn empty(user_id: impl Into<String>) -> Self {
    Self { user_id: user_id.into(), ..Self::default() }
  }

  pub fn expertise_for(&self, topic: &str) -> Difficulty {
    self.topic_expertise.get(topic).copied().unwrap_or_default()
  }

  pub fn subject(&self, name: &str) -> Option<&EnrolledSubject> {
    self.subjects.iter().find(|s| s.name == name)
  }
}

// ─── Exclusions ──────────────────────────────────────────────────────────────

/// The two exclusion sets maintained per learner.
///
/// A retry item stays deliverable even when it also appears in `viewed_ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionState {
  #[serde(default)]
  pub viewed_ids: HashSet<Uuid>,
  #[serde(default)]
  pub retry_ids:  HashSet<Uuid>,
}

impl ExclusionState {
  pub fn is_retry(&self, id: &Uuid) -> bool { self.retry_ids.contains(id) }

  /// `true` when the item must not be delivered.
  pub fn excludes(&self, id: &Uuid) -> bool {
    self.viewed_ids.contains(id) && !self.retry_ids.contains(id)
  }
}
