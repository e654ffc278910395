//! Engagement records: view/avoid signals, quiz answers, votes and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{item::VoteDirection, learner::Difficulty};

/// XP granted for a correct quiz answer.
pub const QUIZ_XP: u64 = 10;

// ─── Signals ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
  /// The item reached the viewport; commits it into `viewed_ids`.
  Viewed,
  /// The item left the viewport after a short dwell.
  Avoided,
}

/// A best-effort analytics signal emitted by the viewport tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSignal {
  pub user_id:     String,
  pub item_id:     Uuid,
  pub topic:       String,
  pub kind:        EngagementKind,
  /// Present on `avoided` signals.
  #[serde(default)]
  pub duration_ms: Option<u64>,
}

/// A persisted avoided-topic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvoidedTopic {
  pub user_id:     String,
  pub item_id:     Uuid,
  pub topic:       String,
  pub duration_ms: u64,
  pub recorded_at: DateTime<Utc>,
}

// ─── Quizzes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
  pub user_id:    String,
  pub item_id:    Uuid,
  pub topic:      String,
  pub is_correct: bool,
}

/// What the store did with a [`QuizAnswer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
  /// The learner's expertise in the topic after the answer.
  pub expertise:  Difficulty,
  pub xp_awarded: u64,
}

// ─── Votes ───────────────────────────────────────────────────────────────────

/// Counter increments plus the resulting per-user vote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteDelta {
  pub up:       i64,
  pub down:     i64,
  /// `None` removes the user's entry from `voted_by`.
  pub new_vote: Option<VoteDirection>,
}

impl VoteDelta {
  /// The fixed transition table: same direction toggles off, the opposite
  /// direction flips, no prior vote adds.
  pub fn between(
    current: Option<VoteDirection>,
    requested: VoteDirection,
  ) -> Self {
    use VoteDirection::{Down, Up};

    let unit = |d: VoteDirection| match d {
      Up => (1, 0),
      Down => (0, 1),
    };

    match current {
      Some(c) if c == requested => {
        let (u, d) = unit(c);
        Self { up: -u, down: -d, new_vote: None }
      }
      Some(c) => {
        let (ou, od) = unit(c);
        let (nu, nd) = unit(requested);
        Self { up: nu - ou, down: nd - od, new_vote: Some(requested) }
      }
      None => {
        let (u, d) = unit(requested);
        Self { up: u, down: d, new_vote: Some(requested) }
      }
    }
  }

  pub fn is_noop(&self) -> bool { self.up == 0 && self.down == 0 }
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id: Uuid,
  pub item_id:    Uuid,
  pub user_id:    String,
  pub user_name:  String,
  pub text:       String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::FeedStore::add_comment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
  pub user_id:   String,
  #[serde(default)]
  pub user_name: Option<String>,
  pub text:      String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use VoteDirection::{Down, Up};

  #[test]
  fn transition_table() {
    assert_eq!(
      VoteDelta::between(None, Up),
      VoteDelta { up: 1, down: 0, new_vote: Some(Up) }
    );
    assert_eq!(
      VoteDelta::between(Some(Up), Up),
      VoteDelta { up: -1, down: 0, new_vote: None }
    );
    assert_eq!(
      VoteDelta::between(Some(Up), Down),
      VoteDelta { up: -1, down: 1, new_vote: Some(Down) }
    );
    assert_eq!(
      VoteDelta::between(Some(Down), Up),
      VoteDelta { up: 1, down: -1, new_vote: Some(Up) }
    );
    assert_eq!(
      VoteDelta::between(Some(Down), Down),
      VoteDelta { up: 0, down: -1, new_vote: None }
    );
  }
}
