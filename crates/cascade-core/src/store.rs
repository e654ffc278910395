//! The `FeedStore` and `Generator` traits and their query types.
//!
//! `FeedStore` is implemented by storage backends (e.g.
//! `cascade-store-sqlite`); `Generator` by whatever produces new items. The
//! API layer depends on these abstractions, not on concrete backends.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  engagement::{Comment, EngagementSignal, NewComment, QuizAnswer, QuizOutcome, VoteDelta},
  item::{FeedItem, NewItem},
  learner::{Difficulty, EnrolledSubject, ExclusionState, LearnerProfile},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`FeedStore::list_items`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolQuery {
  /// Restrict to one subject; `None` returns every subject.
  pub subject: Option<String>,
  pub limit:   Option<usize>,
}

impl PoolQuery {
  pub fn subject(subject: impl Into<String>) -> Self {
    Self { subject: Some(subject.into()), limit: None }
  }
}

/// Everything a generator needs to produce a batch of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
  pub user_id:         String,
  pub subject:         String,
  pub difficulty:      Difficulty,
  /// Recently generated topics in this subject, to avoid repeats.
  #[serde(default)]
  pub previous_topics: Vec<String>,
}

// ─── Store trait ─────────────────────────────────────────────────────────────

/// Abstraction over the shared document store behind the feed.
///
/// Counters and sets are only ever mutated through increments and set
/// union/removal, never through read-modify-write, so concurrent sessions
/// commute.
pub trait FeedStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Items ─────────────────────────────────────────────────────────────

  /// Persist freshly generated items. Items without a subject are tagged
  /// with `default_subject`.
  fn insert_items(
    &self,
    items: Vec<NewItem>,
    default_subject: String,
    generated_by: Option<String>,
  ) -> impl Future<Output = Result<Vec<FeedItem>, Self::Error>> + Send + '_;

  fn get_item(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<FeedItem>, Self::Error>> + Send + '_;

  /// The item pool, newest first.
  fn list_items<'a>(
    &'a self,
    query: &'a PoolQuery,
  ) -> impl Future<Output = Result<Vec<FeedItem>, Self::Error>> + Send + 'a;

  /// Topics of the most recent items, optionally within one subject.
  fn recent_topics(
    &self,
    subject: Option<String>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Learners ──────────────────────────────────────────────────────────

  /// Returns an empty profile for unknown users.
  fn get_learner(
    &self,
    user_id: String,
  ) -> impl Future<Output = Result<LearnerProfile, Self::Error>> + Send + '_;

  /// Replace the learner's enrolled subjects.
  fn put_subjects(
    &self,
    user_id: String,
    subjects: Vec<EnrolledSubject>,
  ) -> impl Future<Output = Result<LearnerProfile, Self::Error>> + Send + '_;

  fn exclusion_state(
    &self,
    user_id: String,
  ) -> impl Future<Output = Result<ExclusionState, Self::Error>> + Send + '_;

  /// Add `item_id` to the learner's viewed set (set union).
  fn mark_viewed(
    &self,
    user_id: String,
    item_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// A correct answer clears the retry flag, promotes the topic and awards
  /// XP. A wrong answer flags the item for retry and un-views it.
  fn record_quiz_answer(
    &self,
    answer: QuizAnswer,
  ) -> impl Future<Output = Result<QuizOutcome, Self::Error>> + Send + '_;

  // ── Engagement ────────────────────────────────────────────────────────

  /// Apply counter increments and set or clear the user's vote entry.
  /// Returns the updated item.
  fn apply_vote(
    &self,
    item_id: Uuid,
    user_id: String,
    delta: VoteDelta,
  ) -> impl Future<Output = Result<FeedItem, Self::Error>> + Send + '_;

  fn record_avoided(
    &self,
    signal: EngagementSignal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_comment(
    &self,
    item_id: Uuid,
    comment: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Comments on an item, newest first.
  fn list_comments(
    &self,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;
}

// ─── Generator trait ─────────────────────────────────────────────────────────

/// Produces new learning items for a subject at a difficulty tier.
pub trait Generator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn generate(
    &self,
    request: GenerationRequest,
  ) -> impl Future<Output = Result<Vec<NewItem>, Self::Error>> + Send + '_;
}
