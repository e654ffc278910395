//! The `FeedBackend` trait: the feed engine's view of the managed backend.
//!
//! A feed session never touches storage directly. It pulls pool and
//! exclusion snapshots, asks for generation, and pushes engagement through
//! this trait. `cascade-cli` implements it over HTTP; tests implement it in
//! memory.

use std::future::Future;

use uuid::Uuid;

use crate::{
  engagement::{EngagementSignal, QuizAnswer, QuizOutcome, VoteDelta},
  item::FeedItem,
  learner::{Difficulty, ExclusionState},
  store::PoolQuery,
};

pub trait FeedBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Current item pool for `query`, newest first.
  fn pool<'a>(
    &'a self,
    query: &'a PoolQuery,
  ) -> impl Future<Output = Result<Vec<FeedItem>, Self::Error>> + Send + 'a;

  fn exclusion_state<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<ExclusionState, Self::Error>> + Send + 'a;

  /// Ask for more content. New items arrive later through [`Self::pool`],
  /// not as a return value.
  fn generate<'a>(
    &'a self,
    user_id: &'a str,
    subject: &'a str,
    difficulty: Difficulty,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Best-effort analytics; `viewed` signals also commit the item id into
  /// the learner's viewed set.
  fn report(
    &self,
    signal: EngagementSignal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn apply_vote<'a>(
    &'a self,
    item_id: Uuid,
    user_id: &'a str,
    delta: VoteDelta,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn answer_quiz(
    &self,
    answer: QuizAnswer,
  ) -> impl Future<Output = Result<QuizOutcome, Self::Error>> + Send + '_;
}
