//! Retry/exclusion tracking and pool partitioning.
//!
//! The tracker keeps the latest pushed [`ExclusionState`] and splits each
//! pool snapshot into the three pending buffers the interleaver consumes.

use std::collections::HashSet;

use cascade_core::{item::FeedItem, learner::ExclusionState};
use uuid::Uuid;

use crate::interleave::PendingBuffers;

/// Holds the learner's most recent exclusion snapshot.
#[derive(Debug, Clone, Default)]
pub struct ExclusionTracker {
  state: ExclusionState,
}

impl ExclusionTracker {
  pub fn new(state: ExclusionState) -> Self { Self { state } }

  /// Replace the snapshot. Later snapshots always win.
  pub fn update(&mut self, state: ExclusionState) { self.state = state; }

  pub fn state(&self) -> &ExclusionState { &self.state }

  pub fn excludes(&self, id: &Uuid) -> bool { self.state.excludes(id) }

  pub fn is_retry(&self, id: &Uuid) -> bool { self.state.is_retry(id) }

  /// Drop malformed and excluded items from a pool snapshot.
  pub fn filter_pool(&self, pool: Vec<FeedItem>) -> Vec<FeedItem> {
    pool
      .into_iter()
      .filter(|item| match item.payload.validate() {
        Ok(()) => !self.excludes(&item.id),
        Err(e) => {
          tracing::debug!(item_id = %item.id, "skipping pool item: {e}");
          false
        }
      })
      .collect()
  }

  /// Split an already-filtered pool into pending buffers, leaving out ids in
  /// `known` (items this session has already placed).
  ///
  /// Retry status only matters for quizzes; a non-quiz flagged for retry is
  /// treated as general content.
  pub fn partition(
    &self,
    filtered: &[FeedItem],
    known: &HashSet<Uuid>,
  ) -> PendingBuffers {
    let mut buffers = PendingBuffers::default();
    for item in filtered.iter().filter(|i| !known.contains(&i.id)) {
      if !item.is_quiz() {
        buffers.general.push(item.clone());
      } else if self.is_retry(&item.id) {
        buffers.retry.push(item.clone());
      } else {
        buffers.quiz.push(item.clone());
      }
    }
    buffers
  }
}
