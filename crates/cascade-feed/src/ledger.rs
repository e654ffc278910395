//! Optimistic vote ledger.
//!
//! A vote is applied locally at once, then persisted in the background. The
//! ledger moves `Idle → Optimistic → Committed` on success or
//! `Optimistic → RolledBack` on failure; rollback restores the exact pre-vote
//! numbers.

use cascade_core::{
  engagement::VoteDelta,
  item::{FeedItem, VoteDirection},
};
use uuid::Uuid;

/// The numbers shown next to an item's vote buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
  pub up:   u64,
  pub down: u64,
  /// Which counter holds this user's contribution, if any.
  pub vote: Option<VoteDirection>,
}

impl VoteTally {
  pub fn from_item(item: &FeedItem, user_id: &str) -> Self {
    Self { up: item.upvotes, down: item.downvotes, vote: item.vote_of(user_id) }
  }

  pub fn score(&self) -> i64 { self.up as i64 - self.down as i64 }

  fn apply(&self, delta: &VoteDelta) -> Self {
    Self {
      up:   self.up.saturating_add_signed(delta.up),
      down: self.down.saturating_add_signed(delta.down),
      vote: delta.new_vote,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePhase {
  Idle,
  Optimistic { ticket: u64, before: VoteTally },
  Committed,
  RolledBack,
}

/// A vote applied locally and awaiting persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingVote {
  pub item_id: Uuid,
  pub ticket:  u64,
  pub delta:   VoteDelta,
}

/// Per-item optimistic overlay over the remote counters.
#[derive(Debug, Clone)]
pub struct VoteLedger {
  item_id:     Uuid,
  tally:       VoteTally,
  phase:       VotePhase,
  next_ticket: u64,
}

impl VoteLedger {
  pub fn new(item_id: Uuid, tally: VoteTally) -> Self {
    Self { item_id, tally, phase: VotePhase::Idle, next_ticket: 0 }
  }

  pub fn from_item(item: &FeedItem, user_id: &str) -> Self {
    Self::new(item.id, VoteTally::from_item(item, user_id))
  }

  pub fn tally(&self) -> VoteTally { self.tally }

  pub fn phase(&self) -> VotePhase { self.phase }

  pub fn score(&self) -> i64 { self.tally.score() }

  /// Adopt a fresh remote snapshot.
  pub fn sync(&mut self, tally: VoteTally) { self.tally = tally; }

  /// Apply a vote optimistically and hand back what must be persisted.
  pub fn vote(&mut self, direction: VoteDirection) -> PendingVote {
    let delta = VoteDelta::between(self.tally.vote, direction);
    let before = self.tally;
    self.tally = before.apply(&delta);

    self.next_ticket += 1;
    let ticket = self.next_ticket;
    self.phase = VotePhase::Optimistic { ticket, before };

    PendingVote { item_id: self.item_id, ticket, delta }
  }

  /// Record the persistence outcome for `pending`.
  ///
  /// Only the most recent vote can be settled; an older ticket raced by a
  /// newer click is ignored.
  pub fn settle(&mut self, pending: &PendingVote, persisted: bool) -> VotePhase {
    match self.phase {
      VotePhase::Optimistic { ticket, before } if ticket == pending.ticket => {
        self.phase = if persisted {
          VotePhase::Committed
        } else {
          self.tally = before;
          VotePhase::RolledBack
        };
      }
      _ => {
        tracing::debug!(
          item_id = %self.item_id,
          ticket = pending.ticket,
          "ignoring stale vote settlement"
        );
      }
    }
    self.phase
  }
}
