//! Quiz/general interleaving.
//!
//! General items are laid down in runs whose length is drawn from the
//! configured gap range; each completed run earns one quiz, taken from the
//! retry buffer first. A quiz is only placed while general content remains to
//! follow it, so quizzes never cluster at the tail of a batch.

use std::ops::RangeInclusive;

use cascade_core::item::FeedItem;
use rand::{Rng, seq::SliceRandom};

/// Items waiting to be merged into the delivered sequence.
#[derive(Debug, Clone, Default)]
pub struct PendingBuffers {
  pub general: Vec<FeedItem>,
  pub quiz:    Vec<FeedItem>,
  pub retry:   Vec<FeedItem>,
}

impl PendingBuffers {
  pub fn is_empty(&self) -> bool {
    self.general.is_empty() && self.quiz.is_empty() && self.retry.is_empty()
  }

  pub fn len(&self) -> usize {
    self.general.len() + self.quiz.len() + self.retry.len()
  }

  /// Uniformly permute each buffer independently.
  pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    self.general.shuffle(rng);
    self.quiz.shuffle(rng);
    self.retry.shuffle(rng);
  }

  fn next_quiz(&mut self) -> Option<FeedItem> {
    self.retry.pop().or_else(|| self.quiz.pop())
  }
}

/// Result of one interleaving pass.
#[derive(Debug, Clone, Default)]
pub struct Interleaved {
  /// Items to append to the delivered sequence, in order.
  pub items:        Vec<FeedItem>,
  /// Consecutive non-quiz items at the tail after appending `items`.
  pub trailing_run: usize,
}

/// Count consecutive non-quiz items at the end of `sequence`.
pub fn trailing_general_run(sequence: &[FeedItem]) -> usize {
  sequence.iter().rev().take_while(|item| !item.is_quiz()).count()
}

/// Drain `pending` into a delivery order.
///
/// The buffers are shuffled first. Quiz and retry items that cannot be
/// placed stay in `pending` for the next pass; general items are always
/// consumed.
pub fn interleave<R: Rng + ?Sized>(
  pending: &mut PendingBuffers,
  trailing_run: usize,
  gap: RangeInclusive<usize>,
  rng: &mut R,
) -> Interleaved {
  pending.shuffle(rng);

  let mut items = Vec::with_capacity(pending.len());
  let mut run = trailing_run;

  loop {
    if pending.general.is_empty() {
      break;
    }

    if pending.quiz.is_empty() && pending.retry.is_empty() {
      run += pending.general.len();
      items.extend(pending.general.drain(..).rev());
      break;
    }

    let target = rng.gen_range(gap.clone());
    while run < target {
      match pending.general.pop() {
        Some(item) => {
          items.push(item);
          run += 1;
        }
        None => break,
      }
    }

    // Inject only when the gap is met and general content can follow.
    if run >= target && !pending.general.is_empty() {
      if let Some(q) = pending.next_quiz() {
        items.push(q);
        run = 0;
      }
    }
  }

  Interleaved { items, trailing_run: run }
}
