//! Background generation with a single-flight guard.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use cascade_core::{
  backend::FeedBackend,
  learner::{Difficulty, EnrolledSubject},
};
use rand::Rng;
use tokio::task::JoinHandle;

// ─── Subject resolution ──────────────────────────────────────────────────────

/// Inputs to subject/difficulty resolution.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext<'a> {
  /// Subject chosen by the learner or forced by the timetable.
  pub active_subject:      Option<&'a str>,
  /// Learner-specific difficulty for the active subject, if known.
  pub difficulty_override: Option<Difficulty>,
  pub enrolled:            &'a [EnrolledSubject],
}

/// A concrete generation request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTarget {
  pub subject:    String,
  pub difficulty: Difficulty,
}

/// Pick what to generate: the active subject if any, otherwise a uniformly
/// random enrolled subject, otherwise `fallback` at the lowest tier.
pub fn resolve_target<R: Rng + ?Sized>(
  ctx: &GenerationContext<'_>,
  fallback: &str,
  rng: &mut R,
) -> GenerationTarget {
  if let Some(subject) = ctx.active_subject {
    let difficulty = ctx
      .difficulty_override
      .or_else(|| {
        ctx
          .enrolled
          .iter()
          .find(|s| s.name == subject)
          .map(|s| s.difficulty)
      })
      .unwrap_or_else(Difficulty::lowest);
    return GenerationTarget { subject: subject.to_owned(), difficulty };
  }

  if !ctx.enrolled.is_empty() {
    let pick = &ctx.enrolled[rng.gen_range(0..ctx.enrolled.len())];
    return GenerationTarget {
      subject:    pick.name.clone(),
      difficulty: pick.difficulty,
    };
  }

  GenerationTarget {
    subject:    fallback.to_owned(),
    difficulty: Difficulty::lowest(),
  }
}

// ─── Trigger ─────────────────────────────────────────────────────────────────

/// Issues generation requests, never more than one at a time.
///
/// The flag is cleared when the request task finishes, whether it succeeded,
/// failed or panicked.
#[derive(Debug, Clone, Default)]
pub struct GenerationTrigger {
  in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag on drop.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
  fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

impl GenerationTrigger {
  pub fn new() -> Self { Self::default() }

  pub fn is_generating(&self) -> bool { self.in_flight.load(Ordering::Acquire) }

  /// Spawn one generation request unless one is already running. Returns
  /// the task handle when a request was issued.
  ///
  /// Must be called from within a tokio runtime.
  pub fn fire<B>(
    &self,
    backend: Arc<B>,
    user_id: String,
    target: GenerationTarget,
  ) -> Option<JoinHandle<()>>
  where
    B: FeedBackend + 'static,
  {
    if self
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      tracing::debug!(subject = %target.subject, "generation already in flight");
      return None;
    }

    let guard = InFlight(Arc::clone(&self.in_flight));
    tracing::info!(
      subject = %target.subject,
      difficulty = %target.difficulty,
      "requesting more content"
    );

    Some(tokio::spawn(async move {
      let _guard = guard;
      if let Err(e) = backend
        .generate(&user_id, &target.subject, target.difficulty)
        .await
      {
        tracing::warn!(subject = %target.subject, "generation failed: {e}");
      }
    }))
  }
}
