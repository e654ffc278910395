//! Fixtures shared by the engine's unit tests.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use cascade_core::{
  backend::FeedBackend,
  engagement::{EngagementSignal, QuizAnswer, QuizOutcome, VoteDelta},
  item::{FeedItem, ItemPayload},
  learner::{Difficulty, ExclusionState},
  store::PoolQuery,
};
use chrono::Utc;
use tokio::sync::Notify;
use uuid::Uuid;

pub fn item(topic: &str, payload: ItemPayload) -> FeedItem {
  FeedItem {
    id: Uuid::new_v4(),
    topic: topic.to_owned(),
    subject: Some("biology".into()),
    payload,
    image_query: None,
    upvotes: 0,
    downvotes: 0,
    comment_count: 0,
    voted_by: HashMap::new(),
    created_at: Utc::now(),
    generated_by: None,
  }
}

pub fn general(topic: &str) -> FeedItem {
  item(topic, ItemPayload::Post {
    hook:    format!("Why {topic} matters"),
    content: format!("A short lesson on {topic}."),
  })
}

pub fn quiz(topic: &str) -> FeedItem {
  item(topic, ItemPayload::Quiz {
    question:      format!("Which statement about {topic} is true?"),
    options:       vec!["This one".into(), "That one".into()],
    correct_index: 0,
    explanation:   "The first statement is correct.".into(),
  })
}

#[derive(Debug, thiserror::Error)]
#[error("mock backend failure")]
pub struct MockError;

/// In-memory backend recording every call the engine makes.
#[derive(Default)]
pub struct MockBackend {
  pub pool:            Mutex<Vec<FeedItem>>,
  pub exclusions:      Mutex<ExclusionState>,
  pub generations:     Mutex<Vec<(String, Difficulty)>>,
  pub generate_calls:  AtomicUsize,
  pub signals:         Mutex<Vec<EngagementSignal>>,
  pub votes:           Mutex<Vec<(Uuid, VoteDelta)>>,
  pub answers:         Mutex<Vec<QuizAnswer>>,
  /// When set, `generate` waits for `release` before returning.
  pub hold_generation: AtomicBool,
  pub release:         Notify,
  pub fail_generation: AtomicBool,
  pub fail_votes:      AtomicBool,
  pub fail_reports:    AtomicBool,
}

impl MockBackend {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  pub fn with_pool(items: Vec<FeedItem>) -> Arc<Self> {
    let backend = Self::default();
    *backend.pool.lock().unwrap() = items;
    Arc::new(backend)
  }

  pub fn signals(&self) -> Vec<EngagementSignal> {
    self.signals.lock().unwrap().clone()
  }
}

impl FeedBackend for MockBackend {
  type Error = MockError;

  async fn pool(&self, query: &PoolQuery) -> Result<Vec<FeedItem>, MockError> {
    let pool = self.pool.lock().unwrap();
    Ok(
      pool
        .iter()
        .filter(|i| query.subject.is_none() || i.subject == query.subject)
        .cloned()
        .collect(),
    )
  }

  async fn exclusion_state(&self, _: &str) -> Result<ExclusionState, MockError> {
    Ok(self.exclusions.lock().unwrap().clone())
  }

  async fn generate(
    &self,
    _: &str,
    subject: &str,
    difficulty: Difficulty,
  ) -> Result<(), MockError> {
    self.generate_calls.fetch_add(1, Ordering::SeqCst);
    self
      .generations
      .lock()
      .unwrap()
      .push((subject.to_owned(), difficulty));
    if self.hold_generation.load(Ordering::SeqCst) {
      self.release.notified().await;
    }
    if self.fail_generation.load(Ordering::SeqCst) {
      return Err(MockError);
    }
    Ok(())
  }

  async fn report(&self, signal: EngagementSignal) -> Result<(), MockError> {
    self.signals.lock().unwrap().push(signal);
    if self.fail_reports.load(Ordering::SeqCst) {
      return Err(MockError);
    }
    Ok(())
  }

  async fn apply_vote(
    &self,
    item_id: Uuid,
    _: &str,
    delta: VoteDelta,
  ) -> Result<(), MockError> {
    self.votes.lock().unwrap().push((item_id, delta));
    if self.fail_votes.load(Ordering::SeqCst) {
      return Err(MockError);
    }
    Ok(())
  }

  async fn answer_quiz(&self, answer: QuizAnswer) -> Result<QuizOutcome, MockError> {
    let correct = answer.is_correct;
    self.answers.lock().unwrap().push(answer);
    Ok(QuizOutcome {
      expertise:  if correct { Difficulty::Intermediate } else { Difficulty::Beginner },
      xp_awarded: if correct { cascade_core::engagement::QUIZ_XP } else { 0 },
    })
  }
}

/// Let spawned tasks run to completion on the current-thread test runtime.
pub async fn settle() {
  for _ in 0..10 {
    tokio::task::yield_now().await;
  }
}
