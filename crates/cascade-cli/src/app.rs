//! Application state machine and event dispatcher.

use std::{
  collections::HashMap,
  time::{Duration, Instant},
};

use cascade_core::{backend::FeedBackend, item::VoteDirection};
use cascade_feed::{
  FeedSession,
  ledger::{PendingVote, VotePhase},
  session::{QuizFeedback, Snapshots},
  timetable::FocusInterrupter,
};
use chrono::NaiveDateTime;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;
use uuid::Uuid;

/// How often the pool and exclusion snapshots are re-fetched.
pub const REFRESH_EVERY: Duration = Duration::from_secs(5);

/// How often the timetable is consulted.
pub const TIMETABLE_EVERY: Duration = Duration::from_secs(60);

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App<B> {
  pub session: FeedSession<B>,

  /// Answered quizzes and what the learner was told.
  pub feedback: HashMap<Uuid, QuizFeedback>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  interrupter:  FocusInterrupter,
  settled_tx:   mpsc::UnboundedSender<(PendingVote, bool)>,
  settled_rx:   mpsc::UnboundedReceiver<(PendingVote, bool)>,
  snapshot_tx:  mpsc::UnboundedSender<Result<Snapshots, String>>,
  snapshot_rx:  mpsc::UnboundedReceiver<Result<Snapshots, String>>,
  /// A snapshot fetch is running on its own task.
  refreshing:   bool,
  last_refresh: Option<Instant>,
  last_check:   Option<Instant>,
}

impl<B: FeedBackend + 'static> App<B> {
  pub fn new(session: FeedSession<B>, interrupter: FocusInterrupter) -> Self {
    let (settled_tx, settled_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
    Self {
      session,
      feedback: HashMap::new(),
      status_msg: String::new(),
      interrupter,
      settled_tx,
      settled_rx,
      snapshot_tx,
      snapshot_rx,
      refreshing: false,
      last_refresh: None,
      last_check: None,
    }
  }

  // ── Background work ───────────────────────────────────────────────────────

  /// Periodic work between key events: applying fetched snapshots and
  /// vote settlements, the timetable check, and starting the next fetch.
  /// Never waits on the network.
  pub fn tick(&mut self, now: Instant, wall_clock: NaiveDateTime) {
    self.drain_votes();
    self.drain_snapshots(now);

    if self.last_check.is_none_or(|t| now.duration_since(t) >= TIMETABLE_EVERY) {
      self.last_check = Some(now);
      self.check_timetable(wall_clock, now);
    }

    if !self.refreshing
      && self.last_refresh.is_none_or(|t| now.duration_since(t) >= REFRESH_EVERY)
    {
      self.last_refresh = Some(now);
      self.request_refresh();
    }
  }

  /// Start pulling fresh snapshots on a background task. The result is
  /// applied by the next [`Self::drain_snapshots`].
  pub fn request_refresh(&mut self) {
    if self.refreshing {
      return;
    }
    self.refreshing = true;
    let fetch = self.session.fetch_snapshots();
    let tx = self.snapshot_tx.clone();
    tokio::spawn(async move {
      let result = fetch.await.map_err(|e| e.to_string());
      tx.send(result).ok();
    });
  }

  /// Apply every snapshot that has arrived, putting the first card in view
  /// on first load.
  pub fn drain_snapshots(&mut self, now: Instant) {
    while let Ok(result) = self.snapshot_rx.try_recv() {
      self.refreshing = false;
      match result {
        // Fetched for a subject that has since been switched away from.
        Ok(snapshots) if snapshots.query != self.session.pool_query() => {
          tracing::debug!(query = ?snapshots.query, "dropping stale snapshots");
          self.last_refresh = None;
        }
        Ok(snapshots) => {
          let update = self.session.apply_snapshots(snapshots);
          if update.appended > 0 {
            tracing::debug!(?update, "feed refreshed");
          }
          if self.session.position().is_none() && !self.session.items().is_empty() {
            self.session.focus(0, now);
          }
          if self.status_msg.starts_with("Error") {
            self.status_msg.clear();
          }
        }
        Err(e) => {
          tracing::warn!("refresh failed: {e}");
          self.status_msg = format!("Error: {e}");
        }
      }
    }
  }

  fn check_timetable(&mut self, wall_clock: NaiveDateTime, now: Instant) {
    if let Some(subject) = self.interrupter.check(wall_clock) {
      self.status_msg = format!("Class in progress: switching to {subject}");
      self.session.set_subject_override(subject, now);
      // Force a refresh on the next tick.
      self.last_refresh = None;
    }
  }

  /// Apply every vote settlement that has arrived since the last call.
  pub fn drain_votes(&mut self) {
    while let Ok((pending, persisted)) = self.settled_rx.try_recv() {
      if let Some(VotePhase::RolledBack) = self.session.settle_vote(&pending, persisted) {
        self.status_msg = "Vote failed, restored previous count".into();
      }
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return false;
    }

    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => return false,

      KeyCode::Down | KeyCode::Char('j') => self.scroll(1, now),
      KeyCode::Up | KeyCode::Char('k') => self.scroll(-1, now),

      KeyCode::Char('u') => self.vote(VoteDirection::Up),
      KeyCode::Char('d') => self.vote(VoteDirection::Down),

      KeyCode::Char(c @ '1'..='9') => {
        let choice = c as usize - '1' as usize;
        self.answer(choice);
      }

      KeyCode::Char('c') => {
        if self.session.has_subject_override() {
          self.session.clear_subject_override(now);
          self.last_refresh = None;
          self.status_msg = "Back to your feed".into();
        }
      }

      _ => {}
    }
    true
  }

  fn scroll(&mut self, step: isize, now: Instant) {
    let len = self.session.items().len();
    if len == 0 {
      return;
    }
    let next = match self.session.position() {
      None => 0,
      Some(p) => p.saturating_add_signed(step).min(len - 1),
    };
    if Some(next) != self.session.position() {
      self.session.focus(next, now);
    }
  }

  fn vote(&mut self, direction: VoteDirection) {
    let Some(item_id) = self.session.current_item().map(|i| i.id) else {
      return;
    };
    let Some(pending) = self.session.begin_vote(item_id, direction) else {
      return;
    };
    let persist = self.session.persist_vote(pending);
    let tx = self.settled_tx.clone();
    tokio::spawn(async move {
      let persisted = persist.await;
      tx.send((pending, persisted)).ok();
    });
  }

  fn answer(&mut self, choice: usize) {
    let Some(item_id) = self.session.current_item().map(|i| i.id) else {
      return;
    };
    if let Some(fb) = self.session.answer_quiz(item_id, choice) {
      self.status_msg = if fb.correct {
        format!("Correct! +{} XP", cascade_core::engagement::QUIZ_XP)
      } else {
        format!("Not quite, the answer was option {}", fb.correct_index + 1)
      };
      self.feedback.insert(item_id, fb);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  };

  use cascade_core::{
    engagement::{EngagementSignal, QuizAnswer, QuizOutcome, VoteDelta},
    item::{FeedItem, ItemPayload},
    learner::{Difficulty, ExclusionState},
    store::PoolQuery,
  };
  use cascade_feed::{FeedConfig, timetable::ScheduleEntry};
  use chrono::{NaiveDate, NaiveTime, Utc};
  use tokio::sync::Notify;

  use super::*;

  #[derive(Debug, thiserror::Error)]
  #[error("offline")]
  struct Offline;

  /// Serves a fixed pool; votes fail while `reject_votes` is set and pool
  /// reads wait for `release` while `hold_pool` is set.
  #[derive(Default)]
  struct FixedBackend {
    pool:         Vec<FeedItem>,
    reject_votes: AtomicBool,
    hold_pool:    AtomicBool,
    release:      Notify,
  }

  impl FeedBackend for FixedBackend {
    type Error = Offline;

    async fn pool(&self, _: &PoolQuery) -> Result<Vec<FeedItem>, Offline> {
      if self.hold_pool.load(Ordering::SeqCst) {
        self.release.notified().await;
      }
      Ok(self.pool.clone())
    }

    async fn exclusion_state(&self, _: &str) -> Result<ExclusionState, Offline> {
      Ok(ExclusionState::default())
    }

    async fn generate(&self, _: &str, _: &str, _: Difficulty) -> Result<(), Offline> {
      Ok(())
    }

    async fn report(&self, _: EngagementSignal) -> Result<(), Offline> { Ok(()) }

    async fn apply_vote(&self, _: Uuid, _: &str, _: VoteDelta) -> Result<(), Offline> {
      if self.reject_votes.load(Ordering::SeqCst) {
        Err(Offline)
      } else {
        Ok(())
      }
    }

    async fn answer_quiz(&self, answer: QuizAnswer) -> Result<QuizOutcome, Offline> {
      Ok(QuizOutcome {
        expertise:  Difficulty::Beginner,
        xp_awarded: if answer.is_correct { 10 } else { 0 },
      })
    }
  }

  fn item(topic: &str, payload: ItemPayload) -> FeedItem {
    FeedItem {
      id: Uuid::new_v4(),
      topic: topic.into(),
      subject: None,
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

  fn post(topic: &str) -> FeedItem {
    item(topic, ItemPayload::Post { hook: "Hook".into(), content: "Body".into() })
  }

  fn app_on(backend: FixedBackend, schedule: Vec<ScheduleEntry>) -> App<FixedBackend> {
    let session = FeedSession::new(Arc::new(backend), "u1", FeedConfig::default()).with_seed(7);
    App::new(session, FocusInterrupter::new(schedule))
  }

  fn app_with(pool: Vec<FeedItem>, schedule: Vec<ScheduleEntry>) -> App<FixedBackend> {
    app_on(FixedBackend { pool, ..Default::default() }, schedule)
  }

  fn key(code: KeyCode) -> KeyEvent { KeyEvent::new(code, KeyModifiers::NONE) }

  /// Fetch snapshots in the background and apply them once they land.
  async fn load(app: &mut App<FixedBackend>, now: Instant) {
    app.request_refresh();
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    app.drain_snapshots(now);
  }

  // 2026-10-19 is a Monday.
  fn monday_at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
      .unwrap()
      .and_hms_opt(h, m, 0)
      .unwrap()
  }

  #[tokio::test]
  async fn first_refresh_focuses_the_top_card() {
    let mut app = app_with(vec![post("a"), post("b")], vec![]);
    load(&mut app, Instant::now()).await;
    assert_eq!(app.session.position(), Some(0));
  }

  #[tokio::test]
  async fn scrolling_is_clamped_to_the_feed() {
    let mut app = app_with(vec![post("a"), post("b")], vec![]);
    let now = Instant::now();
    load(&mut app, now).await;

    assert!(app.handle_key(key(KeyCode::Char('k')), now));
    assert_eq!(app.session.position(), Some(0));
    app.handle_key(key(KeyCode::Char('j')), now);
    app.handle_key(key(KeyCode::Down), now);
    assert_eq!(app.session.position(), Some(1));
  }

  #[tokio::test]
  async fn quit_keys_stop_the_loop() {
    let mut app = app_with(vec![], vec![]);
    let now = Instant::now();
    assert!(!app.handle_key(key(KeyCode::Char('q')), now));
    let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
    assert!(!app.handle_key(ctrl_c, now));
  }

  #[tokio::test]
  async fn number_keys_answer_the_current_quiz() {
    let quiz = item("q", ItemPayload::Quiz {
      question:      "?".into(),
      options:       vec!["a".into(), "b".into()],
      correct_index: 1,
      explanation:   "b.".into(),
    });
    let id = quiz.id;
    // A lone quiz is held back until general content exists, so give it
    // enough company to be delivered first.
    let mut pool = vec![quiz];
    pool.extend((0..12).map(|n| post(&format!("p{n}"))));
    let mut app = app_with(pool, vec![]);
    let now = Instant::now();
    load(&mut app, now).await;

    let index = app
      .session
      .items()
      .iter()
      .position(|i| i.id == id)
      .unwrap();
    app.session.focus(index, now);

    app.handle_key(key(KeyCode::Char('2')), now);
    assert!(app.feedback[&id].correct);
    assert!(app.status_msg.starts_with("Correct"));

    app.handle_key(key(KeyCode::Char('1')), now);
    assert!(app.feedback[&id].correct);
  }

  #[tokio::test]
  async fn failed_vote_rolls_back_after_settlement() {
    let backend = FixedBackend {
      pool: vec![post("a")],
      reject_votes: AtomicBool::new(true),
      ..Default::default()
    };
    let mut app = app_on(backend, vec![]);
    let now = Instant::now();
    load(&mut app, now).await;
    let id = app.session.current_item().unwrap().id;

    app.handle_key(key(KeyCode::Char('u')), now);
    assert_eq!(app.session.tally(&id).unwrap().up, 1);

    for _ in 0..50 {
      tokio::task::yield_now().await;
      app.drain_votes();
      if app.session.tally(&id).unwrap().up == 0 {
        break;
      }
    }
    assert_eq!(app.session.tally(&id).unwrap().up, 0);
    assert!(app.status_msg.contains("Vote failed"));
  }

  #[tokio::test]
  async fn scheduled_class_overrides_the_subject_once() {
    let class = ScheduleEntry {
      subject: "chemistry".into(),
      day:     "Monday".into(),
      start:   NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
      end:     NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    };
    let mut app = app_with(vec![post("a")], vec![class]);
    let now = Instant::now();

    app.tick(now, monday_at(8, 30));
    assert_eq!(app.session.active_subject(), None);

    app.tick(now + TIMETABLE_EVERY, monday_at(9, 30));
    assert_eq!(app.session.active_subject(), Some("chemistry"));
    assert!(app.status_msg.contains("chemistry"));

    app.handle_key(key(KeyCode::Char('c')), now + TIMETABLE_EVERY);
    assert_eq!(app.session.active_subject(), None);
  }

  #[tokio::test]
  async fn tick_keeps_handling_keys_while_a_fetch_is_stalled() {
    let backend = Arc::new(FixedBackend {
      pool: vec![post("a"), post("b")],
      hold_pool: AtomicBool::new(true),
      ..Default::default()
    });
    let session =
      FeedSession::new(Arc::clone(&backend), "u1", FeedConfig::default()).with_seed(7);
    let mut app = App::new(session, FocusInterrupter::new(vec![]));
    let now = Instant::now();

    app.tick(now, monday_at(8, 0));
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    app.tick(now, monday_at(8, 0));
    assert!(!app.session.is_loaded());
    assert!(app.handle_key(key(KeyCode::Char('j')), now));

    backend.release.notify_one();
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    app.tick(now, monday_at(8, 0));
    assert!(app.session.is_loaded());
    assert_eq!(app.session.position(), Some(0));
  }

  #[tokio::test]
  async fn snapshots_for_a_replaced_subject_are_dropped() {
    let mut app = app_with(vec![post("a")], vec![]);
    let now = Instant::now();

    app.request_refresh();
    app.session.set_subject_override("chemistry".into(), now);
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    app.drain_snapshots(now);
    assert!(!app.session.is_loaded());
    assert!(app.session.items().is_empty());

    load(&mut app, now).await;
    assert!(app.session.is_loaded());
    assert_eq!(app.session.items().len(), 1);
  }
}
