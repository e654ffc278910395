//! [`FeedSession`]: the state owned by one scroller instance.
//!
//! The session is driven by events: pool and exclusion snapshots arrive
//! through [`FeedSession::on_pool_update`] and
//! [`FeedSession::on_exclusion_update`] (or [`FeedSession::refresh`], which
//! pulls both), viewport changes through [`FeedSession::observe`], and user
//! actions through the vote and quiz methods. Network side effects run on
//! spawned tasks, so every method that can reach the backend must be called
//! from within a tokio runtime.

use std::{
  collections::{HashMap, HashSet},
  future::Future,
  sync::Arc,
  time::Instant,
};

use cascade_core::{
  backend::FeedBackend,
  engagement::{EngagementKind, EngagementSignal, QUIZ_XP, QuizAnswer},
  item::{FeedItem, ItemPayload, VoteDirection},
  learner::{Difficulty, EnrolledSubject, ExclusionState},
  store::PoolQuery,
};
use rand::{SeedableRng, rngs::StdRng};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
  config::FeedConfig,
  exclusion::ExclusionTracker,
  interleave::{PendingBuffers, interleave, trailing_general_run},
  ledger::{PendingVote, VoteLedger, VotePhase, VoteTally},
  trigger::{GenerationContext, GenerationTrigger, resolve_target},
  viewport::{ViewportSignal, ViewportTracker},
};

/// XP shown in the session summary per genuinely engaged topic.
pub const SUMMARY_XP_PER_TOPIC: u64 = 15;

// ─── Reports ─────────────────────────────────────────────────────────────────

/// What a pool snapshot did to the delivered sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolUpdate {
  /// Items appended to the delivered sequence.
  pub appended:  usize,
  /// Unseen items removed because they became excluded.
  pub pruned:    usize,
  /// Quiz items held back until more general content arrives.
  pub held:      usize,
  /// Whether this snapshot asked for more content.
  pub generated: bool,
}

/// Exclusion and pool snapshots pulled together for one pool query.
#[derive(Debug, Clone, Default)]
pub struct Snapshots {
  /// The query the pool was fetched for.
  pub query:      PoolQuery,
  pub exclusions: ExclusionState,
  pub pool:       Vec<FeedItem>,
}

/// Immediate feedback for a quiz answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizFeedback {
  pub correct:       bool,
  pub correct_index: usize,
  pub explanation:   String,
}

/// End-of-session recap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
  /// Topics dwelt on past the avoidance threshold, in first-seen order.
  pub engaged_topics: Vec<String>,
  pub summary_xp:     u64,
  pub quiz_xp:        u64,
}

// ─── Session ─────────────────────────────────────────────────────────────────

pub struct FeedSession<B> {
  backend:            Arc<B>,
  user_id:            String,
  config:             FeedConfig,
  rng:                StdRng,

  subject:            Option<String>,
  difficulty:         Option<Difficulty>,
  subject_override:   Option<String>,
  enrolled:           Vec<EnrolledSubject>,

  exclusions:         ExclusionTracker,
  delivered:          Vec<FeedItem>,
  /// Every id placed in `delivered` during this session.
  known:              HashSet<Uuid>,
  pending:            PendingBuffers,
  position:           Option<usize>,
  loaded:             bool,

  viewport:           ViewportTracker,
  ledgers:            HashMap<Uuid, VoteLedger>,
  trigger:            GenerationTrigger,
  last_depth_trigger: Option<usize>,

  answers:            HashMap<Uuid, usize>,
  engaged_topics:     Vec<String>,
  quiz_xp:            u64,
}

impl<B> FeedSession<B>
where
  B: FeedBackend + 'static,
{
  pub fn new(backend: Arc<B>, user_id: impl Into<String>, config: FeedConfig) -> Self {
    let viewport =
      ViewportTracker::new(config.visibility_threshold, config.avoid_threshold_ms);
    Self {
      backend,
      user_id: user_id.into(),
      config,
      rng: StdRng::from_entropy(),
      subject: None,
      difficulty: None,
      subject_override: None,
      enrolled: Vec::new(),
      exclusions: ExclusionTracker::default(),
      delivered: Vec::new(),
      known: HashSet::new(),
      pending: PendingBuffers::default(),
      position: None,
      loaded: false,
      viewport,
      ledgers: HashMap::new(),
      trigger: GenerationTrigger::new(),
      last_depth_trigger: None,
      answers: HashMap::new(),
      engaged_topics: Vec::new(),
      quiz_xp: 0,
    }
  }

  /// Use a deterministic random source.
  pub fn with_seed(mut self, seed: u64) -> Self {
    self.rng = StdRng::seed_from_u64(seed);
    self
  }

  /// Restrict the feed to one subject, optionally at a fixed difficulty.
  pub fn with_subject(
    mut self,
    subject: Option<String>,
    difficulty: Option<Difficulty>,
  ) -> Self {
    self.subject = subject;
    self.difficulty = difficulty;
    self
  }

  pub fn with_enrolled(mut self, enrolled: Vec<EnrolledSubject>) -> Self {
    self.enrolled = enrolled;
    self
  }

  // ── Accessors ─────────────────────────────────────────────────────────

  pub fn user_id(&self) -> &str { &self.user_id }

  pub fn config(&self) -> &FeedConfig { &self.config }

  /// The timetable override if one is active, else the chosen subject.
  pub fn active_subject(&self) -> Option<&str> {
    self.subject_override.as_deref().or(self.subject.as_deref())
  }

  pub fn has_subject_override(&self) -> bool { self.subject_override.is_some() }

  pub fn pool_query(&self) -> PoolQuery {
    PoolQuery { subject: self.active_subject().map(str::to_owned), limit: None }
  }

  pub fn items(&self) -> &[FeedItem] { &self.delivered }

  pub fn position(&self) -> Option<usize> { self.position }

  pub fn current_item(&self) -> Option<&FeedItem> {
    self.position.and_then(|p| self.delivered.get(p))
  }

  /// `false` until the first pool snapshot has been applied.
  pub fn is_loaded(&self) -> bool { self.loaded }

  pub fn is_generating(&self) -> bool { self.trigger.is_generating() }

  pub fn exclusions(&self) -> &ExclusionState { self.exclusions.state() }

  pub fn pending(&self) -> &PendingBuffers { &self.pending }

  pub fn tally(&self, item_id: &Uuid) -> Option<VoteTally> {
    self.ledgers.get(item_id).map(VoteLedger::tally)
  }

  pub fn answer_of(&self, item_id: &Uuid) -> Option<usize> {
    self.answers.get(item_id).copied()
  }

  pub fn summary(&self) -> SessionSummary {
    SessionSummary {
      engaged_topics: self.engaged_topics.clone(),
      summary_xp:     self.engaged_topics.len() as u64 * SUMMARY_XP_PER_TOPIC,
      quiz_xp:        self.quiz_xp,
    }
  }

  // ── Snapshots ─────────────────────────────────────────────────────────

  /// Pull fresh exclusion and pool snapshots and apply them in that order.
  pub async fn refresh(&mut self) -> Result<PoolUpdate, B::Error> {
    let snapshots = self.fetch_snapshots().await?;
    Ok(self.apply_snapshots(snapshots))
  }

  /// A `Send + 'static` future pulling both snapshots for the current pool
  /// query, so the fetch can run on its own task.
  pub fn fetch_snapshots(
    &self,
  ) -> impl Future<Output = Result<Snapshots, B::Error>> + Send + 'static {
    let backend = Arc::clone(&self.backend);
    let user_id = self.user_id.clone();
    let query = self.pool_query();
    async move {
      let exclusions = backend.exclusion_state(&user_id).await?;
      let pool = backend.pool(&query).await?;
      Ok(Snapshots { query, exclusions, pool })
    }
  }

  pub fn apply_snapshots(&mut self, snapshots: Snapshots) -> PoolUpdate {
    self.on_exclusion_update(snapshots.exclusions);
    self.on_pool_update(snapshots.pool)
  }

  pub fn on_exclusion_update(&mut self, state: ExclusionState) {
    self.exclusions.update(state);
  }

  /// Apply a pool snapshot: refresh delivered items, prune newly excluded
  /// ones, then interleave unseen items onto the tail.
  pub fn on_pool_update(&mut self, pool: Vec<FeedItem>) -> PoolUpdate {
    let mut update = PoolUpdate::default();

    self.refresh_delivered(&pool);
    update.pruned = self.prune_excluded();
    self.enforce_spacing();

    let filtered = self.exclusions.filter_pool(pool);
    self.pending = self.exclusions.partition(&filtered, &self.known);

    let run = trailing_general_run(&self.delivered);
    let out = interleave(&mut self.pending, run, self.config.gap_range(), &mut self.rng);
    update.appended = out.items.len();
    for item in out.items {
      self.known.insert(item.id);
      self
        .ledgers
        .insert(item.id, VoteLedger::from_item(&item, &self.user_id));
      self.delivered.push(item);
    }
    update.held = self.pending.quiz.len() + self.pending.retry.len();
    self.loaded = true;

    // Held quizzes alone cannot be shown, so an empty tail needs fresh
    // general content even when the filtered pool is not empty.
    let exhausted = update.appended == 0
      && self.pending.general.is_empty()
      && self.unseen_start() >= self.delivered.len();
    if filtered.is_empty() || exhausted {
      update.generated = self.request_generation().is_some();
    }

    tracing::debug!(
      appended = update.appended,
      pruned = update.pruned,
      held = update.held,
      delivered = self.delivered.len(),
      "applied pool snapshot"
    );
    update
  }

  /// Swap delivered items for their fresh copies and resync vote ledgers.
  fn refresh_delivered(&mut self, pool: &[FeedItem]) {
    let fresh: HashMap<Uuid, &FeedItem> = pool.iter().map(|i| (i.id, i)).collect();
    for item in &mut self.delivered {
      if let Some(latest) = fresh.get(&item.id) {
        *item = (*latest).clone();
        if let Some(ledger) = self.ledgers.get_mut(&item.id) {
          ledger.sync(VoteTally::from_item(item, &self.user_id));
        }
      }
    }
  }

  /// Remove excluded items the learner has not reached yet. Cards already
  /// seen stay, even after scrolling back above them.
  fn prune_excluded(&mut self) -> usize {
    let start = self.unseen_start();
    let before = self.delivered.len();
    let exclusions = &self.exclusions;
    let viewport = &self.viewport;
    let ledgers = &mut self.ledgers;

    let mut index = 0;
    self.delivered.retain(|item| {
      let keep = index < start
        || viewport.has_viewed(&item.id)
        || !exclusions.excludes(&item.id);
      index += 1;
      if !keep {
        ledgers.remove(&item.id);
      }
      keep
    });
    before - self.delivered.len()
  }

  /// After pruning, withdraw unseen quizzes that ended up too close to the
  /// previous quiz. They return to the pool and are placed again later.
  fn enforce_spacing(&mut self) {
    let start = self.unseen_start();
    let mut run = trailing_general_run(&self.delivered[..start]);
    let mut index = start;

    while index < self.delivered.len() {
      let item = &self.delivered[index];
      if item.is_quiz() {
        if run < *self.config.gap_range().start() && !self.viewport.has_viewed(&item.id) {
          let withdrawn = self.delivered.remove(index);
          self.known.remove(&withdrawn.id);
          self.ledgers.remove(&withdrawn.id);
          continue;
        }
        run = 0;
      } else {
        run += 1;
      }
      index += 1;
    }
  }

  fn unseen_start(&self) -> usize {
    self.position.map_or(0, |p| p + 1).min(self.delivered.len())
  }

  // ── Subject selection ─────────────────────────────────────────────────

  /// Switch to a learner-chosen subject (or "for you" with `None`).
  pub fn set_subject(
    &mut self,
    subject: Option<String>,
    difficulty: Option<Difficulty>,
    now: Instant,
  ) {
    if self.subject == subject && self.difficulty == difficulty {
      return;
    }
    self.subject = subject;
    self.difficulty = difficulty;
    if self.subject_override.is_none() {
      self.reset_feed(now);
    }
  }

  /// Force a subject, e.g. because a scheduled class is in progress. The
  /// feed restarts and more content for that subject is requested at once.
  pub fn set_subject_override(&mut self, subject: String, now: Instant) {
    if self.subject_override.as_deref() == Some(subject.as_str()) {
      return;
    }
    tracing::info!(%subject, "subject override engaged");
    self.subject_override = Some(subject);
    self.reset_feed(now);
    self.request_generation();
  }

  pub fn clear_subject_override(&mut self, now: Instant) {
    if self.subject_override.take().is_some() {
      self.reset_feed(now);
    }
  }

  /// Drop the delivered feed; ids stay known so nothing is shown twice.
  fn reset_feed(&mut self, now: Instant) {
    self.blur(now);
    self.delivered.clear();
    self.pending = PendingBuffers::default();
    self.position = None;
    self.last_depth_trigger = None;
    self.loaded = false;
  }

  // ── Generation ────────────────────────────────────────────────────────

  /// Resolve a subject and ask for more content unless a request is
  /// already in flight.
  pub fn request_generation(&mut self) -> Option<JoinHandle<()>> {
    let active = self.subject_override.as_deref().or(self.subject.as_deref());
    let ctx = GenerationContext {
      active_subject:      active,
      difficulty_override: if self.subject_override.is_some() {
        None
      } else {
        self.difficulty
      },
      enrolled:            &self.enrolled,
    };
    let target = resolve_target(&ctx, &self.config.fallback_subject, &mut self.rng);
    self
      .trigger
      .fire(Arc::clone(&self.backend), self.user_id.clone(), target)
  }

  // ── Viewport ──────────────────────────────────────────────────────────

  /// Report how much of the viewport the item at `index` occupies.
  pub fn observe(&mut self, index: usize, visible_fraction: f32, now: Instant) {
    let Some(item) = self.delivered.get(index) else {
      return;
    };
    let signals = self.viewport.observe(item, visible_fraction, now);

    if visible_fraction >= self.config.visibility_threshold {
      self.position = Some(index);
      self.check_depth_trigger(index);
    }

    self.dispatch(signals);
  }

  /// Make the item at `index` the only one in view.
  pub fn focus(&mut self, index: usize, now: Instant) { self.observe(index, 1.0, now); }

  /// Nothing is in view any more (feed hidden, session ending).
  pub fn blur(&mut self, now: Instant) {
    let signal = self.viewport.leave(now);
    self.dispatch(signal);
  }

  fn check_depth_trigger(&mut self, index: usize) {
    let Some(point) = self.config.depth_trigger_index(self.delivered.len()) else {
      return;
    };
    if index >= point
      && self.last_depth_trigger != Some(point)
      && self.request_generation().is_some()
    {
      self.last_depth_trigger = Some(point);
    }
  }

  fn dispatch(&mut self, signals: impl IntoIterator<Item = ViewportSignal>) {
    for signal in signals {
      match signal {
        ViewportSignal::Viewed { item_id, topic } => {
          self.report(item_id, topic, EngagementKind::Viewed, None);
        }
        ViewportSignal::Avoided { item_id, topic, dwell_ms } => {
          self.report(item_id, topic, EngagementKind::Avoided, Some(dwell_ms));
        }
        ViewportSignal::Engaged { topic, .. } => {
          if !self.engaged_topics.contains(&topic) {
            self.engaged_topics.push(topic);
          }
        }
      }
    }
  }

  fn report(
    &self,
    item_id: Uuid,
    topic: String,
    kind: EngagementKind,
    duration_ms: Option<u64>,
  ) {
    let backend = Arc::clone(&self.backend);
    let signal = EngagementSignal {
      user_id: self.user_id.clone(),
      item_id,
      topic,
      kind,
      duration_ms,
    };
    tokio::spawn(async move {
      if let Err(e) = backend.report(signal).await {
        tracing::warn!(%item_id, ?kind, "engagement signal dropped: {e}");
      }
    });
  }

  // ── Votes ─────────────────────────────────────────────────────────────

  /// Apply a vote locally. Persist the returned vote with
  /// [`Self::persist_vote`] and feed the outcome to [`Self::settle_vote`].
  pub fn begin_vote(
    &mut self,
    item_id: Uuid,
    direction: VoteDirection,
  ) -> Option<PendingVote> {
    self.ledgers.get_mut(&item_id).map(|l| l.vote(direction))
  }

  /// A `Send + 'static` future persisting `pending`; resolves to whether the
  /// remote ledger accepted it.
  pub fn persist_vote(
    &self,
    pending: PendingVote,
  ) -> impl Future<Output = bool> + Send + 'static {
    let backend = Arc::clone(&self.backend);
    let user_id = self.user_id.clone();
    async move {
      match backend
        .apply_vote(pending.item_id, &user_id, pending.delta)
        .await
      {
        Ok(()) => true,
        Err(e) => {
          tracing::warn!(item_id = %pending.item_id, "vote failed: {e}");
          false
        }
      }
    }
  }

  pub fn settle_vote(
    &mut self,
    pending: &PendingVote,
    persisted: bool,
  ) -> Option<VotePhase> {
    self
      .ledgers
      .get_mut(&pending.item_id)
      .map(|l| l.settle(pending, persisted))
  }

  /// Vote and wait for persistence in one step.
  pub async fn vote(
    &mut self,
    item_id: Uuid,
    direction: VoteDirection,
  ) -> Option<VotePhase> {
    let pending = self.begin_vote(item_id, direction)?;
    let persisted = self.persist_vote(pending).await;
    self.settle_vote(&pending, persisted)
  }

  // ── Quizzes ───────────────────────────────────────────────────────────

  /// Answer a delivered quiz. Each quiz can be answered once per session.
  /// The outcome is sent to the backend, which flags wrong answers for
  /// retry and clears the flag on right ones.
  pub fn answer_quiz(&mut self, item_id: Uuid, choice: usize) -> Option<QuizFeedback> {
    if self.answers.contains_key(&item_id) {
      return None;
    }
    let item = self.delivered.iter().find(|i| i.id == item_id)?;
    let ItemPayload::Quiz { correct_index, explanation, .. } = &item.payload else {
      return None;
    };

    let correct = choice == *correct_index;
    let feedback = QuizFeedback {
      correct,
      correct_index: *correct_index,
      explanation: explanation.clone(),
    };
    let answer = QuizAnswer {
      user_id:    self.user_id.clone(),
      item_id,
      topic:      item.topic.clone(),
      is_correct: correct,
    };

    self.answers.insert(item_id, choice);
    if correct {
      self.quiz_xp += QUIZ_XP;
    }

    let backend = Arc::clone(&self.backend);
    tokio::spawn(async move {
      if let Err(e) = backend.answer_quiz(answer).await {
        tracing::warn!(%item_id, "failed to record quiz answer: {e}");
      }
    });

    Some(feedback)
  }
}
