//! Viewport tracking and dwell-time signals.
//!
//! Each item moves `Offscreen → Intersecting → Offscreen`. Exactly one item
//! is current at a time: when another item takes the viewport, the previous
//! one is closed out first.

use std::{collections::HashSet, time::Instant};

use cascade_core::item::FeedItem;
use uuid::Uuid;

/// Visibility phase of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Offscreen,
  Intersecting,
}

/// Engagement derived from viewport transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewportSignal {
  /// First intersection of the item in this session.
  Viewed { item_id: Uuid, topic: String },
  /// The item left the viewport before the avoidance threshold.
  Avoided { item_id: Uuid, topic: String, dwell_ms: u64 },
  /// The item was genuinely read; feeds the session summary.
  Engaged {
    item_id:  Uuid,
    topic:    String,
    subject:  Option<String>,
    dwell_ms: u64,
  },
}

#[derive(Debug, Clone)]
struct Current {
  item_id: Uuid,
  topic:   String,
  subject: Option<String>,
  since:   Instant,
}

#[derive(Debug, Clone)]
pub struct ViewportTracker {
  visibility_threshold: f32,
  avoid_threshold_ms:   u64,
  current:              Option<Current>,
  viewed:               HashSet<Uuid>,
}

impl ViewportTracker {
  pub fn new(visibility_threshold: f32, avoid_threshold_ms: u64) -> Self {
    Self {
      visibility_threshold,
      avoid_threshold_ms,
      current: None,
      viewed: HashSet::new(),
    }
  }

  pub fn phase(&self, id: &Uuid) -> Phase {
    match &self.current {
      Some(c) if c.item_id == *id => Phase::Intersecting,
      _ => Phase::Offscreen,
    }
  }

  pub fn current(&self) -> Option<Uuid> { self.current.as_ref().map(|c| c.item_id) }

  pub fn has_viewed(&self, id: &Uuid) -> bool { self.viewed.contains(id) }

  /// Report how much of the viewport `item` occupies at `now`.
  pub fn observe(
    &mut self,
    item: &FeedItem,
    visible_fraction: f32,
    now: Instant,
  ) -> Vec<ViewportSignal> {
    let intersecting = visible_fraction >= self.visibility_threshold;
    let mut signals = Vec::new();

    match (intersecting, self.phase(&item.id)) {
      (true, Phase::Intersecting) | (false, Phase::Offscreen) => {}
      (true, Phase::Offscreen) => {
        signals.extend(self.leave(now));
        signals.extend(self.enter(item, now));
      }
      (false, Phase::Intersecting) => signals.extend(self.leave(now)),
    }

    signals
  }

  /// Close out the current item, e.g. when the feed is hidden or reset.
  pub fn leave(&mut self, now: Instant) -> Option<ViewportSignal> {
    let current = self.current.take()?;
    let dwell_ms =
      now.saturating_duration_since(current.since).as_millis() as u64;

    if dwell_ms < self.avoid_threshold_ms {
      Some(ViewportSignal::Avoided {
        item_id: current.item_id,
        topic: current.topic,
        dwell_ms,
      })
    } else {
      Some(ViewportSignal::Engaged {
        item_id: current.item_id,
        topic: current.topic,
        subject: current.subject,
        dwell_ms,
      })
    }
  }

  fn enter(&mut self, item: &FeedItem, now: Instant) -> Option<ViewportSignal> {
    self.current = Some(Current {
      item_id: item.id,
      topic:   item.topic.clone(),
      subject: item.subject.clone(),
      since:   now,
    });

    self.viewed.insert(item.id).then(|| ViewportSignal::Viewed {
      item_id: item.id,
      topic:   item.topic.clone(),
    })
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::testing::general;

  fn tracker() -> ViewportTracker { ViewportTracker::new(0.9, 2500) }

  #[test]
  fn short_dwell_is_avoided() {
    let item = general("enzymes");
    let mut t = tracker();
    let start = Instant::now();

    let entered = t.observe(&item, 1.0, start);
    assert!(matches!(entered[..], [ViewportSignal::Viewed { .. }]));

    let left = t.observe(&item, 0.0, start + Duration::from_millis(2400));
    assert_eq!(left, vec![ViewportSignal::Avoided {
      item_id:  item.id,
      topic:    "enzymes".into(),
      dwell_ms: 2400,
    }]);
  }

  #[test]
  fn long_dwell_is_engaged_not_avoided() {
    let item = general("enzymes");
    let mut t = tracker();
    let start = Instant::now();

    t.observe(&item, 1.0, start);
    let left = t.observe(&item, 0.0, start + Duration::from_millis(2600));
    assert!(matches!(
      left[..],
      [ViewportSignal::Engaged { dwell_ms: 2600, .. }]
    ));
  }

  #[test]
  fn viewed_fires_once_per_item() {
    let item = general("osmosis");
    let mut t = tracker();
    let start = Instant::now();

    let mut all = Vec::new();
    all.extend(t.observe(&item, 1.0, start));
    all.extend(t.observe(&item, 0.0, start + Duration::from_secs(1)));
    all.extend(t.observe(&item, 1.0, start + Duration::from_secs(2)));
    all.extend(t.observe(&item, 0.0, start + Duration::from_secs(6)));

    let viewed = all
      .iter()
      .filter(|s| matches!(s, ViewportSignal::Viewed { .. }))
      .count();
    assert_eq!(viewed, 1);
  }

  #[test]
  fn partial_visibility_does_not_count() {
    let item = general("osmosis");
    let mut t = tracker();
    assert!(t.observe(&item, 0.6, Instant::now()).is_empty());
    assert_eq!(t.phase(&item.id), Phase::Offscreen);
    assert!(!t.has_viewed(&item.id));
  }

  #[test]
  fn next_item_closes_out_the_previous_one() {
    let a = general("a");
    let b = general("b");
    let mut t = tracker();
    let start = Instant::now();

    t.observe(&a, 1.0, start);
    let signals = t.observe(&b, 1.0, start + Duration::from_millis(300));
    assert_eq!(signals.len(), 2);
    assert!(matches!(&signals[0], ViewportSignal::Avoided { item_id, .. } if *item_id == a.id));
    assert!(matches!(&signals[1], ViewportSignal::Viewed { item_id, .. } if *item_id == b.id));
    assert_eq!(t.current(), Some(b.id));
    assert_eq!(t.phase(&a.id), Phase::Offscreen);
  }

  #[test]
  fn repeated_full_visibility_is_idempotent() {
    let a = general("a");
    let mut t = tracker();
    let start = Instant::now();
    t.observe(&a, 1.0, start);
    assert!(t.observe(&a, 0.95, start + Duration::from_millis(10)).is_empty());
  }
}
