//! Tuning knobs for a feed session.

use serde::{Deserialize, Serialize};

/// Engine configuration. Every field has a default, so a partial `[feed]`
/// table in a config file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
  /// Smallest number of general items between two quizzes.
  pub min_quiz_gap:            usize,
  /// Largest target gap drawn for a single injection.
  pub max_quiz_gap:            usize,
  /// Dwell below this counts as avoiding the item.
  pub avoid_threshold_ms:      u64,
  /// Fraction of the viewport an item must occupy to count as in view.
  pub visibility_threshold:    f32,
  /// Depth into the delivered sequence that requests more content.
  pub depth_trigger_ratio:     f32,
  /// The depth trigger only fires once more items than this are delivered.
  pub depth_trigger_min_items: usize,
  /// Subject requested when the learner has none enrolled.
  pub fallback_subject:        String,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      min_quiz_gap:            7,
      max_quiz_gap:            10,
      avoid_threshold_ms:      2500,
      visibility_threshold:    0.9,
      depth_trigger_ratio:     0.75,
      depth_trigger_min_items: 5,
      fallback_subject:        cascade_core::GENERIC_SUBJECT.to_owned(),
    }
  }
}

impl FeedConfig {
  /// The inclusive gap range, tolerating a config with min and max swapped.
  pub fn gap_range(&self) -> std::ops::RangeInclusive<usize> {
    let lo = self.min_quiz_gap.min(self.max_quiz_gap);
    let hi = self.min_quiz_gap.max(self.max_quiz_gap);
    lo..=hi
  }

  /// Index of the element whose arrival in view asks for more content, or
  /// `None` while the sequence is too short.
  pub fn depth_trigger_index(&self, len: usize) -> Option<usize> {
    if len <= self.depth_trigger_min_items {
      return None;
    }
    Some((len as f32 * self.depth_trigger_ratio).floor() as usize)
  }
}
