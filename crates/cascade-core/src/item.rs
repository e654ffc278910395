//! Feed items: the generated learning units served in the feed.
//!
//! An item's payload is written once by the generator and never changes.
//! Only the engagement counters move afterwards, and only through increments
//! applied by the store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The discriminant of an [`ItemPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
  Summary,
  Post,
  VisualConcept,
  Quiz,
}

impl ItemKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Summary => "summary",
      Self::Post => "post",
      Self::VisualConcept => "visual_concept",
      Self::Quiz => "quiz",
    }
  }
}

impl std::str::FromStr for ItemKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "summary" => Ok(Self::Summary),
      "post" => Ok(Self::Post),
      "visual_concept" => Ok(Self::VisualConcept),
      "quiz" => Ok(Self::Quiz),
      other => Err(Error::UnknownItemKind(other.to_owned())),
    }
  }
}

// ─── Votes ───────────────────────────────────────────────────────────────────

/// Direction of a single user's vote on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
  Up,
  Down,
}

impl VoteDirection {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Up => "up",
      Self::Down => "down",
    }
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The kind-specific content of a feed item. The variant name serves as the
/// `kind` discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ItemPayload {
  /// A flip card of bullet points.
  Summary { title: String, points: Vec<String> },
  /// A micro-lesson: an attention hook followed by a short body.
  Post { hook: String, content: String },
  /// An analogy that makes a concept concrete.
  VisualConcept {
    title:       String,
    analogy:     String,
    explanation: String,
  },
  /// A multiple-choice knowledge check.
  Quiz {
    question:      String,
    options:       Vec<String>,
    correct_index: usize,
    explanation:   String,
  },
}

impl ItemPayload {
  pub fn kind(&self) -> ItemKind {
    match self {
      Self::Summary { .. } => ItemKind::Summary,
      Self::Post { .. } => ItemKind::Post,
      Self::VisualConcept { .. } => ItemKind::VisualConcept,
      Self::Quiz { .. } => ItemKind::Quiz,
    }
  }

  pub fn is_quiz(&self) -> bool { matches!(self, Self::Quiz { .. }) }

  /// Reject payloads that cannot be rendered: blank required text, a summary
  /// with no points, or a quiz whose answer index is out of range.
  pub fn validate(&self) -> Result<()> {
    fn blank(s: &str) -> bool { s.trim().is_empty() }

    let reason = match self {
      Self::Summary { title, points } => {
        if blank(title) {
          Some("summary without a title")
        } else if points.is_empty() || points.iter().any(|p| blank(p)) {
          Some("summary without points")
        } else {
          None
        }
      }
      Self::Post { hook, content } => {
        (blank(hook) || blank(content)).then_some("post without hook or body")
      }
      Self::VisualConcept { title, analogy, explanation } => {
        (blank(title) || blank(analogy) || blank(explanation))
          .then_some("visual concept with missing text")
      }
      Self::Quiz { question, options, correct_index, .. } => {
        if blank(question) {
          Some("quiz without a question")
        } else if options.len() < 2 {
          Some("quiz with fewer than two options")
        } else if *correct_index >= options.len() {
          Some("quiz answer index out of range")
        } else {
          None
        }
      }
    };
    match reason {
      Some(r) => Err(Error::MalformedItem(r.to_owned())),
      None => Ok(()),
    }
  }

  /// Serialise the inner payload (without the type tag) for the
  /// `payload_json` database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in the
  /// database.
  pub fn from_parts(kind: &str, data: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "type": kind, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── FeedItem ────────────────────────────────────────────────────────────────

/// A generated learning unit together with its engagement counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
  pub id:            Uuid,
  /// Short label used for grouping, de-duplication and analytics.
  pub topic:         String,
  /// `None` places the item in the generic "for you" pool.
  pub subject:       Option<String>,
  pub payload:       ItemPayload,
  /// Search hint for a background image.
  #[serde(default)]
  pub image_query:   Option<String>,
  #[serde(default)]
  pub upvotes:       u64,
  #[serde(default)]
  pub downvotes:     u64,
  #[serde(default)]
  pub comment_count: u64,
  /// At most one entry per user.
  #[serde(default)]
  pub voted_by:      HashMap<String, VoteDirection>,
  pub created_at:    DateTime<Utc>,
  /// The user whose generation request produced this item.
  #[serde(default)]
  pub generated_by:  Option<String>,
}

impl FeedItem {
  pub fn kind(&self) -> ItemKind { self.payload.kind() }

  pub fn is_quiz(&self) -> bool { self.payload.is_quiz() }

  /// Net score as displayed next to the vote buttons.
  pub fn score(&self) -> i64 { self.upvotes as i64 - self.downvotes as i64 }

  pub fn vote_of(&self, user_id: &str) -> Option<VoteDirection> {
    self.voted_by.get(user_id).copied()
  }
}

// ─── NewItem ─────────────────────────────────────────────────────────────────

/// Generator output before the store assigns an id and creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
  pub topic:       String,
  #[serde(default)]
  pub subject:     Option<String>,
  pub payload:     ItemPayload,
  #[serde(default)]
  pub image_query: Option<String>,
}

impl NewItem {
  pub fn new(topic: impl Into<String>, payload: ItemPayload) -> Self {
    Self { topic: topic.into(), subject: None, payload, image_query: None }
  }

  pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
    self.subject = Some(subject.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn quiz(options: &[&str], correct_index: usize) -> ItemPayload {
    ItemPayload::Quiz {
      question: "What is the powerhouse of the cell?".into(),
      options: options.iter().map(|o| (*o).to_owned()).collect(),
      correct_index,
      explanation: "Mitochondria produce ATP.".into(),
    }
  }

  #[test]
  fn payload_parts_survive_storage_encoding() {
    let payload = ItemPayload::Post {
      hook:    "Ever wondered why the sky is blue?".into(),
      content: "Rayleigh scattering favours short wavelengths.".into(),
    };
    let data = payload.to_json().unwrap();
    assert!(data.get("hook").is_some());
    assert!(data.get("type").is_none());
    let back = ItemPayload::from_parts(payload.kind().as_str(), data).unwrap();
    assert_eq!(back, payload);
  }

  #[test]
  fn unknown_kind_is_rejected() {
    let err = ItemPayload::from_parts("meme", serde_json::json!({}));
    assert!(err.is_err());
    assert!("meme".parse::<ItemKind>().is_err());
    assert_eq!("visual_concept".parse::<ItemKind>().unwrap(), ItemKind::VisualConcept);
  }

  #[test]
  fn quiz_with_out_of_range_answer_is_malformed() {
    assert!(quiz(&["Nucleus", "Mitochondria"], 1).validate().is_ok());
    assert!(quiz(&["Nucleus", "Mitochondria"], 2).validate().is_err());
    assert!(quiz(&["Mitochondria"], 0).validate().is_err());
  }

  #[test]
  fn blank_text_is_malformed() {
    let summary = ItemPayload::Summary { title: "Cells".into(), points: vec![] };
    assert!(summary.validate().is_err());
    let post = ItemPayload::Post { hook: "  ".into(), content: "body".into() };
    assert!(post.validate().is_err());
  }

  #[test]
  fn score_can_go_negative() {
    let item = FeedItem {
      id:            Uuid::new_v4(),
      topic:         "photosynthesis".into(),
      subject:       None,
      payload:       quiz(&["a", "b"], 0),
      image_query:   None,
      upvotes:       1,
      downvotes:     3,
      comment_count: 0,
      voted_by:      HashMap::new(),
      created_at:    Utc::now(),
      generated_by:  None,
    };
    assert_eq!(item.score(), -2);
    assert!(item.is_quiz());
  }
}
