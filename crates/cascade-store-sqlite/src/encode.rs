//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings so that lexical order matches
//! chronological order. Item payloads are stored as the inner JSON of the
//! tagged union, next to a `kind` discriminant column. UUIDs are stored as
//! hyphenated lowercase strings.

use std::collections::HashMap;

use cascade_core::{
  engagement::Comment,
  item::{FeedItem, ItemPayload, VoteDirection},
  learner::Difficulty,
};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_direction(s: &str) -> Result<VoteDirection> {
  match s {
    "up" => Ok(VoteDirection::Up),
    "down" => Ok(VoteDirection::Down),
    other => Err(Error::UnknownVoteDirection(other.to_owned())),
  }
}

pub fn decode_difficulty(s: &str) -> Result<Difficulty> { Ok(s.parse()?) }

/// Counters are non-negative in the domain but `INTEGER` in SQLite.
pub fn decode_count(n: i64) -> u64 { n.max(0) as u64 }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `items` row plus its vote rows.
pub struct RawItem {
  pub item_id:       String,
  pub topic:         String,
  pub subject:       Option<String>,
  pub kind:          String,
  pub payload_json:  String,
  pub image_query:   Option<String>,
  pub upvotes:       i64,
  pub downvotes:     i64,
  pub comment_count: i64,
  pub created_at:    String,
  pub generated_by:  Option<String>,
  /// `(user_id, direction)` pairs from the `votes` table.
  pub votes:         Vec<(String, String)>,
}

impl RawItem {
  pub fn into_item(self) -> Result<FeedItem> {
    let data: serde_json::Value = serde_json::from_str(&self.payload_json)?;
    let payload = ItemPayload::from_parts(&self.kind, data)?;

    let voted_by = self
      .votes
      .iter()
      .map(|(user, dir)| Ok((user.clone(), decode_direction(dir)?)))
      .collect::<Result<HashMap<_, _>>>()?;

    Ok(FeedItem {
      id: decode_uuid(&self.item_id)?,
      topic: self.topic,
      subject: self.subject,
      payload,
      image_query: self.image_query,
      upvotes: decode_count(self.upvotes),
      downvotes: decode_count(self.downvotes),
      comment_count: decode_count(self.comment_count),
      voted_by,
      created_at: decode_dt(&self.created_at)?,
      generated_by: self.generated_by,
    })
  }
}

/// Raw strings read directly from a `comments` row.
pub struct RawComment {
  pub comment_id: String,
  pub item_id:    String,
  pub user_id:    String,
  pub user_name:  String,
  pub text:       String,
  pub created_at: String,
}

impl RawComment {
  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id: decode_uuid(&self.comment_id)?,
      item_id:    decode_uuid(&self.item_id)?,
      user_id:    self.user_id,
      user_name:  self.user_name,
      text:       self.text,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
