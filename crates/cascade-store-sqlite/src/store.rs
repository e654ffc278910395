//! [`SqliteStore`]: the SQLite implementation of [`FeedStore`].

use std::path::Path;

use cascade_core::{
  engagement::{
    AvoidedTopic, Comment, EngagementSignal, NewComment, QUIZ_XP, QuizAnswer,
    QuizOutcome, VoteDelta,
  },
  item::{FeedItem, NewItem},
  learner::{Difficulty, EnrolledSubject, ExclusionState, LearnerProfile},
  store::{FeedStore, PoolQuery},
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawComment, RawItem, decode_count, decode_difficulty, decode_dt, decode_uuid,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

const ITEM_COLUMNS: &str = "item_id, topic, subject, kind, payload_json, image_query,
   upvotes, downvotes, comment_count, created_at, generated_by";

const ANONYMOUS: &str = "Anonymous";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Cascade item pool and learner store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The learner's avoided-topic log, oldest first.
  pub async fn avoided_topics(&self, user_id: &str) -> Result<Vec<AvoidedTopic>> {
    let user = user_id.to_owned();

    let raws: Vec<(String, String, i64, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT item_id, topic, duration_ms, recorded_at
           FROM avoided_topics WHERE user_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(item_id, topic, duration_ms, recorded_at)| {
        Ok(AvoidedTopic {
          user_id: user_id.to_owned(),
          item_id: decode_uuid(&item_id)?,
          topic,
          duration_ms: decode_count(duration_ms),
          recorded_at: decode_dt(&recorded_at)?,
        })
      })
      .collect()
  }
}

// ─── Connection helpers ──────────────────────────────────────────────────────

/// Run an item `SELECT` (which must list [`ITEM_COLUMNS`] in order) and
/// attach each item's vote rows.
fn query_items(
  conn: &rusqlite::Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawItem>> {
  let mut stmt = conn.prepare(sql)?;
  let mut items = stmt
    .query_map(params, |row| {
      Ok(RawItem {
        item_id:       row.get(0)?,
        topic:         row.get(1)?,
        subject:       row.get(2)?,
        kind:          row.get(3)?,
        payload_json:  row.get(4)?,
        image_query:   row.get(5)?,
        upvotes:       row.get(6)?,
        downvotes:     row.get(7)?,
        comment_count: row.get(8)?,
        created_at:    row.get(9)?,
        generated_by:  row.get(10)?,
        votes:         Vec::new(),
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut votes =
    conn.prepare("SELECT user_id, direction FROM votes WHERE item_id = ?1")?;
  for item in &mut items {
    item.votes = votes
      .query_map(rusqlite::params![item.item_id], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
  }
  Ok(items)
}

fn ensure_learner(conn: &rusqlite::Connection, user_id: &str) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO learners (user_id, xp, created_at) VALUES (?1, 0, ?2)",
    rusqlite::params![user_id, encode_dt(Utc::now())],
  )?;
  Ok(())
}

fn current_expertise(
  conn: &rusqlite::Connection,
  user_id: &str,
  topic: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT difficulty FROM topic_expertise WHERE user_id = ?1 AND topic = ?2",
      rusqlite::params![user_id, topic],
      |r| r.get(0),
    )
    .optional()
}

// ─── FeedStore impl ──────────────────────────────────────────────────────────

impl FeedStore for SqliteStore {
  type Error = Error;

  // ── Items ─────────────────────────────────────────────────────────────────

  async fn insert_items(
    &self,
    items: Vec<NewItem>,
    default_subject: String,
    generated_by: Option<String>,
  ) -> Result<Vec<FeedItem>> {
    let created_at = Utc::now();
    let stored: Vec<FeedItem> = items
      .into_iter()
      .map(|new| FeedItem {
        id:            Uuid::new_v4(),
        topic:         new.topic,
        subject:       Some(new.subject.unwrap_or_else(|| default_subject.clone())),
        payload:       new.payload,
        image_query:   new.image_query,
        upvotes:       0,
        downvotes:     0,
        comment_count: 0,
        voted_by:      Default::default(),
        created_at,
        generated_by:  generated_by.clone(),
      })
      .collect();

    let rows = stored
      .iter()
      .map(|item| {
        Ok((
          encode_uuid(item.id),
          item.topic.clone(),
          item.subject.clone(),
          item.kind().as_str().to_owned(),
          item.payload.to_json()?.to_string(),
          item.image_query.clone(),
        ))
      })
      .collect::<Result<Vec<_>>>()?;
    let at_str = encode_dt(created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO items (
               item_id, topic, subject, kind, payload_json, image_query,
               created_at, generated_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for (id, topic, subject, kind, payload, image_query) in rows {
            stmt.execute(rusqlite::params![
              id,
              topic,
              subject,
              kind,
              payload,
              image_query,
              at_str,
              generated_by,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(count = stored.len(), "inserted feed items");
    Ok(stored)
  }

  async fn get_item(&self, id: Uuid) -> Result<Option<FeedItem>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawItem> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ?1");
        Ok(query_items(conn, &sql, rusqlite::params![id_str])?.pop())
      })
      .await?;

    raw.map(RawItem::into_item).transpose()
  }

  async fn list_items<'a>(&'a self, query: &'a PoolQuery) -> Result<Vec<FeedItem>> {
    let subject = query.subject.clone();
    // SQLite treats a negative LIMIT as unbounded.
    let limit = query.limit.map_or(-1, |l| l as i64);

    let raws: Vec<RawItem> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ITEM_COLUMNS} FROM items
           WHERE ?1 IS NULL OR subject = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        );
        Ok(query_items(conn, &sql, rusqlite::params![subject, limit])?)
      })
      .await?;

    raws.into_iter().map(RawItem::into_item).collect()
  }

  async fn recent_topics(
    &self,
    subject: Option<String>,
    limit: usize,
  ) -> Result<Vec<String>> {
    let limit = limit as i64;
    let topics = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT topic FROM items
           WHERE ?1 IS NULL OR subject = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject, limit], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(topics)
  }

  // ── Learners ──────────────────────────────────────────────────────────────

  async fn get_learner(&self, user_id: String) -> Result<LearnerProfile> {
    let user = user_id.clone();

    let (xp, subjects, expertise): (
      Option<i64>,
      Vec<(String, String)>,
      Vec<(String, String)>,
    ) = self
      .conn
      .call(move |conn| {
        let xp: Option<i64> = conn
          .query_row(
            "SELECT xp FROM learners WHERE user_id = ?1",
            rusqlite::params![user],
            |r| r.get(0),
          )
          .optional()?;

        let mut stmt = conn.prepare(
          "SELECT name, difficulty FROM learner_subjects
           WHERE user_id = ?1 ORDER BY position",
        )?;
        let subjects = stmt
          .query_map(rusqlite::params![user], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn
          .prepare("SELECT topic, difficulty FROM topic_expertise WHERE user_id = ?1")?;
        let expertise = stmt
          .query_map(rusqlite::params![user], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((xp, subjects, expertise))
      })
      .await?;

    let subjects = subjects
      .into_iter()
      .map(|(name, d)| Ok(EnrolledSubject { name, difficulty: decode_difficulty(&d)? }))
      .collect::<Result<Vec<_>>>()?;
    let topic_expertise = expertise
      .into_iter()
      .map(|(topic, d)| Ok((topic, decode_difficulty(&d)?)))
      .collect::<Result<_>>()?;

    Ok(LearnerProfile {
      user_id,
      subjects,
      topic_expertise,
      xp: xp.map_or(0, decode_count),
    })
  }

  async fn put_subjects(
    &self,
    user_id: String,
    subjects: Vec<EnrolledSubject>,
  ) -> Result<LearnerProfile> {
    let user = user_id.clone();
    let rows: Vec<(String, &'static str)> = subjects
      .into_iter()
      .map(|s| (s.name, s.difficulty.as_str()))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_learner(&tx, &user)?;
        tx.execute(
          "DELETE FROM learner_subjects WHERE user_id = ?1",
          rusqlite::params![user],
        )?;
        for (position, (name, difficulty)) in rows.into_iter().enumerate() {
          tx.execute(
            "INSERT OR REPLACE INTO learner_subjects (user_id, name, difficulty, position)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user, name, difficulty, position as i64],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    self.get_learner(user_id).await
  }

  async fn exclusion_state(&self, user_id: String) -> Result<ExclusionState> {
    let (viewed, retry): (Vec<String>, Vec<String>) = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT item_id FROM viewed_items WHERE user_id = ?1")?;
        let viewed = stmt
          .query_map(rusqlite::params![user_id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt =
          conn.prepare("SELECT item_id FROM retry_items WHERE user_id = ?1")?;
        let retry = stmt
          .query_map(rusqlite::params![user_id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((viewed, retry))
      })
      .await?;

    Ok(ExclusionState {
      viewed_ids: viewed.iter().map(|s| decode_uuid(s)).collect::<Result<_>>()?,
      retry_ids:  retry.iter().map(|s| decode_uuid(s)).collect::<Result<_>>()?,
    })
  }

  async fn mark_viewed(&self, user_id: String, item_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(item_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_learner(&tx, &user_id)?;
        tx.execute(
          "INSERT OR IGNORE INTO viewed_items (user_id, item_id, recorded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![user_id, id_str, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_quiz_answer(&self, answer: QuizAnswer) -> Result<QuizOutcome> {
    let QuizAnswer { user_id, item_id, topic, is_correct } = answer;
    let id_str = encode_uuid(item_id);
    let at_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_learner(&tx, &user_id)?;

        // Unreadable stored tiers count as the lowest one.
        let current = current_expertise(&tx, &user_id, &topic)?
          .and_then(|d| d.parse::<Difficulty>().ok())
          .unwrap_or_default();

        let outcome = if is_correct {
          let next = current.promote();
          tx.execute(
            "DELETE FROM retry_items WHERE user_id = ?1 AND item_id = ?2",
            rusqlite::params![user_id, id_str],
          )?;
          tx.execute(
            "INSERT INTO topic_expertise (user_id, topic, difficulty) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, topic) DO UPDATE SET difficulty = excluded.difficulty",
            rusqlite::params![user_id, topic, next.as_str()],
          )?;
          tx.execute(
            "UPDATE learners SET xp = xp + ?2 WHERE user_id = ?1",
            rusqlite::params![user_id, QUIZ_XP as i64],
          )?;
          QuizOutcome { expertise: next, xp_awarded: QUIZ_XP }
        } else {
          tx.execute(
            "INSERT OR IGNORE INTO retry_items (user_id, item_id, recorded_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, id_str, at_str],
          )?;
          tx.execute(
            "DELETE FROM viewed_items WHERE user_id = ?1 AND item_id = ?2",
            rusqlite::params![user_id, id_str],
          )?;
          QuizOutcome { expertise: current, xp_awarded: 0 }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;
    Ok(outcome)
  }

  // ── Engagement ────────────────────────────────────────────────────────────

  async fn apply_vote(
    &self,
    item_id: Uuid,
    user_id: String,
    delta: VoteDelta,
  ) -> Result<FeedItem> {
    let id_str = encode_uuid(item_id);

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE items
           SET upvotes   = MAX(upvotes + ?2, 0),
               downvotes = MAX(downvotes + ?3, 0)
           WHERE item_id = ?1",
          rusqlite::params![id_str, delta.up, delta.down],
        )?;
        if changed == 0 {
          return Ok(false);
        }

        match delta.new_vote {
          Some(direction) => tx.execute(
            "INSERT INTO votes (item_id, user_id, direction) VALUES (?1, ?2, ?3)
             ON CONFLICT (item_id, user_id) DO UPDATE SET direction = excluded.direction",
            rusqlite::params![id_str, user_id, direction.as_str()],
          )?,
          None => tx.execute(
            "DELETE FROM votes WHERE item_id = ?1 AND user_id = ?2",
            rusqlite::params![id_str, user_id],
          )?,
        };
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::ItemNotFound(item_id));
    }
    self
      .get_item(item_id)
      .await?
      .ok_or(Error::ItemNotFound(item_id))
  }

  async fn record_avoided(&self, signal: EngagementSignal) -> Result<()> {
    let avoid_id = encode_uuid(Uuid::new_v4());
    let item_id = encode_uuid(signal.item_id);
    let duration = signal.duration_ms.unwrap_or(0) as i64;
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO avoided_topics
             (avoid_id, user_id, item_id, topic, duration_ms, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            avoid_id,
            signal.user_id,
            item_id,
            signal.topic,
            duration,
            at_str
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_comment(&self, item_id: Uuid, comment: NewComment) -> Result<Comment> {
    let user_name = comment
      .user_name
      .filter(|n| !n.trim().is_empty())
      .unwrap_or_else(|| ANONYMOUS.to_owned());
    let stored = Comment {
      comment_id: Uuid::new_v4(),
      item_id,
      user_id: comment.user_id,
      user_name,
      text: comment.text,
      created_at: Utc::now(),
    };

    let row = (
      encode_uuid(stored.comment_id),
      encode_uuid(item_id),
      stored.user_id.clone(),
      stored.user_name.clone(),
      stored.text.clone(),
      encode_dt(stored.created_at),
    );

    let found = self
      .conn
      .call(move |conn| {
        let (comment_id, item_id, user_id, user_name, text, created_at) = row;
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE items SET comment_count = comment_count + 1 WHERE item_id = ?1",
          rusqlite::params![item_id],
        )?;
        if changed == 0 {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO comments (comment_id, item_id, user_id, user_name, text, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![comment_id, item_id, user_id, user_name, text, created_at],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::ItemNotFound(item_id));
    }
    Ok(stored)
  }

  async fn list_comments(&self, item_id: Uuid) -> Result<Vec<Comment>> {
    let id_str = encode_uuid(item_id);

    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT comment_id, item_id, user_id, user_name, text, created_at
           FROM comments WHERE item_id = ?1
           ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawComment {
              comment_id: row.get(0)?,
              item_id:    row.get(1)?,
              user_id:    row.get(2)?,
              user_name:  row.get(3)?,
              text:       row.get(4)?,
              created_at: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }
}
