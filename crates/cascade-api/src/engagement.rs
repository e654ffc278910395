//! Engagement endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/track-engagement` | `viewed` marks the item seen; `avoided` logs a short dwell |
//! | `POST` | `/quiz-engagement` | Records a quiz answer; returns the new expertise |

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use cascade_core::{
  engagement::{EngagementKind, EngagementSignal, QuizAnswer},
  learner::Difficulty,
  store::{FeedStore, Generator},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  error::{ApiError, required, required_text},
};

// ─── Track ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TrackBody {
  pub user_id:         Option<String>,
  pub feed_id:         Option<Uuid>,
  pub topic:           Option<String>,
  pub engagement_type: Option<String>,
  pub duration_ms:     Option<u64>,
}

/// `POST /track-engagement`
pub async fn track<S, G>(
  State(state): State<AppState<S, G>>,
  body: Result<Json<TrackBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let Json(body) = body?;
  let signal = EngagementSignal {
    user_id:     required_text(body.user_id, "user_id")?,
    item_id:     required(body.feed_id, "feed_id")?,
    topic:       required_text(body.topic, "topic")?,
    kind:        parse_kind(&required_text(body.engagement_type, "engagement_type")?)?,
    duration_ms: body.duration_ms,
  };

  match signal.kind {
    EngagementKind::Viewed => state
      .store
      .mark_viewed(signal.user_id, signal.item_id)
      .await
      .map_err(ApiError::store)?,
    EngagementKind::Avoided => {
      tracing::debug!(topic = %signal.topic, duration_ms = ?signal.duration_ms, "topic avoided");
      state
        .store
        .record_avoided(signal)
        .await
        .map_err(ApiError::store)?
    }
  }

  Ok(Json(json!({ "success": true })))
}

fn parse_kind(raw: &str) -> Result<EngagementKind, ApiError> {
  match raw {
    "viewed" => Ok(EngagementKind::Viewed),
    "avoided" => Ok(EngagementKind::Avoided),
    other => Err(ApiError::BadRequest(format!("unknown engagement_type {other:?}"))),
  }
}

// ─── Quiz ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QuizBody {
  pub user_id:    Option<String>,
  pub feed_id:    Option<Uuid>,
  pub topic:      Option<String>,
  #[serde(default)]
  pub is_correct: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizResponse {
  pub success:    bool,
  pub expertise:  Difficulty,
  pub xp_awarded: u64,
}

/// `POST /quiz-engagement`
pub async fn quiz<S, G>(
  State(state): State<AppState<S, G>>,
  body: Result<Json<QuizBody>, JsonRejection>,
) -> Result<Json<QuizResponse>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let Json(body) = body?;
  let answer = QuizAnswer {
    user_id:    required_text(body.user_id, "user_id")?,
    item_id:    required(body.feed_id, "feed_id")?,
    topic:      required_text(body.topic, "topic")?,
    is_correct: body.is_correct,
  };

  let outcome = state
    .store
    .record_quiz_answer(answer)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(QuizResponse {
    success:    true,
    expertise:  outcome.expertise,
    xp_awarded: outcome.xp_awarded,
  }))
}
