//! `POST /generate-feed`: ask the generator for a batch and add it to the
//! pool.
//!
//! Body: `{"user_id": "...", "subject": "...", "expertise_level": "..."}`.
//! `subject` defaults to the generic subject and `expertise_level` to
//! intermediate. Returns `{"success": true, "count": n}`.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use cascade_core::{
  GENERIC_SUBJECT,
  learner::Difficulty,
  store::{FeedStore, GenerationRequest, Generator},
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::{ApiError, required_text},
};

/// Topics passed to the generator so it avoids repeating itself.
const PREVIOUS_TOPICS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
  pub user_id:         Option<String>,
  pub subject:         Option<String>,
  pub expertise_level: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
  pub success: bool,
  pub count:   usize,
}

pub async fn handler<S, G>(
  State(state): State<AppState<S, G>>,
  body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let Json(body) = body?;
  let user_id = required_text(body.user_id, "user_id")?;
  let subject = body
    .subject
    .filter(|s| !s.trim().is_empty())
    .unwrap_or_else(|| GENERIC_SUBJECT.to_owned());
  let difficulty = match body.expertise_level.as_deref() {
    None | Some("") => Difficulty::Intermediate,
    Some(level) => level
      .parse()
      .map_err(|e: cascade_core::Error| ApiError::BadRequest(e.to_string()))?,
  };

  let previous_topics = state
    .store
    .recent_topics(Some(subject.clone()), PREVIOUS_TOPICS)
    .await
    .map_err(ApiError::store)?;

  let request = GenerationRequest {
    user_id: user_id.clone(),
    subject: subject.clone(),
    difficulty,
    previous_topics,
  };
  let generated = state
    .generator
    .generate(request)
    .await
    .map_err(ApiError::generator)?;

  let total = generated.len();
  let items: Vec<_> = generated
    .into_iter()
    .filter(|item| match item.payload.validate() {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(topic = %item.topic, "dropping generated item: {e}");
        false
      }
    })
    .collect();

  let stored = state
    .store
    .insert_items(items, subject.clone(), Some(user_id))
    .await
    .map_err(ApiError::store)?;

  tracing::info!(%subject, %difficulty, generated = total, stored = stored.len(), "generated feed items");
  Ok(Json(GenerateResponse { success: true, count: stored.len() }))
}
