//! Handlers for `/learners` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/learners/:user_id` | Empty profile for unknown users |
//! | `PUT`  | `/learners/:user_id/subjects` | Body: `[{"name":"...","difficulty":"..."}]` |
//! | `GET`  | `/learners/:user_id/exclusions` | Viewed and retry sets |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use cascade_core::{
  learner::{EnrolledSubject, ExclusionState, LearnerProfile},
  store::{FeedStore, Generator},
};

use crate::{AppState, error::ApiError};

/// `GET /learners/:user_id`
pub async fn get_one<S, G>(
  State(state): State<AppState<S, G>>,
  Path(user_id): Path<String>,
) -> Result<Json<LearnerProfile>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let profile = state.store.get_learner(user_id).await.map_err(ApiError::store)?;
  Ok(Json(profile))
}

/// `PUT /learners/:user_id/subjects`
pub async fn put_subjects<S, G>(
  State(state): State<AppState<S, G>>,
  Path(user_id): Path<String>,
  body: Result<Json<Vec<EnrolledSubject>>, JsonRejection>,
) -> Result<Json<LearnerProfile>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let Json(subjects) = body?;
  if subjects.iter().any(|s| s.name.trim().is_empty()) {
    return Err(ApiError::BadRequest("subject names must not be blank".into()));
  }
  let profile = state
    .store
    .put_subjects(user_id, subjects)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(profile))
}

/// `GET /learners/:user_id/exclusions`
pub async fn exclusions<S, G>(
  State(state): State<AppState<S, G>>,
  Path(user_id): Path<String>,
) -> Result<Json<ExclusionState>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let state = state
    .store
    .exclusion_state(user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(state))
}
