//! Handlers for `/feeds` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/feeds` | Optional `?subject=` and `?limit=`; newest first |
//! | `GET`  | `/feeds/:id` | 404 if not found |
//! | `POST` | `/feeds/:id/vote` | Body: [`VoteBody`]; returns the updated item |
//! | `GET`  | `/feeds/:id/comments` | Newest first |
//! | `POST` | `/feeds/:id/comments` | Body: [`CommentBody`]; returns 201 + comment |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use cascade_core::{
  engagement::{Comment, NewComment, VoteDelta},
  item::{FeedItem, VoteDirection},
  store::{FeedStore, Generator, PoolQuery},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  error::{ApiError, required_text},
};

async fn existing_item<S: FeedStore>(store: &S, id: Uuid) -> Result<FeedItem, ApiError> {
  store
    .get_item(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("feed item {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /feeds[?subject=<subject>][&limit=<n>]`
pub async fn list<S, G>(
  State(state): State<AppState<S, G>>,
  query: Result<Query<PoolQuery>, QueryRejection>,
) -> Result<Json<Vec<FeedItem>>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let Query(query) = query?;
  let items = state.store.list_items(&query).await.map_err(ApiError::store)?;
  Ok(Json(items))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /feeds/:id`
pub async fn get_one<S, G>(
  State(state): State<AppState<S, G>>,
  Path(id): Path<Uuid>,
) -> Result<Json<FeedItem>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  Ok(Json(existing_item(state.store.as_ref(), id).await?))
}

// ─── Vote ─────────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /feeds/:id/vote`: the counter deltas and the
/// user's resulting vote.
#[derive(Debug, Deserialize)]
pub struct VoteBody {
  pub user_id:  Option<String>,
  #[serde(default)]
  pub up:       i64,
  #[serde(default)]
  pub down:     i64,
  #[serde(default)]
  pub new_vote: Option<VoteDirection>,
}

/// `POST /feeds/:id/vote`
pub async fn vote<S, G>(
  State(state): State<AppState<S, G>>,
  Path(id): Path<Uuid>,
  body: Result<Json<VoteBody>, JsonRejection>,
) -> Result<Json<FeedItem>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let Json(body) = body?;
  let user_id = required_text(body.user_id, "user_id")?;
  if body.up.abs() > 1 || body.down.abs() > 1 {
    return Err(ApiError::BadRequest("vote deltas must be -1, 0 or 1".into()));
  }
  let delta = VoteDelta { up: body.up, down: body.down, new_vote: body.new_vote };

  existing_item(state.store.as_ref(), id).await?;
  let item = state
    .store
    .apply_vote(id, user_id, delta)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(item))
}

// ─── Comments ─────────────────────────────────────────────────────────────────

/// `GET /feeds/:id/comments`
pub async fn list_comments<S, G>(
  State(state): State<AppState<S, G>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  existing_item(state.store.as_ref(), id).await?;
  let comments = state.store.list_comments(id).await.map_err(ApiError::store)?;
  Ok(Json(comments))
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
  pub user_id:   Option<String>,
  pub user_name: Option<String>,
  pub text:      Option<String>,
}

/// `POST /feeds/:id/comments`: returns 201 + the stored [`Comment`].
pub async fn add_comment<S, G>(
  State(state): State<AppState<S, G>>,
  Path(id): Path<Uuid>,
  body: Result<Json<CommentBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FeedStore,
  G: Generator,
{
  let Json(body) = body?;
  let comment = NewComment {
    user_id:   required_text(body.user_id, "user_id")?,
    user_name: body.user_name,
    text:      required_text(body.text, "text")?,
  };

  existing_item(state.store.as_ref(), id).await?;
  let stored = state
    .store
    .add_comment(id, comment)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(stored)))
}
