//! JSON REST API for Cascade.
//!
//! Exposes an axum [`Router`] backed by any [`FeedStore`] and [`Generator`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", cascade_api::api_router(store.clone(), generator.clone()))
//! ```

pub mod engagement;
pub mod error;
pub mod feeds;
pub mod generate;
pub mod learners;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use cascade_core::store::{FeedStore, Generator};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct AppState<S, G> {
  pub store:     Arc<S>,
  pub generator: Arc<G>,
}

impl<S, G> Clone for AppState<S, G> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      generator: Arc::clone(&self.generator),
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, G>(store: Arc<S>, generator: Arc<G>) -> Router<()>
where
  S: FeedStore + 'static,
  G: Generator + 'static,
{
  Router::new()
    // Generation & engagement
    .route("/generate-feed", post(generate::handler::<S, G>))
    .route("/track-engagement", post(engagement::track::<S, G>))
    .route("/quiz-engagement", post(engagement::quiz::<S, G>))
    // Item pool
    .route("/feeds", get(feeds::list::<S, G>))
    .route("/feeds/{id}", get(feeds::get_one::<S, G>))
    .route("/feeds/{id}/vote", post(feeds::vote::<S, G>))
    .route(
      "/feeds/{id}/comments",
      get(feeds::list_comments::<S, G>).post(feeds::add_comment::<S, G>),
    )
    // Learners
    .route("/learners/{user_id}", get(learners::get_one::<S, G>))
    .route("/learners/{user_id}/subjects", put(learners::put_subjects::<S, G>))
    .route("/learners/{user_id}/exclusions", get(learners::exclusions::<S, G>))
    .with_state(AppState { store, generator })
}
