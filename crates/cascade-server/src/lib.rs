//! The Cascade HTTP server: configuration, the remote content generator and
//! the top-level router.

pub mod generator;

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use cascade_core::store::{FeedStore, Generator};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use generator::HttpGenerator;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CASCADE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  /// Endpoint that turns a generation request into new items.
  pub generator_url:          String,
  #[serde(default = "default_generator_timeout")]
  pub generator_timeout_secs: u64,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/cascade/cascade.db") }

fn default_generator_timeout() -> u64 { 60 }

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API under `/api`, with request tracing.
pub fn app<S, G>(store: Arc<S>, generator: Arc<G>) -> Router
where
  S: FeedStore + 'static,
  G: Generator + 'static,
{
  Router::new()
    .nest("/api", cascade_api::api_router(store, generator))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use cascade_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn config_fills_defaults() {
    let settings = config::Config::builder()
      .set_override("generator_url", "http://localhost:9000/generate")
      .unwrap()
      .build()
      .unwrap();
    let cfg: ServerConfig = settings.try_deserialize().unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.generator_timeout_secs, 60);
    assert_eq!(cfg.generator_url, "http://localhost:9000/generate");
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let generator =
      Arc::new(HttpGenerator::new("http://127.0.0.1:9/generate", 1).unwrap());
    let app = app(store, generator);

    let resp = app
      .clone()
      .oneshot(Request::get("/api/feeds").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
      .oneshot(Request::get("/feeds").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
