//! [`HttpGenerator`]: delegates item generation to a remote model service.
//!
//! The service receives the [`GenerationRequest`] as JSON and answers with
//! `{"items": [NewItem, ...]}`.

use std::time::Duration;

use cascade_core::{
  item::NewItem,
  store::{GenerationRequest, Generator},
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
  #[error("generator request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("generator returned {status}: {body}")]
  Status { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct GeneratedBatch {
  #[serde(default)]
  items: Vec<NewItem>,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpGenerator {
  client: reqwest::Client,
  url:    String,
}

impl HttpGenerator {
  pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, GeneratorError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl Generator for HttpGenerator {
  type Error = GeneratorError;

  async fn generate(
    &self,
    request: GenerationRequest,
  ) -> Result<Vec<NewItem>, GeneratorError> {
    tracing::debug!(
      subject = %request.subject,
      difficulty = %request.difficulty,
      previous = request.previous_topics.len(),
      "calling generator"
    );
    let resp = self.client.post(&self.url).json(&request).send().await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(GeneratorError::Status { status: status.as_u16(), body });
    }
    let batch: GeneratedBatch = resp.json().await?;
    Ok(batch.items)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, http::StatusCode, routing::post};
  use cascade_core::{item::ItemPayload, learner::Difficulty};
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  use super::*;

  async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}/generate")
  }

  fn request() -> GenerationRequest {
    GenerationRequest {
      user_id:         "u1".into(),
      subject:         "astronomy".into(),
      difficulty:      Difficulty::Beginner,
      previous_topics: vec!["moons".into()],
    }
  }

  #[tokio::test]
  async fn posts_request_and_decodes_items() {
    let url = serve(Router::new().route(
      "/generate",
      post(|Json(req): Json<Value>| async move {
        assert_eq!(req["subject"], "astronomy");
        assert_eq!(req["previous_topics"][0], "moons");
        Json(json!({ "items": [{
          "topic": "comets",
          "payload": { "type": "post", "data": { "hook": "Dirty snowballs", "content": "Ice and dust." } }
        }] }))
      }),
    ))
    .await;

    let items = HttpGenerator::new(url, 5).unwrap().generate(request()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].topic, "comets");
    assert!(matches!(items[0].payload, ItemPayload::Post { .. }));
  }

  #[tokio::test]
  async fn upstream_errors_surface_status() {
    let url = serve(Router::new().route(
      "/generate",
      post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    ))
    .await;

    let err = HttpGenerator::new(url, 5).unwrap().generate(request()).await.unwrap_err();
    assert!(matches!(err, GeneratorError::Status { status: 503, .. }));
  }
}
