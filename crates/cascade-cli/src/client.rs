//! Async HTTP client wrapping the Cascade JSON API, exposed to the feed
//! engine as a [`FeedBackend`].

use std::time::Duration;

use anyhow::Context as _;
use cascade_core::{
  backend::FeedBackend,
  engagement::{EngagementKind, EngagementSignal, QuizAnswer, QuizOutcome, VoteDelta},
  item::FeedItem,
  learner::{Difficulty, ExclusionState, LearnerProfile},
  store::PoolQuery,
};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {path} → {status}")]
  Status {
    method: &'static str,
    path:   String,
    status: u16,
  },
}

/// Async HTTP client for the Cascade JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base:   Url,
}

impl ApiClient {
  pub fn new(base_url: &str) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    let base = Url::parse(base_url).with_context(|| format!("invalid server URL {base_url:?}"))?;
    Ok(Self { client, base })
  }

  /// `<base>/api/<segments...>`, each segment percent-encoded.
  fn url(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().push("api").extend(segments);
    }
    url
  }

  async fn send<T: DeserializeOwned>(
    &self,
    method: &'static str,
    req: RequestBuilder,
    path: &str,
  ) -> Result<T, ClientError> {
    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(ClientError::Status {
        method,
        path: path.to_owned(),
        status: resp.status().as_u16(),
      });
    }
    Ok(resp.json().await?)
  }

  async fn post<T: DeserializeOwned>(
    &self,
    segments: &[&str],
    body: &Value,
  ) -> Result<T, ClientError> {
    let url = self.url(segments);
    let path = url.path().to_owned();
    self.send("POST", self.client.post(url).json(body), &path).await
  }

  async fn get<T: DeserializeOwned>(
    &self,
    segments: &[&str],
    query: &[(&str, String)],
  ) -> Result<T, ClientError> {
    let url = self.url(segments);
    let path = url.path().to_owned();
    self.send("GET", self.client.get(url).query(query), &path).await
  }

  /// `GET /api/learners/<user_id>`
  pub async fn learner(&self, user_id: &str) -> Result<LearnerProfile, ClientError> {
    self.get(&["learners", user_id], &[]).await
  }
}

/// Decode a pool response item by item; items that do not match the
/// expected shape are dropped rather than failing the whole snapshot.
pub fn decode_pool(values: Vec<Value>) -> Vec<FeedItem> {
  values
    .into_iter()
    .filter_map(|v| match serde_json::from_value::<FeedItem>(v) {
      Ok(item) => Some(item),
      Err(e) => {
        tracing::debug!("skipping undecodable pool item: {e}");
        None
      }
    })
    .collect()
}

impl FeedBackend for ApiClient {
  type Error = ClientError;

  async fn pool(&self, query: &PoolQuery) -> Result<Vec<FeedItem>, ClientError> {
    let mut params = Vec::new();
    if let Some(subject) = &query.subject {
      params.push(("subject", subject.clone()));
    }
    if let Some(limit) = query.limit {
      params.push(("limit", limit.to_string()));
    }
    let values: Vec<Value> = self.get(&["feeds"], &params).await?;
    Ok(decode_pool(values))
  }

  async fn exclusion_state(&self, user_id: &str) -> Result<ExclusionState, ClientError> {
    self.get(&["learners", user_id, "exclusions"], &[]).await
  }

  async fn generate(
    &self,
    user_id: &str,
    subject: &str,
    difficulty: Difficulty,
  ) -> Result<(), ClientError> {
    let body = json!({
      "user_id": user_id,
      "subject": subject,
      "expertise_level": difficulty,
    });
    let resp: Value = self.post(&["generate-feed"], &body).await?;
    tracing::info!(%subject, count = %resp["count"], "generation finished");
    Ok(())
  }

  async fn report(&self, signal: EngagementSignal) -> Result<(), ClientError> {
    let engagement_type = match signal.kind {
      EngagementKind::Viewed => "viewed",
      EngagementKind::Avoided => "avoided",
    };
    let body = json!({
      "user_id": signal.user_id,
      "feed_id": signal.item_id,
      "topic": signal.topic,
      "engagement_type": engagement_type,
      "duration_ms": signal.duration_ms,
    });
    let _: Value = self.post(&["track-engagement"], &body).await?;
    Ok(())
  }

  async fn apply_vote(
    &self,
    item_id: Uuid,
    user_id: &str,
    delta: VoteDelta,
  ) -> Result<(), ClientError> {
    let body = json!({
      "user_id": user_id,
      "up": delta.up,
      "down": delta.down,
      "new_vote": delta.new_vote,
    });
    let id = item_id.to_string();
    let _: Value = self.post(&["feeds", &id, "vote"], &body).await?;
    Ok(())
  }

  async fn answer_quiz(&self, answer: QuizAnswer) -> Result<QuizOutcome, ClientError> {
    let body = json!({
      "user_id": answer.user_id,
      "feed_id": answer.item_id,
      "topic": answer.topic,
      "is_correct": answer.is_correct,
    });
    self.post(&["quiz-engagement"], &body).await
  }
}
