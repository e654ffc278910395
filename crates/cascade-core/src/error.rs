//! Error types for `cascade-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("feed item not found: {0}")]
  ItemNotFound(Uuid),

  #[error("malformed feed item: {0}")]
  MalformedItem(String),

  #[error("unknown item kind discriminant: {0:?}")]
  UnknownItemKind(String),

  #[error("unknown difficulty: {0:?}")]
  UnknownDifficulty(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
