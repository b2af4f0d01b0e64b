//! Failure kinds surfaced to the user.
//!
//! Listing failures end up in the full-panel error view, detail failures in a
//! blocking notice. A degraded channel lookup never becomes one of these.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
  /// The stored or entered API key failed the length check.
  #[error("API key is missing or too short")]
  CredentialInvalid,
  /// Network failure, non-success status, or an `error` payload from the API.
  #[error("{0}")]
  FetchFailed(String),
  /// A single-video lookup returned no items.
  #[error("Video not found")]
  NotFound,
  /// The native player could not be constructed.
  #[error("Player could not be created: {0}")]
  PlayerConstruction(String),
}

impl ClientError {
  pub fn fetch(err: impl std::fmt::Display) -> Self {
    Self::FetchFailed(err.to_string())
  }
}
