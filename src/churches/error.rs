//! Error types for church directory requests

use thiserror::Error;

use super::proxy::Route;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a single request attempt failed.
#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Invalid URL: {0}")]
  InvalidUrl(String),

  #[error("Request failed: {0}")]
  Transport(#[source] BoxError),

  #[error("Server responded with status {0}")]
  Status(u16),

  #[error("Malformed JSON body: {0}")]
  Parse(#[from] serde_json::Error),
}

/// A failed attempt along a fallback chain.
#[derive(Debug)]
pub struct Attempt {
  pub route: Route,
  pub error: FetchError,
}

/// Terminal error surfaced to callers once every fallback step failed.
#[derive(Error, Debug)]
pub enum ChurchError {
  #[error("Could not reach server via any method")]
  Exhausted { attempts: Vec<Attempt> },
}
