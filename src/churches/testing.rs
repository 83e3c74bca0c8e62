//! Scripted transport for exercising fallback chains without a network.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use url::Url;

use super::client::{RawResponse, Transport};
use super::error::FetchError;

/// Replays queued outcomes in order and records every requested URL.
/// Requests beyond the script fail as refused connections.
pub struct ScriptedTransport {
  outcomes: Mutex<VecDeque<Result<RawResponse, FetchError>>>,
  calls: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
  pub fn new(outcomes: Vec<Result<RawResponse, FetchError>>) -> Arc<Self> {
    Arc::new(Self {
      outcomes: Mutex::new(outcomes.into()),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn calls(&self) -> Vec<Url> {
    self.calls.lock().unwrap().clone()
  }

  pub fn hosts(&self) -> Vec<String> {
    self
      .calls()
      .iter()
      .map(|url| url.host_str().unwrap_or_default().to_string())
      .collect()
  }
}

impl Transport for ScriptedTransport {
  fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<RawResponse, FetchError>> {
    self.calls.lock().unwrap().push(url.clone());
    let outcome = self
      .outcomes
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(refused);
    async move { outcome }.boxed()
  }
}

pub fn ok_json(body: Value) -> Result<RawResponse, FetchError> {
  Ok(RawResponse {
    status: 200,
    body: serde_json::to_vec(&body).unwrap(),
  })
}

pub fn status(code: u16) -> Result<RawResponse, FetchError> {
  Ok(RawResponse {
    status: code,
    body: Vec::new(),
  })
}

pub fn refused() -> Result<RawResponse, FetchError> {
  Err(FetchError::Transport("connection refused".into()))
}
