use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::FetchError;
use super::proxy::Proxy;
use super::types::Endpoint;

/// Status and body of an HTTP exchange, before any JSON parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

/// Parsed JSON body along with the HTTP status it arrived with.
#[derive(Debug, Clone)]
pub struct JsonResponse {
  pub status: u16,
  pub body: Value,
}

/// A single HTTP GET. Implementations do not retry.
pub trait Transport: Send + Sync {
  fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<RawResponse, FetchError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
  fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<RawResponse, FetchError>> {
    (**self).get(url)
  }
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(timeout: Option<Duration>) -> Result<Self> {
    let mut builder =
      reqwest::Client::builder().user_agent(concat!("churchdir/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }

    let client = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<RawResponse, FetchError>> {
    async move {
      let response = self
        .client
        .get(url.clone())
        .header(ACCEPT, "application/json")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.into()))?;

      let status = response.status();
      if !status.is_success() {
        return Ok(RawResponse {
          status: status.as_u16(),
          body: Vec::new(),
        });
      }

      let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(e.into()))?;

      Ok(RawResponse {
        status: status.as_u16(),
        body: body.to_vec(),
      })
    }
    .boxed()
  }
}

/// Issues GET requests against the church server, directly or through a proxy.
pub struct RemoteFetcher<T: Transport> {
  transport: T,
  base_url: Url,
}

impl<T: Transport> RemoteFetcher<T> {
  pub fn new(transport: T, base_url: Url) -> Self {
    Self {
      transport,
      base_url,
    }
  }

  /// Fetch `endpoint` and parse the body as JSON.
  pub async fn fetch(&self, endpoint: &Endpoint, proxy: Option<Proxy>) -> Result<Value, FetchError> {
    Ok(self.fetch_response(endpoint, proxy).await?.body)
  }

  /// Like [`fetch`](Self::fetch), keeping the HTTP status.
  ///
  /// The body is parsed only for 2xx responses; anything else is
  /// [`FetchError::Status`].
  pub async fn fetch_response(
    &self,
    endpoint: &Endpoint,
    proxy: Option<Proxy>,
  ) -> Result<JsonResponse, FetchError> {
    let target = endpoint.url(&self.base_url, Utc::now().timestamp_millis())?;
    let url = match proxy {
      Some(proxy) => proxy
        .rewrite(&target)
        .map_err(|e| FetchError::InvalidUrl(format!("{} via {}: {}", target, proxy, e)))?,
      None => target,
    };

    debug!(%url, "sending request");
    let response = self.transport.get(&url).await?;

    if !(200..300).contains(&response.status) {
      return Err(FetchError::Status(response.status));
    }

    let body = serde_json::from_slice(&response.body)?;
    Ok(JsonResponse {
      status: response.status,
      body,
    })
  }
}
