//! Church client that wraps the remote fetcher with fallback routes and caching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheResult, ChurchCache, KeyValueStore, MemoryStorage, SqliteStorage};
use crate::config::Config;

use super::api_types::{PingResponse, TablesResponse};
use super::client::{HttpTransport, RemoteFetcher, Transport};
use super::error::{Attempt, ChurchError, FetchError};
use super::proxy::{Proxy, Route};
use super::types::{Dataset, Endpoint, ServerStatus, StatusMethod};

/// Routes for single-record reads, status checks and table listings.
const SHORT_CHAIN: [Route; 2] = [Route::Direct, Route::Proxy(Proxy::AllOrigins)];

/// Church client with proxy fallback and offline support.
///
/// Bulk reads try every route in order and fall back to the cache last.
/// Single-record reads consult the cache first and only go to the network
/// on a miss.
pub struct CachedChurchClient<T: Transport, S: KeyValueStore> {
  fetcher: RemoteFetcher<T>,
  cache: ChurchCache<S>,
  bulk_chain: Vec<Route>,
  /// Age past which cached data is reported stale (logged only)
  expiration: Option<Duration>,
}

impl CachedChurchClient<HttpTransport, Box<dyn KeyValueStore>> {
  /// Build the client described by `config`.
  pub fn from_config(config: &Config) -> Result<Self> {
    let transport = HttpTransport::new(config.server.timeout())?;
    let base_url = config.server.base_url()?;

    let storage: Box<dyn KeyValueStore> = if config.cache.persist {
      Box::new(SqliteStorage::open(config.cache.path.as_deref())?)
    } else {
      Box::new(MemoryStorage::default())
    };

    info!(server = %base_url, "church client initialized");

    Ok(
      Self::new(RemoteFetcher::new(transport, base_url), ChurchCache::new(storage))
        .with_cors_anywhere(config.proxies.include_cors_anywhere)
        .with_expiration(config.cache.expiration()),
    )
  }
}

impl<T: Transport, S: KeyValueStore> CachedChurchClient<T, S> {
  pub fn new(fetcher: RemoteFetcher<T>, cache: ChurchCache<S>) -> Self {
    let mut bulk_chain = vec![Route::Direct];
    bulk_chain.extend(Proxy::FALLBACK_CHAIN.map(Route::Proxy));

    Self {
      fetcher,
      cache,
      bulk_chain,
      expiration: None,
    }
  }

  /// Append CORS Anywhere as a last remote step of bulk reads.
  pub fn with_cors_anywhere(mut self, enabled: bool) -> Self {
    let route = Route::Proxy(Proxy::CorsAnywhere);
    if enabled && !self.bulk_chain.contains(&route) {
      self.bulk_chain.push(route);
    }
    self
  }

  /// Set the age past which cache fallbacks are reported stale.
  pub fn with_expiration(mut self, expiration: Duration) -> Self {
    self.expiration = Some(expiration);
    self
  }

  pub fn cache(&self) -> &ChurchCache<S> {
    &self.cache
  }

  /// Fetch the whole dataset.
  ///
  /// 1. Direct request, then each proxy in order; the first success is
  ///    cached and returned
  /// 2. If every route failed, serve the cache when it is non-empty
  /// 3. Otherwise fail with [`ChurchError::Exhausted`]
  pub async fn fetch_all(&self) -> Result<CacheResult<Dataset>, ChurchError> {
    let mut attempts = Vec::new();

    for &route in &self.bulk_chain {
      match self.fetch_dataset(&Endpoint::Churches, route).await {
        Ok(data) => {
          info!(%route, count = data.len(), "churches loaded");
          self.cache.put_all(&data);
          return Ok(Self::fresh(data, route));
        }
        Err(error) => {
          warn!(%route, %error, "fetching churches failed");
          attempts.push(Attempt { route, error });
        }
      }
    }

    let cached = self.cache.get_all();
    if !cached.is_empty() {
      let last_sync = self.cache.last_sync();
      self.report_staleness(last_sync);
      info!(count = cached.len(), "every route failed, serving cached churches");
      return Ok(CacheResult::from_cache(cached, last_sync));
    }

    Err(ChurchError::Exhausted { attempts })
  }

  /// Fetch a single church, returned as a one-entry dataset when cached.
  ///
  /// The cache is consulted before any network request. On a miss the
  /// direct route and then AllOrigins are tried; the server's response is
  /// returned as received and its record for `id`, if any, is cached.
  pub async fn fetch_one(&self, id: &str) -> Result<CacheResult<Dataset>, ChurchError> {
    if let Some(record) = self.cache.get_one(id) {
      debug!(id, "church found in cache");
      let mut data = Dataset::new();
      data.insert(id.to_string(), record);
      return Ok(CacheResult::from_cache(data, self.cache.last_sync()));
    }

    let endpoint = Endpoint::Church(id.to_string());
    let mut attempts = Vec::new();

    for route in SHORT_CHAIN {
      match self.fetch_dataset(&endpoint, route).await {
        Ok(data) => {
          info!(id, %route, "church loaded");
          if let Some(record) = data.get(id) {
            self.cache.put_one(id, record.clone());
          }
          return Ok(Self::fresh(data, route));
        }
        Err(error) => {
          warn!(id, %route, %error, "fetching church failed");
          attempts.push(Attempt { route, error });
        }
      }
    }

    Err(ChurchError::Exhausted { attempts })
  }

  /// Check whether the server answers `/ping`, directly or via AllOrigins.
  pub async fn check_server_status(&self) -> ServerStatus {
    for route in SHORT_CHAIN {
      match self.fetcher.fetch_response(&Endpoint::Ping, route.proxy()).await {
        Ok(response) => {
          let message = serde_json::from_value::<PingResponse>(response.body)
            .ok()
            .and_then(|ping| ping.message);
          let (method, default_message) = match route {
            Route::Direct => (StatusMethod::Direct, "Server active"),
            Route::Proxy(_) => (StatusMethod::Proxy, "Server active (via proxy)"),
          };

          return ServerStatus {
            online: true,
            status: response.status,
            message: message.unwrap_or_else(|| default_message.to_string()),
            method,
          };
        }
        Err(FetchError::InvalidUrl(reason)) => {
          return ServerStatus {
            online: false,
            status: 0,
            message: reason,
            method: StatusMethod::Error,
          };
        }
        Err(error) => warn!(%route, %error, "status check failed"),
      }
    }

    ServerStatus {
      online: false,
      status: 0,
      message: "Could not connect to the server".to_string(),
      method: StatusMethod::AllFailed,
    }
  }

  /// List the tables the server exposes.
  pub async fn list_tables(&self) -> Result<Vec<String>, ChurchError> {
    let mut attempts = Vec::new();

    for route in SHORT_CHAIN {
      let listed = self
        .fetcher
        .fetch(&Endpoint::Tables, route.proxy())
        .await
        .and_then(|body| serde_json::from_value::<TablesResponse>(body).map_err(FetchError::from));

      match listed {
        Ok(response) => return Ok(response.tabelas),
        Err(error) => {
          warn!(%route, %error, "listing tables failed");
          attempts.push(Attempt { route, error });
        }
      }
    }

    Err(ChurchError::Exhausted { attempts })
  }

  async fn fetch_dataset(&self, endpoint: &Endpoint, route: Route) -> Result<Dataset, FetchError> {
    let body: Value = self.fetcher.fetch(endpoint, route.proxy()).await?;
    Ok(serde_json::from_value(body)?)
  }

  fn fresh(data: Dataset, route: Route) -> CacheResult<Dataset> {
    match route {
      Route::Direct => CacheResult::direct(data),
      Route::Proxy(proxy) => CacheResult::via_proxy(data, proxy.name()),
    }
  }

  fn report_staleness(&self, last_sync: Option<DateTime<Utc>>) {
    let (Some(expiration), Some(last_sync)) = (self.expiration, last_sync) else {
      return;
    };

    let age = Utc::now() - last_sync;
    if age > expiration {
      warn!(
        last_sync = %last_sync,
        age_secs = age.num_seconds(),
        "serving cached churches older than the configured expiration"
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, CHURCHES_DATA_KEY};
  use crate::churches::testing::{ok_json, refused, status, ScriptedTransport};
  use serde_json::json;
  use std::sync::Arc;
  use url::Url;

  type TestClient = CachedChurchClient<Arc<ScriptedTransport>, Arc<MemoryStorage>>;

  fn client(transport: &Arc<ScriptedTransport>, storage: &Arc<MemoryStorage>) -> TestClient {
    let fetcher = RemoteFetcher::new(
      Arc::clone(transport),
      Url::parse("https://example.com").unwrap(),
    );
    CachedChurchClient::new(fetcher, ChurchCache::new(Arc::clone(storage)))
  }

  fn dataset(value: Value) -> Dataset {
    serde_json::from_value(value).unwrap()
  }

  fn exhausted_routes(err: ChurchError) -> Vec<Route> {
    match err {
      ChurchError::Exhausted { attempts } => attempts.into_iter().map(|a| a.route).collect(),
    }
  }

  #[tokio::test]
  async fn test_fetch_all_direct_success_makes_one_call() {
    let transport = ScriptedTransport::new(vec![ok_json(json!({"a": 1}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.data, dataset(json!({"a": 1})));
    assert_eq!(result.source, CacheSource::Direct);
    assert_eq!(transport.hosts(), vec!["example.com"]);
  }

  #[tokio::test]
  async fn test_fetch_all_stops_at_first_proxy_success() {
    let transport = ScriptedTransport::new(vec![
      refused(),
      ok_json(json!({"b": 2})),
      ok_json(json!({"never": true})),
    ]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.data, dataset(json!({"b": 2})));
    assert_eq!(result.source, CacheSource::Proxy("AllOrigins"));
    assert_eq!(transport.hosts(), vec!["example.com", "api.allorigins.win"]);
  }

  #[tokio::test]
  async fn test_fetch_all_reaches_second_proxy() {
    let transport = ScriptedTransport::new(vec![
      status(500),
      status(429),
      ok_json(json!({"c": 3})),
    ]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.source, CacheSource::Proxy("corsproxy.io"));
    assert_eq!(
      transport.hosts(),
      vec!["example.com", "api.allorigins.win", "corsproxy.io"]
    );
  }

  #[tokio::test]
  async fn test_fetch_all_non_object_body_counts_as_failure() {
    let transport = ScriptedTransport::new(vec![
      ok_json(json!([1, 2, 3])),
      ok_json(json!({"a": 1})),
    ]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.source, CacheSource::Proxy("AllOrigins"));
  }

  #[tokio::test]
  async fn test_fetch_all_success_repopulates_cache() {
    let transport = ScriptedTransport::new(vec![ok_json(json!({"a": 1, "b": 2}))]);
    let storage = Arc::new(MemoryStorage::default());
    storage
      .set_item(CHURCHES_DATA_KEY, r#"{"old":0}"#)
      .unwrap();
    let client = client(&transport, &storage);

    client.fetch_all().await.unwrap();

    let durable: Dataset =
      serde_json::from_str(&storage.get_item(CHURCHES_DATA_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(durable, dataset(json!({"a": 1, "b": 2})));
    assert_eq!(client.cache().get_all(), durable);
    assert!(client.cache().last_sync().is_some());
  }

  #[tokio::test]
  async fn test_fetch_all_falls_back_to_cache() {
    let transport = ScriptedTransport::new(vec![refused(), refused(), refused()]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);
    client.cache().put_all(&dataset(json!({"a": 1})));

    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.data, dataset(json!({"a": 1})));
    assert_eq!(result.source, CacheSource::Cache);
    assert!(result.cached_at.is_some());
    assert_eq!(transport.calls().len(), 3);
  }

  #[tokio::test]
  async fn test_fetch_all_exhausted_with_empty_cache() {
    let transport = ScriptedTransport::new(vec![refused(), status(503), refused()]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let err = client.fetch_all().await.unwrap_err();

    assert_eq!(err.to_string(), "Could not reach server via any method");
    assert_eq!(
      exhausted_routes(err),
      vec![
        Route::Direct,
        Route::Proxy(Proxy::AllOrigins),
        Route::Proxy(Proxy::CorsProxyIo)
      ]
    );
  }

  #[tokio::test]
  async fn test_fetch_all_with_cors_anywhere_tries_four_routes() {
    let transport = ScriptedTransport::new(vec![
      refused(),
      refused(),
      refused(),
      ok_json(json!({"d": 4})),
    ]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage).with_cors_anywhere(true);

    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.source, CacheSource::Proxy("CORS Anywhere"));
    assert_eq!(transport.hosts()[3], "cors-anywhere.herokuapp.com");
  }

  #[tokio::test]
  async fn test_fetch_all_expired_cache_is_still_served() {
    let transport = ScriptedTransport::new(vec![]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage).with_expiration(Duration::zero());
    client.cache().put_all(&dataset(json!({"a": 1})));

    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.source, CacheSource::Cache);
  }

  #[tokio::test]
  async fn test_fetch_all_offline_after_restart_and_single_fetch() {
    let storage = Arc::new(MemoryStorage::default());
    storage
      .set_item(CHURCHES_DATA_KEY, r#"{"a":1,"b":2}"#)
      .unwrap();

    // Fresh process: the single fetch misses, then the network goes away
    let transport = ScriptedTransport::new(vec![
      ok_json(json!({"c": 3})),
      refused(),
      refused(),
      refused(),
    ]);
    let client = client(&transport, &storage);

    client.fetch_one("c").await.unwrap();
    let result = client.fetch_all().await.unwrap();

    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.data, dataset(json!({"a": 1, "b": 2, "c": 3})));
  }

  #[tokio::test]
  async fn test_fetch_one_cache_hit_makes_no_calls() {
    let transport = ScriptedTransport::new(vec![]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);
    client.cache().put_all(&dataset(json!({"x": {"name": "Matriz"}})));

    let result = client.fetch_one("x").await.unwrap();

    assert_eq!(result.data, dataset(json!({"x": {"name": "Matriz"}})));
    assert_eq!(result.source, CacheSource::Cache);
    assert!(transport.calls().is_empty());
  }

  #[tokio::test]
  async fn test_fetch_one_miss_fetches_and_caches() {
    let transport = ScriptedTransport::new(vec![ok_json(json!({"y": {"name": "Capela"}}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);
    client.cache().put_all(&dataset(json!({"x": 1})));

    let result = client.fetch_one("y").await.unwrap();

    assert_eq!(result.source, CacheSource::Direct);
    assert_eq!(transport.calls()[0].path(), "/churches/y");
    assert_eq!(
      client.cache().get_all(),
      dataset(json!({"x": 1, "y": {"name": "Capela"}}))
    );
  }

  #[tokio::test]
  async fn test_fetch_one_uses_single_proxy_then_fails() {
    let transport = ScriptedTransport::new(vec![refused(), refused(), ok_json(json!({}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let err = client.fetch_one("z").await.unwrap_err();

    assert_eq!(
      exhausted_routes(err),
      vec![Route::Direct, Route::Proxy(Proxy::AllOrigins)]
    );
    assert_eq!(transport.calls().len(), 2);
  }

  #[tokio::test]
  async fn test_fetch_one_proxy_result_is_cached() {
    let transport = ScriptedTransport::new(vec![status(404), ok_json(json!({"z": 9}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let result = client.fetch_one("z").await.unwrap();

    assert_eq!(result.source, CacheSource::Proxy("AllOrigins"));
    assert_eq!(client.cache().get_one("z"), Some(json!(9)));
  }

  #[tokio::test]
  async fn test_fetch_one_response_without_id_is_returned_uncached() {
    let transport = ScriptedTransport::new(vec![ok_json(json!({}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let result = client.fetch_one("ghost").await.unwrap();

    assert!(result.data.is_empty());
    assert_eq!(client.cache().get_one("ghost"), None);
  }

  #[tokio::test]
  async fn test_server_status_direct() {
    let transport = ScriptedTransport::new(vec![ok_json(json!({"message": "pong"}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let status = client.check_server_status().await;

    assert_eq!(
      status,
      ServerStatus {
        online: true,
        status: 200,
        message: "pong".to_string(),
        method: StatusMethod::Direct,
      }
    );
  }

  #[tokio::test]
  async fn test_server_status_via_proxy_default_message() {
    let transport = ScriptedTransport::new(vec![refused(), ok_json(json!({}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let status = client.check_server_status().await;

    assert!(status.online);
    assert_eq!(status.method, StatusMethod::Proxy);
    assert_eq!(status.message, "Server active (via proxy)");
  }

  #[tokio::test]
  async fn test_server_status_all_failed() {
    let transport = ScriptedTransport::new(vec![refused(), status(500)]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let status = client.check_server_status().await;

    assert!(!status.online);
    assert_eq!(status.status, 0);
    assert_eq!(status.method, StatusMethod::AllFailed);
  }

  #[tokio::test]
  async fn test_list_tables() {
    let transport = ScriptedTransport::new(vec![ok_json(json!({"tabelas": ["churches"]}))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let tables = client.list_tables().await.unwrap();

    assert_eq!(tables, vec!["churches".to_string()]);
  }

  #[tokio::test]
  async fn test_list_tables_exhausted() {
    let transport = ScriptedTransport::new(vec![refused(), ok_json(json!("nope"))]);
    let storage = Arc::new(MemoryStorage::default());
    let client = client(&transport, &storage);

    let err = client.list_tables().await.unwrap_err();

    assert_eq!(exhausted_routes(err).len(), 2);
  }
}
