//! Core types shared by the cache tiers and their callers.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Church id -> opaque church record.
pub type Dataset = Map<String, Value>;

/// Result of a read, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Last sync time of the cache (only set when served from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Fresh data fetched straight from the server.
  pub fn direct(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Direct,
      cached_at: None,
    }
  }

  /// Fresh data fetched through a named proxy relay.
  pub fn via_proxy(data: T, proxy: &'static str) -> Self {
    Self {
      data,
      source: CacheSource::Proxy(proxy),
      cached_at: None,
    }
  }

  /// Data served from the local cache.
  pub fn from_cache(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at,
    }
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Direct request to the server
  Direct,
  /// Request relayed through a CORS proxy
  Proxy(&'static str),
  /// Local cache (network unavailable, or single-record hit)
  Cache,
}

impl fmt::Display for CacheSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Direct => write!(f, "direct"),
      Self::Proxy(name) => write!(f, "proxy ({})", name),
      Self::Cache => write!(f, "cache"),
    }
  }
}
