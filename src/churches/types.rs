use serde::Serialize;
use url::Url;

use super::error::FetchError;

pub use crate::cache::Dataset;

/// Server resources this client reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
  /// Whole dataset: `/churches`
  Churches,
  /// One record: `/churches/{id}`
  Church(String),
  /// Liveness check: `/ping`
  Ping,
  /// Table listing: `/tabelas`
  Tables,
}

impl Endpoint {
  fn segments(&self) -> Vec<&str> {
    match self {
      Self::Churches => vec!["churches"],
      Self::Church(id) => vec!["churches", id.as_str()],
      Self::Ping => vec!["ping"],
      Self::Tables => vec!["tabelas"],
    }
  }

  /// Build `{base}/{path}?t={timestamp_ms}`.
  ///
  /// The timestamp defeats intermediary caches between us and the server.
  pub fn url(&self, base: &Url, timestamp_ms: i64) -> Result<Url, FetchError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);

    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| FetchError::InvalidUrl(base.to_string()))?;
      segments.pop_if_empty();
      segments.extend(self.segments());
    }

    url
      .query_pairs_mut()
      .append_pair("t", &timestamp_ms.to_string());

    Ok(url)
  }
}

/// Outcome of a liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
  pub online: bool,
  /// HTTP status of the successful check, 0 when offline
  pub status: u16,
  pub message: String,
  pub method: StatusMethod,
}

/// How the liveness check reached (or failed to reach) the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMethod {
  Direct,
  Proxy,
  AllFailed,
  Error,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base() -> Url {
    Url::parse("https://server-qx03.onrender.com").unwrap()
  }

  #[test]
  fn test_churches_url() {
    let url = Endpoint::Churches.url(&base(), 1700000000000).unwrap();
    assert_eq!(
      url.as_str(),
      "https://server-qx03.onrender.com/churches?t=1700000000000"
    );
  }

  #[test]
  fn test_single_church_url() {
    let url = Endpoint::Church("igreja-1".to_string())
      .url(&base(), 5)
      .unwrap();
    assert_eq!(url.as_str(), "https://server-qx03.onrender.com/churches/igreja-1?t=5");
  }

  #[test]
  fn test_id_is_a_single_path_segment() {
    let url = Endpoint::Church("a/b".to_string()).url(&base(), 5).unwrap();
    assert_eq!(url.path(), "/churches/a%2Fb");
  }

  #[test]
  fn test_base_with_path_prefix() {
    let base = Url::parse("http://localhost:5000/api/").unwrap();
    let url = Endpoint::Tables.url(&base, 1).unwrap();
    assert_eq!(url.as_str(), "http://localhost:5000/api/tabelas?t=1");
  }

  #[test]
  fn test_status_method_serializes_snake_case() {
    let status = ServerStatus {
      online: false,
      status: 0,
      message: "down".to_string(),
      method: StatusMethod::AllFailed,
    };
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["method"], "all_failed");
  }
}
