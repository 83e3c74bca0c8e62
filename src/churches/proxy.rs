//! Public CORS-proxy relays and the routes a request can take.

use std::fmt;
use url::{form_urlencoded, ParseError, Url};

/// A named URL-rewriting strategy that relays a request through a third party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proxy {
  /// api.allorigins.win, usually the most reliable
  AllOrigins,
  /// corsproxy.io
  CorsProxyIo,
  /// cors-anywhere.herokuapp.com, requires a captcha opt-in per client
  CorsAnywhere,
}

impl Proxy {
  /// Proxies tried, in order, after a failed direct request.
  pub const FALLBACK_CHAIN: [Proxy; 2] = [Proxy::AllOrigins, Proxy::CorsProxyIo];

  pub fn name(self) -> &'static str {
    match self {
      Self::AllOrigins => "AllOrigins",
      Self::CorsProxyIo => "corsproxy.io",
      Self::CorsAnywhere => "CORS Anywhere",
    }
  }

  /// Rewrite `target` into the URL that asks this proxy to fetch it.
  pub fn rewrite(self, target: &Url) -> Result<Url, ParseError> {
    match self {
      Self::AllOrigins => {
        Url::parse_with_params("https://api.allorigins.win/raw", &[("url", target.as_str())])
      }
      Self::CorsProxyIo => {
        let mut url = Url::parse("https://corsproxy.io/")?;
        let encoded: String = form_urlencoded::byte_serialize(target.as_str().as_bytes()).collect();
        url.set_query(Some(&encoded));
        Ok(url)
      }
      Self::CorsAnywhere => Url::parse(&format!("https://cors-anywhere.herokuapp.com/{}", target)),
    }
  }
}

impl fmt::Display for Proxy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// How a single attempt reaches the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  Direct,
  Proxy(Proxy),
}

impl Route {
  pub fn proxy(self) -> Option<Proxy> {
    match self {
      Self::Direct => None,
      Self::Proxy(proxy) => Some(proxy),
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Direct => f.write_str("direct"),
      Self::Proxy(proxy) => write!(f, "{}", proxy),
    }
  }
}
