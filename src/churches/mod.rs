//! Church directory client: remote fetcher, proxy routes and the cached
//! fallback orchestrator.

mod api_types;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod proxy;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cached_client::CachedChurchClient;
pub use error::ChurchError;
