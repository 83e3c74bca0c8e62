//! Two-tier cache for offline support.
//!
//! This module keeps the last known-good church dataset in:
//! - an in-memory map, consulted first
//! - a durable key-value store that survives restarts (SQLite by default)
//!
//! The cache never raises: storage failures are logged and degrade to an
//! empty or absent result.

mod layer;
mod storage;
mod traits;

pub use layer::{ChurchCache, CHURCHES_DATA_KEY};
pub use storage::{KeyValueStore, MemoryStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Dataset};
