//! Cache layer that keeps the in-memory tier and the durable tier in step.

use chrono::{DateTime, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use super::storage::KeyValueStore;
use super::traits::Dataset;

/// Durable key holding the JSON-serialized dataset.
pub const CHURCHES_DATA_KEY: &str = "churchesData";
/// Durable key holding the last successful sync, in epoch milliseconds.
pub const LAST_SYNC_KEY: &str = "lastSync";

/// Two-tier cache of the last known-good church dataset.
///
/// Every operation is infallible from the caller's point of view. Storage
/// errors are logged and reads degrade to an empty or absent result.
pub struct ChurchCache<S: KeyValueStore> {
  storage: S,
  memory: Mutex<Dataset>,
}

impl<S: KeyValueStore> ChurchCache<S> {
  /// Create a cache over the given durable store and initialize it.
  pub fn new(storage: S) -> Self {
    let cache = Self {
      storage,
      memory: Mutex::new(Dataset::new()),
    };
    cache.init();
    cache
  }

  /// Ensure the durable tier holds a valid JSON object. Idempotent.
  ///
  /// A readable dataset is also loaded into an empty memory tier so both
  /// tiers start out in step. Storage errors leave the durable tier as is.
  pub fn init(&self) {
    let raw = match self.storage.get_item(CHURCHES_DATA_KEY) {
      Ok(raw) => raw,
      Err(e) => {
        error!(error = %e, "failed to read durable cache");
        return;
      }
    };

    let Some(raw) = raw else {
      info!("no cached churches found, initializing durable store");
      self.reset_durable();
      return;
    };

    match serde_json::from_str::<Dataset>(&raw) {
      Ok(data) => {
        debug!(count = data.len(), "found cached churches in durable store");
        let mut memory = self.memory();
        if memory.is_empty() {
          *memory = data;
        }
      }
      Err(e) => {
        warn!(error = %e, "durable cache malformed, resetting it");
        self.reset_durable();
      }
    }
  }

  /// All cached churches; the memory tier wins when it is non-empty.
  pub fn get_all(&self) -> Dataset {
    {
      let memory = self.memory();
      if !memory.is_empty() {
        debug!(count = memory.len(), "reading churches from memory cache");
        return memory.clone();
      }
    }

    match self.read_durable() {
      Ok(Some(data)) => {
        debug!(count = data.len(), "reading churches from durable cache");
        data
      }
      Ok(None) => Dataset::new(),
      Err(e) => {
        error!(error = %e, "failed to read churches from cache");
        Dataset::new()
      }
    }
  }

  /// A single cached church record, if present in either tier.
  pub fn get_one(&self, id: &str) -> Option<Value> {
    if let Some(record) = self.memory().get(id) {
      return Some(record.clone());
    }

    match self.read_durable() {
      Ok(data) => data.and_then(|mut data| data.remove(id)),
      Err(e) => {
        error!(id, error = %e, "failed to read church from cache");
        None
      }
    }
  }

  /// Replace both tiers with `data` and stamp the sync time.
  pub fn put_all(&self, data: &Dataset) {
    {
      let mut memory = self.memory();
      memory.clear();
      for (id, record) in data {
        memory.insert(id.clone(), record.clone());
      }
    }

    let stamped = self
      .write_durable(data)
      .and_then(|_| self.stamp_last_sync());

    match stamped {
      Ok(()) => debug!(count = data.len(), "stored churches in cache"),
      Err(e) => error!(error = %e, "failed to store churches in cache"),
    }
  }

  /// Update a single record in both tiers, leaving other entries untouched.
  pub fn put_one(&self, id: &str, record: Value) {
    let mut data = match self.read_durable() {
      Ok(Some(data)) => data,
      Ok(None) => Dataset::new(),
      Err(e) => {
        warn!(id, error = %e, "durable cache unreadable, starting from empty");
        Dataset::new()
      }
    };

    {
      let mut memory = self.memory();
      if memory.is_empty() {
        *memory = data.clone();
      }
      memory.insert(id.to_string(), record.clone());
    }
    data.insert(id.to_string(), record);

    match self.write_durable(&data) {
      Ok(()) => debug!(id, "updated church in cache"),
      Err(e) => error!(id, error = %e, "failed to update church in cache"),
    }
  }

  /// When the durable tier was last refreshed by a successful bulk fetch.
  pub fn last_sync(&self) -> Option<DateTime<Utc>> {
    let raw = match self.storage.get_item(LAST_SYNC_KEY) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(error = %e, "failed to read last sync time");
        return None;
      }
    };

    let millis = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
  }

  fn memory(&self) -> MutexGuard<'_, Dataset> {
    self.memory.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn read_durable(&self) -> Result<Option<Dataset>> {
    let Some(raw) = self.storage.get_item(CHURCHES_DATA_KEY)? else {
      return Ok(None);
    };

    let data = serde_json::from_str(&raw)
      .map_err(|e| eyre!("Failed to parse cached churches: {}", e))?;

    Ok(Some(data))
  }

  fn write_durable(&self, data: &Dataset) -> Result<()> {
    let raw =
      serde_json::to_string(data).map_err(|e| eyre!("Failed to serialize churches: {}", e))?;
    self.storage.set_item(CHURCHES_DATA_KEY, &raw)
  }

  fn stamp_last_sync(&self) -> Result<()> {
    let now = Utc::now().timestamp_millis().to_string();
    self.storage.set_item(LAST_SYNC_KEY, &now)
  }

  fn reset_durable(&self) {
    if let Err(e) = self.write_durable(&Dataset::new()) {
      error!(error = %e, "failed to initialize durable cache");
    }
  }
}
