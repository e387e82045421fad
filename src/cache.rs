//! TTL cache for generated coaching text
//!
//! Entries expire after a fixed TTL and the cache is bounded: once a write
//! pushes it past `max_size`, expired entries are dropped first and then the
//! oldest survivors until the cache is back at capacity.
//!
//! The cache itself is not synchronized. Callers that share it across tasks
//! wrap it in a mutex (see `coach::CoachService`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// ---------------------------------------------------------------------------
/// Clock
/// ---------------------------------------------------------------------------

/// Time source for entry timestamps, swappable in tests
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// ---------------------------------------------------------------------------
/// Fingerprints
/// ---------------------------------------------------------------------------

/// Derive a cache key from a namespace and a fixed list of rendered fields.
///
/// Only the supplied parts contribute, so two inputs that agree on these
/// fields share a key even if they differ elsewhere.
pub fn cache_key(prefix: &str, parts: &[String]) -> String {
  let mut raw = String::from(prefix);
  for part in parts {
    raw.push('_');
    raw.push_str(part);
  }
  format!("{:x}", md5::compute(raw.as_bytes()))
}

/// Render an optional field for a fingerprint; absent values render empty
pub fn render_part<T: std::fmt::Display>(value: Option<T>) -> String {
  value.map(|v| v.to_string()).unwrap_or_default()
}

/// ---------------------------------------------------------------------------
/// Cache Entries
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub key: String,
  pub value: V,
  pub created_at: DateTime<Utc>,
  /// Position in the eviction order
  seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  pub size: usize,
  pub max_size: usize,
  pub ttl_seconds: u64,
}

/// ---------------------------------------------------------------------------
/// TTL Cache
/// ---------------------------------------------------------------------------

pub struct TtlCache<V> {
  entries: HashMap<String, CacheEntry<V>>,
  /// seq -> key, ascending seq is oldest first
  order: BTreeMap<u64, String>,
  next_seq: u64,
  ttl: Duration,
  max_size: usize,
  clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
  pub fn new(ttl: Duration, max_size: usize) -> Self {
    Self::with_clock(ttl, max_size, Arc::new(SystemClock))
  }

  pub fn with_clock(ttl: Duration, max_size: usize, clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: HashMap::new(),
      order: BTreeMap::new(),
      next_seq: 0,
      ttl,
      max_size,
      clock,
    }
  }

  /// Store a value stamped with the current time, replacing any previous entry
  pub fn put(&mut self, key: impl Into<String>, value: V) {
    let key = key.into();
    let seq = self.next_seq;
    self.next_seq += 1;

    let entry = CacheEntry {
      key: key.clone(),
      value,
      created_at: self.clock.now(),
      seq,
    };

    if let Some(previous) = self.entries.insert(key.clone(), entry) {
      self.order.remove(&previous.seq);
    }
    self.order.insert(seq, key);

    if self.entries.len() > self.max_size {
      self.cleanup();
    }
  }

  /// Fetch a value if present and still within its TTL.
  ///
  /// Expired entries are left in place; `cleanup` reclaims them.
  pub fn get(&self, key: &str) -> Option<V> {
    let entry = self.entries.get(key)?;
    if self.is_valid(entry) {
      Some(entry.value.clone())
    } else {
      None
    }
  }

  /// Raw presence check, ignoring TTL
  pub fn contains_key(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  /// Drop expired entries, then the oldest ones while over capacity
  pub fn cleanup(&mut self) {
    let now = self.clock.now();
    let ttl = self.ttl;
    let expired: Vec<(u64, String)> = self
      .entries
      .values()
      .filter(|e| !entry_is_valid(e.created_at, now, ttl))
      .map(|e| (e.seq, e.key.clone()))
      .collect();

    for (seq, key) in expired {
      self.entries.remove(&key);
      self.order.remove(&seq);
    }

    while self.entries.len() > self.max_size {
      match self.order.pop_first() {
        Some((_, key)) => {
          self.entries.remove(&key);
        }
        None => break,
      }
    }
  }

  /// Remove everything, returning how many entries were dropped
  pub fn clear(&mut self) -> usize {
    let count = self.entries.len();
    self.entries.clear();
    self.order.clear();
    count
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      size: self.entries.len(),
      max_size: self.max_size,
      ttl_seconds: self.ttl.as_secs(),
    }
  }

  fn is_valid(&self, entry: &CacheEntry<V>) -> bool {
    entry_is_valid(entry.created_at, self.clock.now(), self.ttl)
  }
}

/// An entry is valid while its age is strictly below the TTL
fn entry_is_valid(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
  match (now - created_at).to_std() {
    Ok(age) => age < ttl,
    // Clock went backwards; treat as fresh
    Err(_) => true,
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
