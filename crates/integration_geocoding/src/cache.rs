//! Write-through geocoding cache
//!
//! An in-memory map mirrors a single serialized blob held in the injected
//! [`KeyValueStore`]. Every insert updates memory and then rewrites the blob.
//! Expiry is checked lazily on read; nothing is ever swept, so expired
//! entries remain available as a last-resort fallback.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use domain::{GeoLocation, LocationSuggestion, PlaceDetail};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GeocodingError;
use crate::store::KeyValueStore;

/// Source of wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic expiry tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Start the clock at the given epoch milliseconds
    #[must_use]
    pub const fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// Move the clock forward
    #[allow(clippy::cast_possible_truncation)]
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Namespaced cache key
///
/// The prefix determines which payload variant the key may hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `search:<lowercased query>`
    Search(String),
    /// `details:<place id>`
    Details(String),
    /// `reverse:<lat:.4>:<lon:.4>`
    Reverse(String),
}

impl CacheKey {
    /// Key for a forward search; the query is lowercased
    #[must_use]
    pub fn search(query: &str) -> Self {
        Self::Search(query.to_lowercase())
    }

    /// Key for a place details lookup
    #[must_use]
    pub fn details(place_id: &str) -> Self {
        Self::Details(place_id.to_string())
    }

    /// Key for a reverse lookup, rounded to four decimals
    #[must_use]
    pub fn reverse(latitude: f64, longitude: f64) -> Self {
        Self::Reverse(GeoLocation::new_unchecked(latitude, longitude).coarse_key())
    }

    /// Namespace prefix
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::Search(_) => "search",
            Self::Details(_) => "details",
            Self::Reverse(_) => "reverse",
        }
    }

    /// Parse a stored key back into its namespace
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (namespace, rest) = raw.split_once(':')?;
        match namespace {
            "search" => Some(Self::Search(rest.to_string())),
            "details" => Some(Self::Details(rest.to_string())),
            "reverse" => Some(Self::Reverse(rest.to_string())),
            _ => None,
        }
    }

    /// Whether `payload` is the variant this namespace holds
    #[must_use]
    pub const fn accepts(&self, payload: &CachePayload) -> bool {
        matches!(
            (self, payload),
            (Self::Search(_), CachePayload::Suggestions(_))
                | (Self::Details(_) | Self::Reverse(_), CachePayload::Place(_))
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Self::Search(rest) | Self::Details(rest) | Self::Reverse(rest)) = self;
        write!(f, "{}:{rest}", self.namespace())
    }
}

/// Cached value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CachePayload {
    /// Results of an address search
    Suggestions(Vec<LocationSuggestion>),
    /// A resolved place (details or reverse lookup)
    Place(PlaceDetail),
}

/// Payload plus the time it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached value
    pub payload: CachePayload,
    /// Insertion time in epoch milliseconds
    pub stored_at_ms: i64,
}

impl CacheEntry {
    /// Whether the entry is younger than `ttl` at `now_ms`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) < ttl.as_millis() as i64
    }
}

/// Cache statistics for diagnostics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of entries in memory
    pub entries: usize,
    /// All keys, sorted
    pub keys: Vec<String>,
    /// Fresh lookups served from memory
    pub hits: u64,
    /// Lookups that fell through to the network
    pub misses: u64,
}

/// In-memory mirror of the persisted cache blob
pub struct GeocodeCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for GeocodeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeocodeCache")
            .field("entries", &self.entries.read().len())
            .field("store", &"<KeyValueStore>")
            .field("storage_key", &self.storage_key)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl GeocodeCache {
    /// Create an empty cache persisted under `storage_key`
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        storage_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
            storage_key: storage_key.into(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Replace the in-memory mirror with the persisted blob
    ///
    /// Missing, unreadable or corrupt data leaves the cache empty. Entries
    /// whose payload does not match their key's namespace are dropped.
    /// Returns the number of entries loaded.
    pub async fn load(&self) -> usize {
        let raw = match self.store.get_item(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %self.storage_key, "No persisted geocoding cache");
                return 0;
            },
            Err(e) => {
                warn!(error = %e, "Failed to read persisted geocoding cache, starting empty");
                return 0;
            },
        };

        let parsed: HashMap<String, CacheEntry> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Persisted geocoding cache is corrupt, starting empty");
                return 0;
            },
        };

        let total = parsed.len();
        let valid: HashMap<String, CacheEntry> = parsed
            .into_iter()
            .filter(|(key, entry)| {
                CacheKey::parse(key).is_some_and(|k| k.accepts(&entry.payload))
            })
            .collect();

        if valid.len() < total {
            warn!(
                dropped = total - valid.len(),
                "Dropped cache entries with mismatched namespace"
            );
        }

        let loaded = valid.len();
        *self.entries.write() = valid;
        debug!(entries = loaded, "Geocoding cache loaded");
        loaded
    }

    /// Entry for `key` if it is younger than `ttl`
    pub fn get_fresh(&self, key: &CacheKey, ttl: Duration) -> Option<CachePayload> {
        let now = self.clock.now_millis();
        let found = self
            .entries
            .read()
            .get(&key.to_string())
            .filter(|entry| entry.is_fresh(now, ttl))
            .map(|entry| entry.payload.clone());

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Entry for `key` regardless of age
    pub fn get_any(&self, key: &CacheKey) -> Option<CachePayload> {
        self.entries
            .read()
            .get(&key.to_string())
            .map(|entry| entry.payload.clone())
    }

    /// Store a payload and write the whole cache through to the store
    ///
    /// A payload that does not belong in the key's namespace is ignored.
    /// Persistence failures are logged; the in-memory insert still stands.
    pub async fn insert(&self, key: &CacheKey, payload: CachePayload) {
        if !key.accepts(&payload) {
            warn!(%key, "Refusing to cache payload of the wrong kind");
            return;
        }

        let entry = CacheEntry {
            payload,
            stored_at_ms: self.clock.now_millis(),
        };
        self.entries.write().insert(key.to_string(), entry);

        if let Err(e) = self.persist().await {
            warn!(%key, error = %e, "Failed to persist geocoding cache");
        }
    }

    async fn persist(&self) -> Result<(), GeocodingError> {
        let blob = {
            let entries = self.entries.read();
            serde_json::to_string(&*entries).map_err(|e| GeocodingError::Storage(e.to_string()))?
        };
        self.store.set_item(&self.storage_key, &blob).await?;
        Ok(())
    }

    /// Wipe memory and the persisted blob
    ///
    /// Memory is always cleared; a store failure is returned afterwards.
    pub async fn clear(&self) -> Result<(), GeocodingError> {
        self.entries.write().clear();
        self.store.remove_item(&self.storage_key).await?;
        debug!("Geocoding cache cleared");
        Ok(())
    }

    /// Number of entries in memory
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of size, keys and hit counters
    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        CacheStats {
            entries: keys.len(),
            keys,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
