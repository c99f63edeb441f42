//! Address geocoding integration
//!
//! Provides address autocomplete, place resolution and reverse geocoding via
//! [Nominatim/OpenStreetMap](https://nominatim.openstreetmap.org), tuned for
//! a form where the user types an address and picks a suggestion.
//!
//! # Architecture
//!
//! The crate follows a client-trait pattern. [`GeocodingClient`] defines the
//! interface, implemented by [`NominatimGeocodingClient`]. Responses are kept
//! in a [`GeocodeCache`] that writes through to an injected
//! [`KeyValueStore`], so results survive restarts. Requests are retried with
//! exponential backoff ([`RetryConfig`]), and a newer search cancels the one
//! still in flight ([`SearchGate`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use integration_geocoding::{FileStore, GeocodingClient, NominatimConfig, NominatimGeocodingClient};
//!
//! let config = NominatimConfig::default();
//! let store = Arc::new(FileStore::new("./data"));
//! let client = NominatimGeocodingClient::new(&config, store)?;
//! client.initialize_cache().await;
//!
//! let suggestions = client.search_address("Ring Road, Benin").await;
//! if let Some(first) = suggestions.first() {
//!     let place = client.place_details(&first.id).await?;
//!     println!("{place}");
//! }
//!
//! let address = client.reverse_geocode(6.3350, 5.6037).await;
//! ```

mod cache;
mod client;
mod config;
mod error;
mod fallback;
mod models;
pub mod retry;
mod search_gate;
mod store;

pub use cache::{
    CacheEntry, CacheKey, CachePayload, CacheStats, Clock, GeocodeCache, ManualClock, SystemClock,
};
pub use client::{GeocodingClient, NominatimGeocodingClient};
pub use config::NominatimConfig;
pub use error::GeocodingError;
pub use fallback::{DEFAULT_REGION, KNOWN_REGIONS, Region, fallback_address, region_name};
pub use retry::{RetryConfig, RetryOutcome, RetryState, with_retry};
pub use search_gate::{Debouncer, SearchGate, SearchTicket};
pub use store::{FileStore, InMemoryStore, KeyValueStore, StorageError, is_valid_key};
