//! Nominatim geocoding client
//!
//! Forward search, place details and reverse geocoding against the
//! [Nominatim](https://nominatim.openstreetmap.org) API (OpenStreetMap),
//! fronted by a persistent write-through cache and a bounded retry loop.
//!
//! Each operation fails in its own way once retries are spent:
//! - search returns an empty list
//! - place details returns the error
//! - reverse geocoding returns a stale cached address, or a synthesized one

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{GeoLocation, LocationSuggestion, PlaceDetail};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, CachePayload, CacheStats, Clock, GeocodeCache, SystemClock};
use crate::config::NominatimConfig;
use crate::error::GeocodingError;
use crate::fallback::fallback_address;
use crate::models::NominatimPlace;
use crate::retry::{RetryState, with_retry};
use crate::search_gate::{Debouncer, SearchGate};
use crate::store::KeyValueStore;

/// Name of the debounce timer used by [`NominatimGeocodingClient::debounced_search`]
const SEARCH_TIMER: &str = "address_predictions";

/// Trait for geocoding clients
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    /// Load the persisted cache; returns the number of entries restored
    async fn initialize_cache(&self) -> usize;

    /// Search-as-you-type address lookup
    ///
    /// Never fails: short queries, exhausted retries and superseded
    /// requests all yield an empty list.
    async fn search_address(&self, query: &str) -> Vec<LocationSuggestion>;

    /// Resolve a suggestion id into coordinates and a formatted address
    async fn place_details(&self, place_id: &str) -> Result<PlaceDetail, GeocodingError>;

    /// Convert coordinates to a human-readable address
    ///
    /// Never fails: falls back to a stale cache entry or a synthesized label.
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> String;

    /// Wipe the in-memory and persisted cache
    async fn clear_cache(&self) -> Result<(), GeocodingError>;

    /// Abort the outstanding search request, if any
    fn cancel_pending_search(&self);
}

/// Nominatim-based geocoding client with caching, retries and cancellation
pub struct NominatimGeocodingClient {
    client: Client,
    config: NominatimConfig,
    cache: GeocodeCache,
    search_gate: SearchGate,
    debouncer: Debouncer,
    reachable: AtomicBool,
}

impl std::fmt::Debug for NominatimGeocodingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NominatimGeocodingClient")
            .field("base_url", &self.config.base_url)
            .field("cache", &self.cache)
            .field("search_in_flight", &self.search_gate.in_flight())
            .field("reachable", &self.reachable.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl NominatimGeocodingClient {
    /// Create a new Nominatim geocoding client
    ///
    /// The cache starts empty; call
    /// [`initialize_cache`](GeocodingClient::initialize_cache) to restore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be initialized.
    pub fn new(
        config: &NominatimConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, GeocodingError> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Create a client whose cache ages entries with the given clock
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_clock(
        config: &NominatimConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GeocodingError> {
        config.validate().map_err(GeocodingError::Configuration)?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeocodingError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
            cache: GeocodeCache::new(store, config.storage_key.clone(), clock),
            search_gate: SearchGate::new(),
            debouncer: Debouncer::new(),
            reachable: AtomicBool::new(true),
        })
    }

    /// Search after a quiet period, superseding earlier debounced calls
    ///
    /// Only the last call within the debounce window reaches the network;
    /// earlier ones resolve to an empty list.
    pub async fn debounced_search(&self, query: &str) -> Vec<LocationSuggestion> {
        if !self
            .debouncer
            .settle(SEARCH_TIMER, self.config.debounce())
            .await
        {
            return Vec::new();
        }
        self.search_address(query).await
    }

    /// Cache size, keys and hit counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether the last finished request reached the service
    pub fn is_network_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Whether a search request is outstanding
    pub fn is_search_in_progress(&self) -> bool {
        self.search_gate.in_flight()
    }

    /// Active configuration
    pub const fn config(&self) -> &NominatimConfig {
        &self.config
    }

    fn record_success(&self) {
        self.reachable.store(true, Ordering::Relaxed);
    }

    fn record_failure(&self, err: &GeocodingError) {
        self.reachable.store(!err.is_transport(), Ordering::Relaxed);
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> GeocodingError {
        if err.is_timeout() {
            GeocodingError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            GeocodingError::ConnectionFailed(err.to_string())
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GeocodingError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(GeocodingError::from_status(
                status.as_u16(),
                retry_after_secs,
            ));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                self.map_transport_error(&e)
            } else {
                GeocodingError::ParseError(e.to_string())
            }
        })
    }

    async fn fetch_search(
        &self,
        query: &str,
        cancel: &CancellationToken,
        state: RetryState,
    ) -> Result<Vec<LocationSuggestion>, GeocodingError> {
        debug!(
            %query,
            attempt = state.attempt,
            max_attempts = state.max_attempts,
            "Searching address"
        );

        let url = format!("{}/search", self.config.base_url);
        let mut params = vec![
            ("q", query.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
            ("limit", self.config.result_limit.to_string()),
            ("accept-language", self.config.accept_language.clone()),
        ];
        if !self.config.country_codes.is_empty() {
            params.push(("countrycodes", self.config.country_codes.clone()));
        }

        let request = self.client.get(&url).query(&params);
        let records: Vec<NominatimPlace> = tokio::select! {
            () = cancel.cancelled() => return Err(GeocodingError::Cancelled),
            result = self.send_json(request) => result?,
        };

        Ok(records
            .into_iter()
            .filter_map(NominatimPlace::into_suggestion)
            .collect())
    }

    async fn fetch_details(
        &self,
        place_id: &str,
        state: RetryState,
    ) -> Result<PlaceDetail, GeocodingError> {
        debug!(
            %place_id,
            attempt = state.attempt,
            max_attempts = state.max_attempts,
            "Fetching place details"
        );

        let url = format!("{}/details", self.config.base_url);
        let params = [
            ("osm_id", place_id.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
            ("accept-language", self.config.accept_language.clone()),
        ];

        let record: NominatimPlace = self.send_json(self.client.get(&url).query(&params)).await?;
        record.into_place(place_id)
    }

    async fn fetch_reverse(
        &self,
        location: GeoLocation,
        state: RetryState,
    ) -> Result<PlaceDetail, GeocodingError> {
        debug!(
            %location,
            attempt = state.attempt,
            max_attempts = state.max_attempts,
            "Reverse geocoding"
        );

        let url = format!("{}/reverse", self.config.base_url);
        let params = [
            ("lat", location.latitude().to_string()),
            ("lon", location.longitude().to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
            ("zoom", "18".to_string()),
            ("accept-language", self.config.accept_language.clone()),
        ];

        let record: NominatimPlace = self.send_json(self.client.get(&url).query(&params)).await?;
        record.into_reverse_place(location)
    }
}

#[async_trait]
impl GeocodingClient for NominatimGeocodingClient {
    async fn initialize_cache(&self) -> usize {
        let loaded = self.cache.load().await;
        info!(entries = loaded, "Geocoding cache initialized");
        loaded
    }

    #[instrument(skip(self))]
    async fn search_address(&self, query: &str) -> Vec<LocationSuggestion> {
        let query = query.trim();
        if query.chars().count() < self.config.min_query_chars {
            return Vec::new();
        }

        let key = CacheKey::search(query);
        if let Some(CachePayload::Suggestions(cached)) =
            self.cache.get_fresh(&key, self.config.search_ttl())
        {
            debug!(%query, "Search cache hit");
            return cached;
        }

        let ticket = self.search_gate.begin();
        let token = ticket.token();
        let outcome = with_retry(&self.config.retry, token, |state| {
            self.fetch_search(query, token, state)
        })
        .await;
        self.search_gate.finish(&ticket);

        match outcome.result {
            Ok(_) if !self.search_gate.is_current(&ticket) => {
                debug!(%query, "Discarding superseded search response");
                Vec::new()
            },
            Ok(suggestions) => {
                self.record_success();
                debug!(%query, results = suggestions.len(), "Search completed");
                self.cache
                    .insert(&key, CachePayload::Suggestions(suggestions.clone()))
                    .await;
                suggestions
            },
            Err(e) if e.is_cancellation() => {
                debug!(%query, "Search cancelled");
                Vec::new()
            },
            Err(e) => {
                self.record_failure(&e);
                warn!(
                    %query,
                    attempts = outcome.attempts,
                    error = %e,
                    "Address search failed, returning no results"
                );
                Vec::new()
            },
        }
    }

    #[instrument(skip(self))]
    async fn place_details(&self, place_id: &str) -> Result<PlaceDetail, GeocodingError> {
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(GeocodingError::NotFound(
                "Place id must not be empty".to_string(),
            ));
        }

        let key = CacheKey::details(place_id);
        if let Some(CachePayload::Place(cached)) =
            self.cache.get_fresh(&key, self.config.search_ttl())
        {
            debug!(%place_id, "Place details cache hit");
            return Ok(cached);
        }

        // Details lookups follow a discrete tap and are never superseded
        let never = CancellationToken::new();
        let outcome = with_retry(&self.config.retry, &never, |state| {
            self.fetch_details(place_id, state)
        })
        .await;

        match outcome.result {
            Ok(place) => {
                self.record_success();
                debug!(%place_id, address = %place.formatted_address, "Place details resolved");
                self.cache
                    .insert(&key, CachePayload::Place(place.clone()))
                    .await;
                Ok(place)
            },
            Err(e) => {
                self.record_failure(&e);
                warn!(
                    %place_id,
                    attempts = outcome.attempts,
                    error = %e,
                    "Place details lookup failed"
                );
                Err(e)
            },
        }
    }

    #[instrument(skip(self))]
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> String {
        let Ok(location) = GeoLocation::new(latitude, longitude) else {
            warn!(%latitude, %longitude, "Coordinates out of range, using fallback address");
            return fallback_address(latitude, longitude);
        };

        let key = CacheKey::reverse(latitude, longitude);
        if let Some(CachePayload::Place(cached)) =
            self.cache.get_fresh(&key, self.config.reverse_ttl())
        {
            debug!(%key, "Reverse geocode cache hit");
            return cached.formatted_address;
        }

        let never = CancellationToken::new();
        let outcome = with_retry(&self.config.retry, &never, |state| {
            self.fetch_reverse(location, state)
        })
        .await;

        match outcome.result {
            Ok(place) => {
                self.record_success();
                let address = place.formatted_address.clone();
                self.cache.insert(&key, CachePayload::Place(place)).await;
                address
            },
            Err(e) => {
                self.record_failure(&e);
                warn!(
                    %key,
                    attempts = outcome.attempts,
                    error = %e,
                    "Reverse geocoding failed"
                );

                if let Some(CachePayload::Place(stale)) = self.cache.get_any(&key) {
                    debug!(%key, "Using stale cached address");
                    return stale.formatted_address;
                }

                let fallback = fallback_address(latitude, longitude);
                debug!(%fallback, "Using synthesized address");
                fallback
            },
        }
    }

    async fn clear_cache(&self) -> Result<(), GeocodingError> {
        let result = self.cache.clear().await;
        match &result {
            Ok(()) => info!("Geocoding cache cleared"),
            Err(e) => warn!(error = %e, "Geocoding cache cleared in memory only"),
        }
        result
    }

    fn cancel_pending_search(&self) {
        if self.search_gate.cancel() {
            debug!("Pending search cancelled");
        }
    }
}
