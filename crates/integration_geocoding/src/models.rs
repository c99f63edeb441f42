//! Nominatim response models and their mapping onto domain types

use domain::{GeoLocation, LocationSuggestion, PlaceDetail};
use serde::Deserialize;

use crate::error::GeocodingError;

/// A coordinate that Nominatim sends either as a string or as a number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Coordinate {
    Text(String),
    Number(f64),
}

impl Coordinate {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Text(text) => text.trim().parse().ok(),
            Self::Number(n) => Some(*n),
        }
    }
}

/// GeoJSON point as returned by the details endpoint (`[lon, lat]`)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Centroid {
    #[serde(default)]
    coordinates: Vec<f64>,
}

/// Raw place record from `/search`, `/reverse` or `/details`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NominatimPlace {
    #[serde(default)]
    pub osm_id: Option<u64>,
    #[serde(default)]
    pub place_id: Option<u64>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub localname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<Coordinate>,
    #[serde(default)]
    pub lon: Option<Coordinate>,
    #[serde(default)]
    pub centroid: Option<Centroid>,
    #[serde(default, rename = "type")]
    pub category: Option<String>,
    /// Set by `/reverse` when nothing is near the point
    #[serde(default)]
    pub error: Option<String>,
}

impl NominatimPlace {
    /// Provider id: the OSM id, falling back to Nominatim's place id
    pub fn id(&self) -> Option<String> {
        self.osm_id.or(self.place_id).map(|id| id.to_string())
    }

    /// Coordinates from `lat`/`lon`, or from the GeoJSON centroid
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let direct = self
            .lat
            .as_ref()
            .and_then(Coordinate::value)
            .zip(self.lon.as_ref().and_then(Coordinate::value));

        direct.or_else(|| {
            let centroid = self.centroid.as_ref()?;
            match centroid.coordinates.as_slice() {
                [lon, lat, ..] => Some((*lat, *lon)),
                _ => None,
            }
        })
    }

    /// Validated location, if the record carries usable coordinates
    pub fn location(&self) -> Option<GeoLocation> {
        self.coordinates()
            .and_then(|(lat, lon)| GeoLocation::new(lat, lon).ok())
    }

    /// Best human-readable address
    pub fn address(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.localname.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Map a search hit; records without an id or address are skipped
    pub fn into_suggestion(self) -> Option<LocationSuggestion> {
        let id = self.id()?;
        let description = self.address()?.to_string();
        let location = self.location();
        Some(LocationSuggestion::new(
            id,
            description,
            self.name.as_deref(),
            location,
            self.category,
        ))
    }

    /// Map a details or reverse record into a resolved place
    ///
    /// `fallback_id` is used when the record carries no id of its own.
    pub fn into_place(self, fallback_id: &str) -> Result<PlaceDetail, GeocodingError> {
        if let Some(error) = self.error.as_deref() {
            return Err(GeocodingError::NotFound(error.to_string()));
        }

        let address = self
            .address()
            .ok_or_else(|| GeocodingError::NotFound(format!("no address for {fallback_id}")))?
            .to_string();
        let (lat, lon) = self
            .coordinates()
            .ok_or_else(|| GeocodingError::ParseError("missing coordinates".to_string()))?;
        let id = self.id().unwrap_or_else(|| fallback_id.to_string());

        PlaceDetail::from_coordinates(id, address, lat, lon)
            .map_err(|e| GeocodingError::ParseError(e.to_string()))
    }

    /// Map a reverse lookup, pinning the place to the queried point
    pub fn into_reverse_place(self, queried: GeoLocation) -> Result<PlaceDetail, GeocodingError> {
        if let Some(error) = self.error.as_deref() {
            return Err(GeocodingError::NotFound(error.to_string()));
        }

        let address = self
            .address()
            .ok_or_else(|| GeocodingError::NotFound(format!("no address at {queried}")))?
            .to_string();
        Ok(PlaceDetail::new(
            self.id().unwrap_or_default(),
            address,
            queried,
        ))
    }
}
