//! Resolved place entity

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{errors::DomainError, value_objects::GeoLocation};

/// A fully resolved location: coordinates plus a formatted address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetail {
    /// Provider-side identifier (may be empty for reverse lookups)
    pub id: String,
    /// Human-readable address
    pub formatted_address: String,
    /// Coordinates of the place
    pub location: GeoLocation,
}

impl PlaceDetail {
    /// Create a new place detail
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        formatted_address: impl Into<String>,
        location: GeoLocation,
    ) -> Self {
        Self {
            id: id.into(),
            formatted_address: formatted_address.into(),
            location,
        }
    }

    /// Create a place detail from raw coordinates, validating them
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidCoordinates` if either value is out of range.
    pub fn from_coordinates(
        id: impl Into<String>,
        formatted_address: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, DomainError> {
        let location = GeoLocation::new(latitude, longitude)
            .map_err(|_| DomainError::invalid_coordinates(latitude, longitude))?;
        Ok(Self::new(id, formatted_address, location))
    }
}

impl fmt::Display for PlaceDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.formatted_address, self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_address_and_coordinates() {
        let place = PlaceDetail::new("42", "Ikeja, Lagos, Nigeria", GeoLocation::lagos());
        let text = place.to_string();
        assert!(text.contains("Ikeja"));
        assert!(text.contains("6.524400"));
    }

    #[test]
    fn from_coordinates_validates() {
        assert!(PlaceDetail::from_coordinates("1", "Benin City", 6.33, 5.6).is_ok());
        let err = PlaceDetail::from_coordinates("1", "Nowhere", 120.0, 5.6).unwrap_err();
        assert!(matches!(err, DomainError::InvalidCoordinates { .. }));
    }

    #[test]
    fn serialization_roundtrip() {
        let place = PlaceDetail::new("42", "Wuse, Abuja", GeoLocation::abuja());
        let json = serde_json::to_string(&place).expect("serialize");
        let back: PlaceDetail = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(place, back);
    }
}
