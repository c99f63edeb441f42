//! Address search suggestion entity

use serde::{Deserialize, Serialize};

use crate::value_objects::GeoLocation;

/// A single candidate returned by a search-as-you-type address lookup
///
/// Suggestions may arrive without coordinates; callers resolve them into a
/// [`PlaceDetail`](super::PlaceDetail) once the user picks one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSuggestion {
    /// Provider-side identifier, used for the details lookup
    pub id: String,
    /// Full human-readable address
    pub description: String,
    /// Short headline (street, landmark or place name)
    pub primary_label: String,
    /// Locality context shown under the headline
    pub secondary_label: Option<String>,
    /// Coordinates, when the provider returned usable ones
    pub location: Option<GeoLocation>,
    /// Provider category such as `residential` or `restaurant`
    pub category: Option<String>,
}

impl LocationSuggestion {
    /// Build a suggestion, deriving both labels from the display name
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        name: Option<&str>,
        location: Option<GeoLocation>,
        category: Option<String>,
    ) -> Self {
        let description = description.into();
        let primary_label = primary_label(&description, name);
        let secondary_label = secondary_label(&description);

        Self {
            id: id.into(),
            description,
            primary_label,
            secondary_label,
            location,
            category,
        }
    }

    /// Whether the suggestion can be placed on a map without a details lookup
    #[must_use]
    pub const fn has_coordinates(&self) -> bool {
        self.location.is_some()
    }
}

/// Headline for a display name: the dedicated name if present, otherwise the
/// first comma-separated segment.
#[must_use]
pub fn primary_label(display_name: &str, name: Option<&str>) -> String {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    display_name
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(display_name)
        .to_string()
}

/// The two segments after the headline, joined with `", "`
///
/// Returns `None` for single-segment names.
#[must_use]
pub fn secondary_label(display_name: &str) -> Option<String> {
    let parts: Vec<&str> = display_name.split(',').collect();
    if parts.len() < 2 {
        return None;
    }

    Some(
        parts
            .iter()
            .skip(1)
            .take(2)
            .map(|part| part.trim())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY: &str = "Ring Road, Oba Market, Benin City, Edo State, Nigeria";

    #[test]
    fn primary_label_prefers_name() {
        assert_eq!(primary_label(DISPLAY, Some("Oba Market")), "Oba Market");
    }

    #[test]
    fn primary_label_ignores_blank_name() {
        assert_eq!(primary_label(DISPLAY, Some("  ")), "Ring Road");
    }

    #[test]
    fn primary_label_falls_back_to_first_segment() {
        assert_eq!(primary_label(DISPLAY, None), "Ring Road");
    }

    #[test]
    fn primary_label_of_leading_comma_is_whole_name() {
        assert_eq!(primary_label(", Lagos", None), ", Lagos");
    }

    #[test]
    fn secondary_label_takes_next_two_segments() {
        assert_eq!(
            secondary_label(DISPLAY).as_deref(),
            Some("Oba Market, Benin City")
        );
    }

    #[test]
    fn secondary_label_with_two_segments() {
        assert_eq!(secondary_label("Ikeja, Lagos").as_deref(), Some("Lagos"));
    }

    #[test]
    fn secondary_label_absent_for_single_segment() {
        assert!(secondary_label("Nigeria").is_none());
    }

    #[test]
    fn new_derives_labels() {
        let suggestion = LocationSuggestion::new(
            "123",
            DISPLAY,
            None,
            GeoLocation::new(6.33, 5.62).ok(),
            Some("road".to_string()),
        );
        assert_eq!(suggestion.primary_label, "Ring Road");
        assert_eq!(
            suggestion.secondary_label.as_deref(),
            Some("Oba Market, Benin City")
        );
        assert!(suggestion.has_coordinates());
    }

    #[test]
    fn serialization_roundtrip() {
        let suggestion = LocationSuggestion::new("9", "Lagos, Nigeria", None, None, None);
        let json = serde_json::to_string(&suggestion).expect("serialize");
        let back: LocationSuggestion = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(suggestion, back);
    }
}
