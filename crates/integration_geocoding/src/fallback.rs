//! Offline address synthesis
//!
//! When reverse geocoding fails and nothing is cached, the client still has
//! to hand back something readable. The coordinates are labelled with the
//! city whose box contains them, or with the country otherwise.

use domain::BoundingBox;

/// A named region with its bounding box
#[derive(Debug, Clone, Copy)]
pub struct Region {
    /// Label shown in the fallback string
    pub label: &'static str,
    /// Area covered by the region
    pub bounds: BoundingBox,
}

/// Known city boxes, checked in order
pub const KNOWN_REGIONS: &[Region] = &[
    Region {
        label: "Benin City, Nigeria",
        bounds: BoundingBox::new(6.2, 6.4, 5.5, 5.7),
    },
    Region {
        label: "Lagos, Nigeria",
        bounds: BoundingBox::new(6.4, 6.6, 3.3, 3.5),
    },
    Region {
        label: "Abuja, Nigeria",
        bounds: BoundingBox::new(8.8, 9.2, 7.3, 7.5),
    },
];

/// Label used outside every known region
pub const DEFAULT_REGION: &str = "Nigeria";

/// Label of the first region containing the point
#[must_use]
pub fn region_name(latitude: f64, longitude: f64) -> &'static str {
    KNOWN_REGIONS
        .iter()
        .find(|region| region.bounds.contains(latitude, longitude))
        .map_or(DEFAULT_REGION, |region| region.label)
}

/// `"<lat>, <lon> (<region>)"` with four decimals
#[must_use]
pub fn fallback_address(latitude: f64, longitude: f64) -> String {
    format!(
        "{latitude:.4}, {longitude:.4} ({})",
        region_name(latitude, longitude)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benin_city() {
        assert_eq!(
            fallback_address(6.33, 5.60),
            "6.3300, 5.6000 (Benin City, Nigeria)"
        );
    }

    #[test]
    fn lagos() {
        assert_eq!(region_name(6.5244, 3.3792), "Lagos, Nigeria");
    }

    #[test]
    fn abuja() {
        assert_eq!(region_name(9.0765, 7.3986), "Abuja, Nigeria");
    }

    #[test]
    fn shared_edge_resolves_to_first_region() {
        // 6.4 is the top of Benin City's box and the bottom of Lagos's,
        // but the longitudes differ so only one matches
        assert_eq!(region_name(6.4, 5.6), "Benin City, Nigeria");
        assert_eq!(region_name(6.4, 3.4), "Lagos, Nigeria");
    }

    #[test]
    fn outside_known_regions() {
        assert_eq!(
            fallback_address(12.0, 8.5),
            "12.0000, 8.5000 (Nigeria)"
        );
    }

    #[test]
    fn never_empty_for_odd_input() {
        assert!(!fallback_address(f64::NAN, 0.0).is_empty());
        assert!(!fallback_address(-89.9999, 179.9999).is_empty());
    }
}
