//! Domain entities - Objects with identity and lifecycle

mod location_suggestion;
mod place_detail;

pub use location_suggestion::{LocationSuggestion, primary_label, secondary_label};
pub use place_detail::PlaceDetail;
