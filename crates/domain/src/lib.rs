//! Domain layer for the geocoder
//!
//! Contains the location entities, value objects, and domain errors shared by
//! the geocoding integration and its hosts. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
