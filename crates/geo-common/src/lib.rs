//! Common geometry types shared across the bbox load harness.

pub mod bbox;

pub use bbox::{BboxParseError, BoundingBox};
