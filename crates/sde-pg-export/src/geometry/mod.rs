//! Geometry codec: WKB decoding and EWKB encoding for PostGIS.
//!
//! Parsing and serialization go through the `wkb` crate; `geo-traits` bridges
//! its zero-copy reader to owned `geo-types` values.

mod decode;
mod encode;

pub use decode::{read_wkb, DecodedGeometry};
pub use encode::{write_wkb, SpatialValue};
