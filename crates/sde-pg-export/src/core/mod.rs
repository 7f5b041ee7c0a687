//! Core abstractions shared by every pipeline stage.
//!
//! - [`schema`]: source column descriptors, type codes and table names
//! - [`value`]: source row values and destination bind values
//! - [`traits`]: source, sink and connection factory traits
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    ColumnDescriptor, QualifiedName, ShapeKind, SourceType, GENERIC_GEOMETRY_TYPE,
};
pub use traits::{ConnectionFactory, DestinationSink, FeatureSource, InsertStatement};
pub use value::{SourceRow, SourceValue, SqlValue};
