//! Source table metadata: column descriptors, type codes and names.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ExportError, Result};

/// Column type code reported by the source schema.
///
/// `Unsupported` carries the native type name of anything outside the
/// enumerated scalar and geometry kinds (blobs, rasters, GUIDs, ...). Such
/// columns are read by the cursor but never exported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Date,
    Text { max_len: u32 },
    Geometry,
    Unsupported(String),
}

impl SourceType {
    /// Whether this is the shape column type.
    pub fn is_geometry(&self) -> bool {
        matches!(self, SourceType::Geometry)
    }

    /// Declared size, meaningful only for text columns.
    pub fn size(&self) -> u32 {
        match self {
            SourceType::Text { max_len } => *max_len,
            _ => 0,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Int16 => f.write_str("int16"),
            SourceType::Int32 => f.write_str("int32"),
            SourceType::Int64 => f.write_str("int64"),
            SourceType::Float32 => f.write_str("float32"),
            SourceType::Float64 => f.write_str("float64"),
            SourceType::Date => f.write_str("date"),
            SourceType::Text { max_len } => write!(f, "string({})", max_len),
            SourceType::Geometry => f.write_str("geometry"),
            SourceType::Unsupported(name) => write!(f, "unsupported({})", name),
        }
    }
}

/// Column metadata as described by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Type code.
    pub source_type: SourceType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
        }
    }
}

/// A source table name, optionally qualified as `owner.table` or `db.owner.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    /// Database part of a three-part name.
    pub database: Option<String>,

    /// Owner (schema) of the table.
    pub owner: String,

    /// Unqualified table (feature class) name.
    pub name: String,
}

impl QualifiedName {
    /// Parse a source table name, falling back to `default_owner` for bare names.
    pub fn parse(input: &str, default_owner: &str) -> Result<Self> {
        let parts: Vec<&str> = input.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ExportError::Config(format!(
                "invalid source table name '{}'",
                input
            )));
        }

        match parts.as_slice() {
            [name] => Ok(Self {
                database: None,
                owner: default_owner.to_string(),
                name: name.to_string(),
            }),
            [owner, name] => Ok(Self {
                database: None,
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            [database, owner, name] => Ok(Self {
                database: Some(database.to_string()),
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(ExportError::Config(format!(
                "source table name '{}' has more than three parts",
                input
            ))),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref db) = self.database {
            write!(f, "{}.", db)?;
        }
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// Shape kind of a spatial layer, used to pick a specific geometry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Point,
    Line,
    SimpleLine,
    Polygon,
    MultiPoint,
    MultiLine,
    MultiSimpleLine,
    MultiPolygon,
    /// Mixed, empty or unrecognized layers.
    Unknown,
}

impl ShapeKind {
    /// WKT geometry type name registered for this kind.
    pub fn wkt_type(self) -> &'static str {
        match self {
            ShapeKind::Point => "POINT",
            ShapeKind::Line | ShapeKind::SimpleLine => "LINESTRING",
            ShapeKind::Polygon => "POLYGON",
            ShapeKind::MultiPoint => "MULTIPOINT",
            ShapeKind::MultiLine | ShapeKind::MultiSimpleLine => "MULTILINESTRING",
            ShapeKind::MultiPolygon => "MULTIPOLYGON",
            ShapeKind::Unknown => GENERIC_GEOMETRY_TYPE,
        }
    }
}

/// Spatial type used when the shape kind is not refined.
pub const GENERIC_GEOMETRY_TYPE: &str = "GEOMETRY";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name_uses_default_owner() {
        let name = QualifiedName::parse("ROADS", "dbo").unwrap();
        assert_eq!(name.owner, "dbo");
        assert_eq!(name.name, "ROADS");
        assert_eq!(name.to_string(), "dbo.ROADS");
    }

    #[test]
    fn test_parse_two_and_three_part_names() {
        let name = QualifiedName::parse("sde.ROADS", "dbo").unwrap();
        assert_eq!(name.owner, "sde");
        assert_eq!(name.database, None);

        let name = QualifiedName::parse("gis.sde.ROADS", "dbo").unwrap();
        assert_eq!(name.database.as_deref(), Some("gis"));
        assert_eq!(name.to_string(), "gis.sde.ROADS");
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(QualifiedName::parse("sde..ROADS", "dbo").is_err());
        assert!(QualifiedName::parse("", "dbo").is_err());
        assert!(QualifiedName::parse("a.b.c.d", "dbo").is_err());
    }

    #[test]
    fn test_shape_kind_wkt_types() {
        assert_eq!(ShapeKind::Point.wkt_type(), "POINT");
        assert_eq!(ShapeKind::SimpleLine.wkt_type(), "LINESTRING");
        assert_eq!(ShapeKind::MultiPoint.wkt_type(), "MULTIPOINT");
        assert_eq!(ShapeKind::MultiSimpleLine.wkt_type(), "MULTILINESTRING");
        assert_eq!(ShapeKind::Unknown.wkt_type(), "GEOMETRY");
    }

    #[test]
    fn test_text_size() {
        assert_eq!(SourceType::Text { max_len: 50 }.size(), 50);
        assert_eq!(SourceType::Int32.size(), 0);
        assert_eq!(SourceType::Text { max_len: 50 }.to_string(), "string(50)");
    }
}
