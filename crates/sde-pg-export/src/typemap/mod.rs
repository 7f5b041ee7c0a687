//! Type mapping between source column types and PostgreSQL.

use crate::core::SourceType;

/// Map a source column type to a PostgreSQL column type.
///
/// Geometry is not mapped here: the spatial column is always appended as the
/// trailing `geom` column by the provisioner. Unsupported types return `None`
/// and produce no destination column.
pub fn postgres_type(source_type: &SourceType) -> Option<String> {
    match source_type {
        SourceType::Int16 => Some("smallint".to_string()),
        SourceType::Int32 => Some("integer".to_string()),
        SourceType::Int64 => Some("bigint".to_string()),
        SourceType::Float32 => Some("real".to_string()),
        SourceType::Float64 => Some("double precision".to_string()),
        SourceType::Date => Some("timestamp".to_string()),
        SourceType::Text { max_len } => Some(format!("character varying({})", max_len)),
        SourceType::Geometry | SourceType::Unsupported(_) => None,
    }
}

/// Map an MSSQL data type (as reported by `INFORMATION_SCHEMA.COLUMNS`) to a source type.
///
/// `max_length` is `CHARACTER_MAXIMUM_LENGTH`; `-1` marks a `(max)` column,
/// which has no declared size and is left unmapped.
pub fn mssql_to_source(data_type: &str, max_length: i32) -> SourceType {
    match data_type.to_lowercase().as_str() {
        "tinyint" | "smallint" => SourceType::Int16,
        "int" => SourceType::Int32,
        "bigint" => SourceType::Int64,
        "real" => SourceType::Float32,
        "float" => SourceType::Float64,
        "date" | "datetime" | "datetime2" | "smalldatetime" => SourceType::Date,
        "char" | "varchar" | "nchar" | "nvarchar" if max_length > 0 => SourceType::Text {
            max_len: max_length as u32,
        },
        "geometry" | "geography" => SourceType::Geometry,
        other => SourceType::Unsupported(other.to_string()),
    }
}
