//! Schema translation: source column descriptors to a destination table layout.
//!
//! The resulting [`TableLayout`] is built once per export and shared read-only
//! by every row conversion. Destination parameter positions are dense and
//! 0-based; the geometry column always takes the last position.

use tracing::{debug, warn};

use crate::core::identifier::quote_pg;
use crate::core::{ColumnDescriptor, SourceType};
use crate::error::{ExportError, Result};
use crate::typemap::postgres_type;

/// A scalar destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationColumn {
    pub name: String,
    pub pg_type: String,
}

impl DestinationColumn {
    /// Column definition for DDL, e.g. `"name" character varying(50)`.
    pub fn definition(&self) -> Result<String> {
        Ok(format!("{} {}", quote_pg(&self.name)?, self.pg_type))
    }
}

/// Destination layout of one source table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    columns: Vec<DestinationColumn>,
    position_map: Vec<usize>,
    type_cache: Vec<SourceType>,
    geometry_column: String,
}

impl TableLayout {
    /// Scalar destination columns, in destination order. Excludes geometry.
    pub fn columns(&self) -> &[DestinationColumn] {
        &self.columns
    }

    /// Destination position to source position, geometry last.
    pub fn position_map(&self) -> &[usize] {
        &self.position_map
    }

    /// Source type of every source column, indexed by source position.
    pub fn type_cache(&self) -> &[SourceType] {
        &self.type_cache
    }

    /// Number of insert parameters: scalar columns plus the geometry column.
    pub fn param_count(&self) -> usize {
        self.columns.len() + 1
    }

    /// Source position of the geometry column.
    pub fn geometry_source_position(&self) -> usize {
        self.position_map[self.columns.len()]
    }

    /// Destination position of the geometry column.
    pub fn geometry_position(&self) -> usize {
        self.columns.len()
    }

    /// Name of the source geometry column.
    pub fn geometry_column(&self) -> &str {
        &self.geometry_column
    }

    /// Source position feeding a destination position.
    pub fn source_position(&self, dest_pos: usize) -> Option<usize> {
        self.position_map.get(dest_pos).copied()
    }

    /// Source type at a source position.
    pub fn source_type(&self, source_pos: usize) -> Option<&SourceType> {
        self.type_cache.get(source_pos)
    }

    /// Name of the destination column at a destination position.
    pub fn column_name(&self, dest_pos: usize) -> &str {
        self.columns
            .get(dest_pos)
            .map(|c| c.name.as_str())
            .unwrap_or("geom")
    }
}

/// Translate the source columns of one table into a destination layout.
///
/// Columns with unmapped types are skipped. A table without a geometry column
/// is a configuration error; with several, the last one is used.
pub fn translate(source_columns: &[ColumnDescriptor]) -> Result<TableLayout> {
    let mut columns = Vec::with_capacity(source_columns.len());
    let mut position_map = Vec::with_capacity(source_columns.len() + 1);
    let mut type_cache = Vec::with_capacity(source_columns.len());
    let mut geometry: Option<(usize, &str)> = None;

    for (source_pos, col) in source_columns.iter().enumerate() {
        type_cache.push(col.source_type.clone());

        if col.source_type.is_geometry() {
            if let Some((_, previous)) = geometry {
                warn!(
                    "Multiple geometry columns: using {} instead of {}",
                    col.name, previous
                );
            }
            geometry = Some((source_pos, col.name.as_str()));
            continue;
        }

        match postgres_type(&col.source_type) {
            Some(pg_type) => {
                position_map.push(source_pos);
                columns.push(DestinationColumn {
                    name: col.name.clone(),
                    pg_type,
                });
            }
            None => debug!("Skipping column {} ({})", col.name, col.source_type),
        }
    }

    let (geometry_pos, geometry_name) = geometry.ok_or_else(|| {
        ExportError::Config("source table has no geometry column".to_string())
    })?;
    position_map.push(geometry_pos);

    Ok(TableLayout {
        columns,
        position_map,
        type_cache,
        geometry_column: geometry_name.to_string(),
    })
}
