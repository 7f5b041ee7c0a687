//! Destination table provisioning: CREATE TABLE and spatial column registration.

use std::fmt;

use tracing::{debug, info};

use crate::config::SpatialTypeStrategy;
use crate::core::identifier::{quote_literal, validate_bare_identifier, validate_identifier};
use crate::core::{DestinationSink, ShapeKind, GENERIC_GEOMETRY_TYPE};
use crate::error::Result;
use crate::translator::TableLayout;

/// Name of the registered spatial column.
pub const GEOMETRY_COLUMN: &str = "geom";

/// Coordinate dimension of the registered spatial column.
pub const GEOMETRY_DIMENSION: u32 = 2;

/// A destination table: unquoted schema and double-quoted table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTable {
    pub schema: String,
    pub name: String,
}

impl DestinationTable {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let name = name.into();
        validate_bare_identifier(&schema)?;
        validate_identifier(&name)?;
        Ok(Self { schema, name })
    }

    /// `schema."name"` as emitted in DDL and DML.
    pub fn qualified(&self) -> String {
        format!("{}.\"{}\"", self.schema, self.name.replace('"', "\"\""))
    }
}

impl fmt::Display for DestinationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Spatial type to register for a layer under the given strategy.
pub fn spatial_type(strategy: SpatialTypeStrategy, kind: Option<ShapeKind>) -> &'static str {
    match (strategy, kind) {
        (SpatialTypeStrategy::Detect, Some(kind)) => kind.wkt_type(),
        _ => GENERIC_GEOMETRY_TYPE,
    }
}

/// `CREATE TABLE schema."name" (...)` for the scalar columns of `layout`.
pub fn create_table_sql(table: &DestinationTable, layout: &TableLayout) -> Result<String> {
    let defs = layout
        .columns()
        .iter()
        .map(|c| c.definition())
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("CREATE TABLE {} ({})", table.qualified(), defs.join(", ")))
}

/// `SELECT AddGeometryColumn(...)` registering the trailing `geom` column.
pub fn register_spatial_column_sql(table: &DestinationTable, srid: i32, spatial_type: &str) -> String {
    format!(
        "SELECT AddGeometryColumn({}, {}, {}, {}, {}, {})",
        quote_literal(&table.schema),
        quote_literal(&table.name),
        quote_literal(GEOMETRY_COLUMN),
        srid,
        quote_literal(spatial_type),
        GEOMETRY_DIMENSION
    )
}

/// `INSERT INTO schema."name" VALUES ($1, ..., $n)`.
pub fn insert_sql(table: &DestinationTable, param_count: usize) -> String {
    let placeholders: Vec<String> = (1..=param_count).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} VALUES ({})",
        table.qualified(),
        placeholders.join(", ")
    )
}

/// Create the destination table. Fails with a schema error if it exists.
pub async fn create_table<S: DestinationSink + ?Sized>(
    sink: &mut S,
    table: &DestinationTable,
    layout: &TableLayout,
) -> Result<()> {
    let sql = create_table_sql(table, layout)?;
    debug!("{}", sql);
    sink.execute(&sql).await?;
    info!("Created table {} with {} columns", table, layout.columns().len());
    Ok(())
}

/// Register the `geom` column with its SRID, spatial type and 2 dimensions.
pub async fn register_spatial_column<S: DestinationSink + ?Sized>(
    sink: &mut S,
    table: &DestinationTable,
    srid: i32,
    spatial_type: &str,
) -> Result<()> {
    let sql = register_spatial_column_sql(table, srid, spatial_type);
    debug!("{}", sql);
    sink.execute(&sql).await?;
    info!(
        "Registered {}.{} as {} (SRID {})",
        table, GEOMETRY_COLUMN, spatial_type, srid
    );
    Ok(())
}
