//! # sde-pg-export
//!
//! Export a single feature table from a SQL Server spatial database into a
//! new PostGIS table.
//!
//! The pipeline:
//!
//! - **Type mapping** of source column types to PostgreSQL types
//! - **Schema translation** into a destination layout with the geometry last
//! - **Table provisioning** with `CREATE TABLE` and `AddGeometryColumn`
//! - **Row conversion**, decoding WKB shapes and tagging them with an SRID
//! - **Batched loading** with a commit every `buffer_size` rows
//!
//! ## Example
//!
//! ```rust,no_run
//! use sde_pg_export::{Config, ExportRequest, Exporter};
//!
//! #[tokio::main]
//! async fn main() -> sde_pg_export::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let request = ExportRequest::new("sde.ROADS", "public", Some(1000), Some(4326), &config.export)?;
//!     let result = Exporter::from_config(config, request).run().await?;
//!     println!("Exported {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod geometry;
pub mod orchestrator;
pub mod provisioner;
pub mod source;
pub mod target;
pub mod transfer;
pub mod translator;
pub mod typemap;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, ExportConfig, SourceConfig, SpatialTypeStrategy, TargetConfig};
pub use error::{ExportError, Result};
pub use orchestrator::{
    DatabaseConnections, ExportRequest, ExportResult, Exporter, HealthCheckResult,
};
pub use source::MssqlSource;
pub use target::{PgSink, SslMode};
pub use transfer::{BatchLoader, LoadStats, RowConverter};
pub use translator::{translate, TableLayout};
