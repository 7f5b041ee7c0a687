//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source spatial database configuration.
    pub source: SourceConfig,

    /// Destination PostGIS database configuration.
    pub target: TargetConfig,

    /// Export behavior configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Source spatial database (SQL Server geodatabase) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Owner used when the source table name is unqualified (default: "dbo").
    #[serde(default = "default_dbo_schema")]
    pub schema: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Destination database (PostgreSQL with PostGIS) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Rows per destination transaction.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Default spatial reference identifier assigned to every geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srid: Option<i32>,

    /// How the registered geometry column type is chosen.
    #[serde(default)]
    pub spatial_type: SpatialTypeStrategy,

    /// Rows the source cursor may read ahead of the loader.
    #[serde(default = "default_prefetch_rows")]
    pub prefetch_rows: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            srid: None,
            spatial_type: SpatialTypeStrategy::default(),
            prefetch_rows: default_prefetch_rows(),
        }
    }
}

/// Strategy for the geometry type given to `AddGeometryColumn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialTypeStrategy {
    /// Always register the generic `GEOMETRY` type.
    #[default]
    Generic,

    /// Ask the source for the layer's shape kind and register the matching type.
    Detect,
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_pg_port() -> u16 {
    5432
}

fn default_dbo_schema() -> String {
    "dbo".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    1000
}

fn default_prefetch_rows() -> usize {
    256
}
