//! Export orchestration: one source table into one new PostGIS table.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ExportConfig, SpatialTypeStrategy};
use crate::core::{ConnectionFactory, DestinationSink, FeatureSource, QualifiedName};
use crate::error::{ExportError, Result};
use crate::provisioner::{
    create_table, insert_sql, register_spatial_column, spatial_type, DestinationTable,
};
use crate::source::MssqlSource;
use crate::target::PgSink;
use crate::transfer::{BatchLoader, LoadStats, RowConverter};
use crate::translator::translate;

/// Lifecycle of a single export run. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportState {
    Idle,
    Connected,
    SchemaReady,
    Streaming,
    Closed,
}

/// Parameters of one export invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Source feature table, optionally `owner.table` or `db.owner.table`.
    pub source_table: String,

    /// Destination schema; the table takes the unqualified source name.
    pub destination_schema: String,

    /// Rows per destination transaction.
    pub buffer_size: usize,

    /// Spatial reference identifier assigned to every geometry.
    pub srid: i32,

    /// How the registered geometry type is chosen.
    pub spatial_type: SpatialTypeStrategy,
}

impl ExportRequest {
    /// Build a request, falling back to the export config for omitted values.
    pub fn new(
        source_table: impl Into<String>,
        destination_schema: impl Into<String>,
        buffer_size: Option<usize>,
        srid: Option<i32>,
        defaults: &ExportConfig,
    ) -> Result<Self> {
        let buffer_size = buffer_size.unwrap_or(defaults.buffer_size);
        if buffer_size == 0 {
            return Err(ExportError::Config(
                "buffer size must be a positive number of rows".to_string(),
            ));
        }

        let srid = srid.or(defaults.srid).ok_or_else(|| {
            ExportError::Config(
                "no SRID given: pass one on the command line or set export.srid".to_string(),
            )
        })?;
        if srid <= 0 {
            return Err(ExportError::Config(format!("invalid SRID {}", srid)));
        }

        Ok(Self {
            source_table: source_table.into(),
            destination_schema: destination_schema.into(),
            buffer_size,
            srid,
            spatial_type: defaults.spatial_type,
        })
    }
}

/// Outcome of a completed export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Source table as given.
    pub source_table: String,

    /// Destination `schema.table`.
    pub destination_table: String,

    /// Registered geometry type.
    pub spatial_type: String,

    /// SRID assigned to every geometry.
    pub srid: i32,

    /// Final status.
    pub status: String,

    /// Rows inserted and committed.
    pub rows_transferred: u64,

    /// Commits issued by the batch loader.
    pub commits: u64,

    /// When the export started.
    pub started_at: DateTime<Utc>,

    /// When the export completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Average throughput (rows/second).
    pub rows_per_second: i64,
}

impl ExportResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity report for both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub postgis_version: Option<String>,
    pub healthy: bool,
}

/// Opens real database connections from a [`Config`].
#[derive(Debug, Clone)]
pub struct DatabaseConnections {
    config: Config,
}

impl DatabaseConnections {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Connect to both endpoints and run a trivial query on each.
    pub async fn health_check(&self) -> HealthCheckResult {
        let mut result = HealthCheckResult {
            source_connected: false,
            source_latency_ms: 0,
            source_error: None,
            target_connected: false,
            target_latency_ms: 0,
            target_error: None,
            postgis_version: None,
            healthy: false,
        };

        let start = Instant::now();
        match self.connect_source().await {
            Ok(mut source) => {
                match source.ping().await {
                    Ok(_) => result.source_connected = true,
                    Err(e) => result.source_error = Some(e.to_string()),
                }
                if let Err(e) = source.close().await {
                    warn!("Closing source after health check failed: {}", e);
                }
            }
            Err(e) => result.source_error = Some(e.to_string()),
        }
        result.source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        match self.connect_sink().await {
            Ok(mut sink) => {
                match sink.ping().await {
                    Ok((_, version)) => {
                        result.target_connected = true;
                        result.postgis_version = Some(version);
                    }
                    Err(e) => result.target_error = Some(e.to_string()),
                }
                if let Err(e) = sink.close().await {
                    warn!("Closing target after health check failed: {}", e);
                }
            }
            Err(e) => result.target_error = Some(e.to_string()),
        }
        result.target_latency_ms = start.elapsed().as_millis() as u64;

        result.healthy = result.source_connected && result.target_connected;
        result
    }
}

#[async_trait]
impl ConnectionFactory for DatabaseConnections {
    type Source = MssqlSource;
    type Sink = PgSink;

    async fn connect_source(&self) -> Result<MssqlSource> {
        MssqlSource::connect(&self.config.source, self.config.export.prefetch_rows).await
    }

    async fn connect_sink(&self) -> Result<PgSink> {
        PgSink::connect(&self.config.target).await
    }
}

/// Runs one export. Single use: [`run`](Self::run) consumes the exporter.
pub struct Exporter<F: ConnectionFactory> {
    factory: F,
    request: ExportRequest,
    default_owner: String,
    cancel: Option<CancellationToken>,
    state: ExportState,
}

impl Exporter<DatabaseConnections> {
    /// Exporter over real connections described by `config`.
    pub fn from_config(config: Config, request: ExportRequest) -> Self {
        let default_owner = config.source.schema.clone();
        Self::new(DatabaseConnections::new(config), request, default_owner)
    }
}

impl<F: ConnectionFactory> Exporter<F> {
    pub fn new(factory: F, request: ExportRequest, default_owner: impl Into<String>) -> Self {
        Self {
            factory,
            request,
            default_owner: default_owner.into(),
            cancel: None,
            state: ExportState::Idle,
        }
    }

    /// Abort streaming when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn transition(&mut self, next: ExportState) {
        debug!("Export state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the export to completion.
    ///
    /// Both connections are released on every path, destination first.
    pub async fn run(mut self) -> Result<ExportResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let source_name = QualifiedName::parse(&self.request.source_table, &self.default_owner)?;
        let destination =
            DestinationTable::new(&self.request.destination_schema, &source_name.name)?;

        info!(
            "Starting export run {}: {} -> {} (buffer {}, SRID {})",
            run_id, source_name, destination, self.request.buffer_size, self.request.srid
        );

        let mut source = match self.factory.connect_source().await {
            Ok(source) => source,
            Err(e) => {
                self.transition(ExportState::Closed);
                return Err(e);
            }
        };
        let mut sink = match self.factory.connect_sink().await {
            Ok(sink) => sink,
            Err(e) => {
                self.transition(ExportState::Closed);
                if let Err(close_err) = source.close().await {
                    warn!("Failed to release source connection: {}", close_err);
                }
                return Err(e);
            }
        };
        self.transition(ExportState::Connected);

        let mut stats = LoadStats::default();
        let outcome = self
            .export(&mut source, &mut sink, &source_name, &destination, &mut stats)
            .await;

        let reached = self.state;
        self.transition(ExportState::Closed);
        if let Err(e) = sink.close().await {
            warn!("Failed to release destination connection: {}", e);
        }
        if let Err(e) = source.close().await {
            warn!("Failed to release source connection: {}", e);
        }

        let spatial_type = match outcome {
            Ok(spatial_type) => spatial_type,
            Err(e) => {
                error!(
                    "Export of {} failed in state {:?} after {} rows ({} committed batches): {}",
                    source_name, reached, stats.rows, stats.commits, e
                );
                return Err(e);
            }
        };

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let rows_per_second = if duration > 0.0 {
            (stats.rows as f64 / duration) as i64
        } else {
            stats.rows as i64
        };

        info!(
            "Export run {} completed: {} rows into {} in {:.1}s ({} rows/s)",
            run_id, stats.rows, destination, duration, rows_per_second
        );

        Ok(ExportResult {
            run_id,
            source_table: self.request.source_table.clone(),
            destination_table: destination.to_string(),
            spatial_type: spatial_type.to_string(),
            srid: self.request.srid,
            status: "completed".to_string(),
            rows_transferred: stats.rows,
            commits: stats.commits,
            started_at,
            completed_at,
            duration_seconds: duration,
            rows_per_second,
        })
    }

    async fn export(
        &mut self,
        source: &mut F::Source,
        sink: &mut F::Sink,
        source_name: &QualifiedName,
        destination: &DestinationTable,
        stats: &mut LoadStats,
    ) -> Result<&'static str> {
        let columns = source.describe(source_name).await?;
        let layout = translate(&columns)?;

        let kind = match self.request.spatial_type {
            SpatialTypeStrategy::Detect => Some(
                source
                    .shape_kind(source_name, layout.geometry_column())
                    .await?,
            ),
            SpatialTypeStrategy::Generic => None,
        };
        let spatial_type = spatial_type(self.request.spatial_type, kind);

        create_table(sink, destination, &layout).await?;
        register_spatial_column(sink, destination, self.request.srid, spatial_type).await?;

        let sql = insert_sql(destination, layout.param_count());
        debug!("{}", sql);
        let mut stmt = sink
            .prepare(&destination.to_string(), &sql, layout.param_count())
            .await?;
        self.transition(ExportState::SchemaReady);

        source.open(source_name, &columns).await?;
        self.transition(ExportState::Streaming);

        let mut loader = BatchLoader::new(self.request.buffer_size);
        if let Some(token) = &self.cancel {
            loader = loader.with_cancellation(token.clone());
        }
        let mut converter = RowConverter::new(&layout, self.request.srid);
        loader
            .run(source, sink, &mut stmt, &mut converter, stats)
            .await?;

        if stats.rows == 0 {
            // Keep the DDL of an empty export.
            sink.commit().await?;
            info!("Source {} is empty; created {} without rows", source_name, destination);
        }

        Ok(spatial_type)
    }
}
