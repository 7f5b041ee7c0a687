//! SQL Server spatial source.
//!
//! Feature tables are read through `tiberius` over a single connection. The
//! cursor is a background task that streams decoded rows into a bounded
//! channel; rows arrive in the order the server returns them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::TryStreamExt;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, QueryItem, Row};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::quote_mssql;
use crate::core::{
    ColumnDescriptor, FeatureSource, QualifiedName, ShapeKind, SourceRow, SourceType, SourceValue,
};
use crate::error::{ExportError, Result};
use crate::typemap::mssql_to_source;

type TdsClient = Client<Compat<TcpStream>>;

/// A feature source over one SQL Server connection.
pub struct MssqlSource {
    client: Option<TdsClient>,
    endpoint: String,
    prefetch_rows: usize,
    rows: Option<mpsc::Receiver<Result<SourceRow>>>,
    reader: Option<JoinHandle<TdsClient>>,
}

fn build_config(config: &SourceConfig) -> Config {
    let mut tds = Config::new();
    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
    tds.application_name("sde-pg-export");

    if config.encrypt {
        if config.trust_server_cert {
            tds.trust_cert();
        }
        tds.encryption(EncryptionLevel::Required);
    } else {
        tds.encryption(EncryptionLevel::NotSupported);
    }

    tds
}

impl MssqlSource {
    /// Connect to the source database. `prefetch_rows` bounds the read-ahead.
    pub async fn connect(config: &SourceConfig, prefetch_rows: usize) -> Result<Self> {
        let endpoint = config.endpoint();
        let tds = build_config(config);

        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| ExportError::connection(&endpoint, e))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| ExportError::connection(&endpoint, e))?;

        info!("Connected to MSSQL: {}", endpoint);

        Ok(Self {
            client: Some(client),
            endpoint,
            prefetch_rows: prefetch_rows.max(1),
            rows: None,
            reader: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Round-trip a trivial query, returning the latency.
    pub async fn ping(&mut self) -> Result<Duration> {
        let endpoint = self.endpoint.clone();
        let client = self.client_mut()?;
        let start = Instant::now();
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ExportError::connection(&endpoint, e))?
            .into_row()
            .await
            .map_err(|e| ExportError::connection(&endpoint, e))?;
        Ok(start.elapsed())
    }

    fn client_mut(&mut self) -> Result<&mut TdsClient> {
        if self.reader.is_some() {
            return Err(ExportError::Read(
                "connection is busy streaming rows".to_string(),
            ));
        }
        self.client
            .as_mut()
            .ok_or_else(|| ExportError::Read("connection already closed".to_string()))
    }

    /// Wait for the reader task to finish and take the connection back.
    async fn reclaim_client(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            let client = reader
                .await
                .map_err(|e| ExportError::Read(format!("reader task failed: {}", e)))?;
            self.client = Some(client);
        }
        self.rows = None;
        Ok(())
    }
}

/// `[db].[owner].[name]` or `[owner].[name]`.
fn table_ref(table: &QualifiedName) -> Result<String> {
    let owned = format!("{}.{}", quote_mssql(&table.owner)?, quote_mssql(&table.name)?);
    match &table.database {
        Some(db) => Ok(format!("{}.{}", quote_mssql(db)?, owned)),
        None => Ok(owned),
    }
}

fn describe_sql(table: &QualifiedName) -> Result<String> {
    let catalog = match &table.database {
        Some(db) => format!("{}.INFORMATION_SCHEMA.COLUMNS", quote_mssql(db)?),
        None => "INFORMATION_SCHEMA.COLUMNS".to_string(),
    };
    Ok(format!(
        "SELECT COLUMN_NAME, DATA_TYPE, CAST(ISNULL(CHARACTER_MAXIMUM_LENGTH, 0) AS INT) \
         FROM {} WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 ORDER BY ORDINAL_POSITION",
        catalog
    ))
}

/// Select expression that puts each column on the wire as the type its decoder expects.
fn select_expr(col: &ColumnDescriptor) -> Result<String> {
    let name = quote_mssql(&col.name)?;
    Ok(match &col.source_type {
        SourceType::Int16 => format!("CAST({} AS SMALLINT)", name),
        SourceType::Date => format!("CAST({} AS DATETIME2)", name),
        SourceType::Text { .. } => format!("CAST({} AS NVARCHAR(MAX))", name),
        SourceType::Geometry => format!("{}.STAsBinary()", name),
        SourceType::Unsupported(_) => format!("NULL AS {}", name),
        SourceType::Int32 | SourceType::Int64 | SourceType::Float32 | SourceType::Float64 => name,
    })
}

fn select_sql(table: &QualifiedName, columns: &[ColumnDescriptor]) -> Result<String> {
    let exprs = columns
        .iter()
        .map(select_expr)
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "SELECT {} FROM {}",
        exprs.join(", "),
        table_ref(table)?
    ))
}

fn shape_kind_sql(table: &QualifiedName, column: &str) -> Result<String> {
    let col = quote_mssql(column)?;
    Ok(format!(
        "SELECT DISTINCT TOP (2) {col}.STGeometryType() FROM {} WHERE {col} IS NOT NULL",
        table_ref(table)?,
        col = col
    ))
}

fn shape_kind_from_name(name: &str) -> ShapeKind {
    match name {
        "Point" => ShapeKind::Point,
        "LineString" => ShapeKind::Line,
        "Polygon" => ShapeKind::Polygon,
        "MultiPoint" => ShapeKind::MultiPoint,
        "MultiLineString" => ShapeKind::MultiLine,
        "MultiPolygon" => ShapeKind::MultiPolygon,
        _ => ShapeKind::Unknown,
    }
}

fn read_err(e: tiberius::error::Error) -> ExportError {
    ExportError::Read(e.to_string())
}

fn decode_value(row: &Row, idx: usize, source_type: &SourceType) -> Result<SourceValue> {
    let value = match source_type {
        SourceType::Int16 => row.try_get::<i16, _>(idx).map(|v| v.map(SourceValue::I16)),
        SourceType::Int32 => row.try_get::<i32, _>(idx).map(|v| v.map(SourceValue::I32)),
        SourceType::Int64 => row.try_get::<i64, _>(idx).map(|v| v.map(SourceValue::I64)),
        SourceType::Float32 => row.try_get::<f32, _>(idx).map(|v| v.map(SourceValue::F32)),
        SourceType::Float64 => row.try_get::<f64, _>(idx).map(|v| v.map(SourceValue::F64)),
        SourceType::Date => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|v| v.map(SourceValue::DateTime)),
        SourceType::Text { .. } => row
            .try_get::<&str, _>(idx)
            .map(|v| v.map(|s| SourceValue::Text(s.to_string()))),
        SourceType::Geometry => row
            .try_get::<&[u8], _>(idx)
            .map(|v| v.map(|b| SourceValue::Shape(b.to_vec()))),
        SourceType::Unsupported(_) => Ok(None),
    };
    value
        .map(|v| v.unwrap_or(SourceValue::Null))
        .map_err(|e| ExportError::Read(format!("column {}: {}", idx, e)))
}

async fn stream_rows(
    client: &mut TdsClient,
    sql: &str,
    types: &[SourceType],
    tx: &mpsc::Sender<Result<SourceRow>>,
) -> Result<()> {
    let mut stream = client.simple_query(sql).await.map_err(read_err)?;
    while let Some(item) = stream.try_next().await.map_err(read_err)? {
        let QueryItem::Row(row) = item else {
            continue;
        };
        let values = types
            .iter()
            .enumerate()
            .map(|(idx, t)| decode_value(&row, idx, t))
            .collect::<Result<Vec<_>>>()?;
        if tx.send(Ok(SourceRow::new(values))).await.is_err() {
            // Receiver dropped: the cursor was closed early.
            break;
        }
    }
    Ok(())
}

#[async_trait]
impl FeatureSource for MssqlSource {
    async fn describe(&mut self, table: &QualifiedName) -> Result<Vec<ColumnDescriptor>> {
        let sql = describe_sql(table)?;
        let client = self.client_mut()?;

        let mut query = Query::new(sql);
        query.bind(table.owner.as_str());
        query.bind(table.name.as_str());

        let rows = query
            .query(client)
            .await
            .map_err(|e| ExportError::Schema(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| ExportError::Schema(e.to_string()))?;

        let columns: Vec<ColumnDescriptor> = rows
            .iter()
            .map(|row| {
                let name = row.get::<&str, _>(0).unwrap_or_default();
                let data_type = row.get::<&str, _>(1).unwrap_or_default();
                let max_length = row.get::<i32, _>(2).unwrap_or(0);
                ColumnDescriptor::new(name, mssql_to_source(data_type, max_length))
            })
            .collect();

        if columns.is_empty() {
            return Err(ExportError::Schema(format!(
                "source table {} does not exist or has no visible columns",
                table
            )));
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn shape_kind(&mut self, table: &QualifiedName, column: &str) -> Result<ShapeKind> {
        let sql = shape_kind_sql(table, column)?;
        let client = self.client_mut()?;
        let rows = client
            .simple_query(sql)
            .await
            .map_err(read_err)?
            .into_first_result()
            .await
            .map_err(read_err)?;

        let kinds: Vec<&str> = rows.iter().filter_map(|r| r.get::<&str, _>(0)).collect();
        let kind = match kinds.as_slice() {
            [single] => shape_kind_from_name(single),
            _ => ShapeKind::Unknown,
        };
        debug!("Shape kind of {}.{}: {:?} ({:?})", table, column, kind, kinds);
        Ok(kind)
    }

    async fn open(&mut self, table: &QualifiedName, columns: &[ColumnDescriptor]) -> Result<()> {
        let sql = select_sql(table, columns)?;
        self.client_mut()?;
        let Some(mut client) = self.client.take() else {
            return Err(ExportError::Read("connection already closed".to_string()));
        };

        debug!("{}", sql);
        let types: Vec<SourceType> = columns.iter().map(|c| c.source_type.clone()).collect();
        let (tx, rx) = mpsc::channel(self.prefetch_rows);

        let reader = tokio::spawn(async move {
            if let Err(e) = stream_rows(&mut client, &sql, &types, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
            client
        });

        self.rows = Some(rx);
        self.reader = Some(reader);
        info!("Opened cursor on {} ({} columns)", table, columns.len());
        Ok(())
    }

    async fn fetch(&mut self) -> Result<Option<SourceRow>> {
        let rows = self
            .rows
            .as_mut()
            .ok_or_else(|| ExportError::Read("cursor is not open".to_string()))?;

        match rows.recv().await {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(e),
            None => {
                self.reclaim_client().await?;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.rows = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                warn!("Closing MSSQL connection {} failed: {}", self.endpoint, e);
            }
            debug!("Closed MSSQL connection {}", self.endpoint);
        }
        Ok(())
    }
}
