//! PostgreSQL/PostGIS destination sink.
//!
//! One connection per export run, in manual-commit mode: a transaction is
//! opened with `BEGIN` before the first statement after a commit, and closing
//! the sink rolls back whatever was not committed.

mod tls;

pub use tls::SslMode;

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, NoTls, Statement};
use tracing::{debug, error, info, warn};

use crate::config::TargetConfig;
use crate::core::{DestinationSink, InsertStatement};
use crate::error::{ExportError, Result};

/// A destination sink over a single `tokio-postgres` connection.
pub struct PgSink {
    client: Option<Client>,
    connection: Option<JoinHandle<()>>,
    endpoint: String,
    in_transaction: bool,
    target: Option<String>,
}

impl PgSink {
    /// Open the connection described by `config`.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let endpoint = config.endpoint();

        let mut pg_config = PgConfig::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.user)
            .password(&config.password)
            .application_name("sde-pg-export")
            .connect_timeout(Duration::from_secs(30));

        let tls = tls::connector(config.ssl_mode.parse::<SslMode>()?);
        let (client, connection) = match tls {
            Some(tls) => {
                let (client, conn) = pg_config
                    .connect(tls)
                    .await
                    .map_err(|e| ExportError::connection(&endpoint, e))?;
                (client, spawn_connection(conn, endpoint.clone()))
            }
            None => {
                let (client, conn) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| ExportError::connection(&endpoint, e))?;
                (client, spawn_connection(conn, endpoint.clone()))
            }
        };

        info!("Connected to PostgreSQL: {}", endpoint);

        Ok(Self {
            client: Some(client),
            connection: Some(connection),
            endpoint,
            in_transaction: false,
            target: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Round-trip a trivial query and report the installed PostGIS version.
    pub async fn ping(&self) -> Result<(Duration, String)> {
        let client = self.client()?;
        let start = Instant::now();
        let row = client
            .query_one("SELECT postgis_lib_version()", &[])
            .await
            .map_err(|e| ExportError::connection(&self.endpoint, e))?;
        let version: String = row
            .try_get(0)
            .map_err(|e| ExportError::connection(&self.endpoint, e))?;
        Ok((start.elapsed(), version))
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ExportError::connection(&self.endpoint, "connection already closed"))
    }

    fn write_label(&self) -> String {
        self.target.clone().unwrap_or_else(|| self.endpoint.clone())
    }

    async fn begin_if_needed(&mut self) -> std::result::Result<(), tokio_postgres::Error> {
        if !self.in_transaction {
            if let Some(client) = self.client.as_ref() {
                client.batch_execute("BEGIN").await?;
                self.in_transaction = true;
            }
        }
        Ok(())
    }
}

fn spawn_connection<F>(connection: F, endpoint: String) -> JoinHandle<()>
where
    F: Future<Output = std::result::Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection {} failed: {}", endpoint, e);
        }
    })
}

#[async_trait]
impl DestinationSink for PgSink {
    type Statement = Statement;

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.client()?;
        self.begin_if_needed()
            .await
            .map_err(|e| ExportError::Schema(e.to_string()))?;
        debug!("{}", sql);
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(|e| ExportError::Schema(format_db_error(&e)))
    }

    async fn prepare(
        &mut self,
        table: &str,
        sql: &str,
        param_count: usize,
    ) -> Result<InsertStatement<Statement>> {
        let statement = self
            .client()?
            .prepare(sql)
            .await
            .map_err(|e| ExportError::Schema(format_db_error(&e)))?;

        if statement.params().len() != param_count {
            return Err(ExportError::Schema(format!(
                "insert into {} expects {} parameters, layout has {}",
                table,
                statement.params().len(),
                param_count
            )));
        }

        self.target = Some(table.to_string());
        Ok(InsertStatement::new(statement, table, sql, param_count))
    }

    async fn execute_insert(&mut self, stmt: &InsertStatement<Statement>) -> Result<u64> {
        self.client()?;
        self.begin_if_needed()
            .await
            .map_err(|e| ExportError::write(stmt.table(), e))?;

        let values = stmt.bound_params()?;
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();

        self.client()?
            .execute(stmt.handle(), &params)
            .await
            .map_err(|e| ExportError::write(stmt.table(), format_db_error(&e)))
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        let label = self.write_label();
        self.client()?
            .batch_execute("COMMIT")
            .await
            .map_err(|e| ExportError::write(label, format_db_error(&e)))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        if self.in_transaction {
            self.in_transaction = false;
            match client.batch_execute("ROLLBACK").await {
                Ok(()) => info!("Rolled back uncommitted rows on {}", self.endpoint),
                // The server discards the open transaction when the session ends.
                Err(e) => warn!("ROLLBACK on {} failed: {}", self.endpoint, e),
            }
        }

        drop(client);
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection task ended abnormally: {}", e);
            }
        }
        debug!("Closed PostgreSQL connection {}", self.endpoint);
        Ok(())
    }
}

/// Render a driver error with the server's message and detail when present.
fn format_db_error(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({}): {}", db.message(), db.code().code(), detail),
            None => format!("{} ({})", db.message(), db.code().code()),
        },
        None => e.to_string(),
    }
}
