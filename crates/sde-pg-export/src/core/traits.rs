//! Collaborator traits for the export pipeline.
//!
//! - [`FeatureSource`]: describes and streams rows from a spatial source table
//! - [`DestinationSink`]: executes DDL and prepared inserts against PostGIS
//! - [`ConnectionFactory`]: opens one connection of each kind per run
//!
//! The pipeline stages (translator, provisioner, batch loader) only talk to
//! these traits, so they run unchanged against the in-memory doubles used in
//! tests.

use async_trait::async_trait;

use crate::error::{ExportError, Result};

use super::schema::{ColumnDescriptor, QualifiedName, ShapeKind};
use super::value::{SourceRow, SqlValue};

/// Read side of an export.
#[async_trait]
pub trait FeatureSource: Send {
    /// Column descriptors of `table`, in source column order.
    ///
    /// Fails with a schema error if the table does not exist.
    async fn describe(&mut self, table: &QualifiedName) -> Result<Vec<ColumnDescriptor>>;

    /// Shape kind stored in `column`, or [`ShapeKind::Unknown`] when mixed or empty.
    async fn shape_kind(&mut self, table: &QualifiedName, column: &str) -> Result<ShapeKind>;

    /// Open a forward-only cursor over all rows of `table`.
    ///
    /// Rows returned by [`fetch`](Self::fetch) carry one value per entry of
    /// `columns`, in the same order.
    async fn open(&mut self, table: &QualifiedName, columns: &[ColumnDescriptor]) -> Result<()>;

    /// Next row of the open cursor, `None` once exhausted.
    async fn fetch(&mut self) -> Result<Option<SourceRow>>;

    /// Release the cursor and the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// A prepared parameterized insert with its current parameter bindings.
///
/// Positions are 1-based. Bindings persist until overwritten, so every row
/// must rebind each parameter it relies on.
#[derive(Debug)]
pub struct InsertStatement<S> {
    handle: S,
    table: String,
    sql: String,
    params: Vec<Option<SqlValue>>,
}

impl<S> InsertStatement<S> {
    pub fn new(
        handle: S,
        table: impl Into<String>,
        sql: impl Into<String>,
        param_count: usize,
    ) -> Self {
        Self {
            handle,
            table: table.into(),
            sql: sql.into(),
            params: vec![None; param_count],
        }
    }

    pub fn handle(&self) -> &S {
        &self.handle
    }

    /// Destination table the statement writes to.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Bind `value` to the 1-based parameter `position`.
    pub fn bind(&mut self, position: usize, value: SqlValue) -> Result<()> {
        let count = self.params.len();
        match position.checked_sub(1).and_then(|i| self.params.get_mut(i)) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(ExportError::Conversion(format!(
                "parameter {} out of range (statement has {})",
                position, count
            ))),
        }
    }

    /// Current binding of the 1-based parameter `position`.
    pub fn param(&self, position: usize) -> Option<&SqlValue> {
        position
            .checked_sub(1)
            .and_then(|i| self.params.get(i))
            .and_then(Option::as_ref)
    }

    /// All bindings in order; fails if any parameter was never bound.
    pub fn bound_params(&self) -> Result<Vec<&SqlValue>> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                p.as_ref().ok_or_else(|| {
                    ExportError::Conversion(format!("parameter {} was never bound", i + 1))
                })
            })
            .collect()
    }
}

/// Write side of an export.
///
/// The sink runs in manual-commit mode: the first statement after a commit
/// implicitly opens a transaction, and only [`commit`](Self::commit) makes
/// work durable. Error categories are fixed per operation: DDL and prepare
/// failures are schema errors, insert and commit failures are write errors.
#[async_trait]
pub trait DestinationSink: Send {
    /// Driver-specific prepared statement handle.
    type Statement: Send + Sync;

    /// Execute a DDL or utility statement.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Prepare a parameterized insert into `table` with `param_count` placeholders.
    async fn prepare(
        &mut self,
        table: &str,
        sql: &str,
        param_count: usize,
    ) -> Result<InsertStatement<Self::Statement>>;

    /// Execute the prepared insert with its current bindings.
    async fn execute_insert(&mut self, stmt: &InsertStatement<Self::Statement>) -> Result<u64>;

    /// Commit the open transaction, if any.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back uncommitted work and release the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Opens the two connections an export run needs.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    type Source: FeatureSource;
    type Sink: DestinationSink;

    async fn connect_source(&self) -> Result<Self::Source>;

    async fn connect_sink(&self) -> Result<Self::Sink>;
}
