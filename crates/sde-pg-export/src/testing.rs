//! In-memory source and sink doubles for pipeline tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use geo_types::{point, Geometry};

use crate::core::{
    ColumnDescriptor, ConnectionFactory, DestinationSink, FeatureSource, InsertStatement,
    QualifiedName, ShapeKind, SourceRow, SourceType, SourceValue, SqlValue,
};
use crate::error::{ExportError, Result};
use crate::geometry::write_wkb;

/// What a [`MockSource`] saw.
#[derive(Debug, Default)]
pub struct SourceLog {
    pub opened: Option<String>,
    pub fetched: usize,
    pub shape_queries: usize,
    pub closes: usize,
}

/// A source table held in memory.
#[derive(Debug, Clone)]
pub struct MockSource {
    table: String,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<SourceRow>,
    shape_kind: ShapeKind,
    cursor: Option<VecDeque<SourceRow>>,
    log: Arc<Mutex<SourceLog>>,
}

impl MockSource {
    pub fn new(table: &str, columns: Vec<ColumnDescriptor>, rows: Vec<SourceRow>) -> Self {
        Self {
            table: table.to_string(),
            columns,
            rows,
            shape_kind: ShapeKind::Unknown,
            cursor: None,
            log: Arc::default(),
        }
    }

    pub fn with_shape_kind(mut self, kind: ShapeKind) -> Self {
        self.shape_kind = kind;
        self
    }

    pub fn log(&self) -> MutexGuard<'_, SourceLog> {
        self.log.lock().unwrap()
    }
}

/// `ROADS(id int32, name string(50), shape geometry)` with `rows` point features.
pub fn roads_source(rows: usize) -> MockSource {
    let columns = vec![
        ColumnDescriptor::new("id", SourceType::Int32),
        ColumnDescriptor::new("name", SourceType::Text { max_len: 50 }),
        ColumnDescriptor::new("shape", SourceType::Geometry),
    ];
    let rows = (0..rows)
        .map(|i| {
            let shape: Geometry<f64> = point!(x: i as f64, y: 2.0 * i as f64).into();
            SourceRow::new(vec![
                SourceValue::I32(i as i32 + 1),
                SourceValue::Text(format!("road-{}", i + 1)),
                SourceValue::Shape(write_wkb(&shape).unwrap()),
            ])
        })
        .collect();
    MockSource::new("ROADS", columns, rows)
}

#[async_trait]
impl FeatureSource for MockSource {
    async fn describe(&mut self, table: &QualifiedName) -> Result<Vec<ColumnDescriptor>> {
        if table.name != self.table {
            return Err(ExportError::Schema(format!("table {} does not exist", table)));
        }
        Ok(self.columns.clone())
    }

    async fn shape_kind(&mut self, _table: &QualifiedName, _column: &str) -> Result<ShapeKind> {
        self.log().shape_queries += 1;
        Ok(self.shape_kind)
    }

    async fn open(&mut self, table: &QualifiedName, _columns: &[ColumnDescriptor]) -> Result<()> {
        self.log().opened = Some(table.to_string());
        self.cursor = Some(self.rows.iter().cloned().collect());
        Ok(())
    }

    async fn fetch(&mut self) -> Result<Option<SourceRow>> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or_else(|| ExportError::Read("cursor not open".to_string()))?;
        let row = cursor.pop_front();
        if row.is_some() {
            self.log().fetched += 1;
        }
        Ok(row)
    }

    async fn close(&mut self) -> Result<()> {
        self.cursor = None;
        self.log().closes += 1;
        Ok(())
    }
}

/// What a [`MockSink`] saw, plus the state of its pretend database.
#[derive(Debug, Default)]
pub struct SinkLog {
    pub executed: Vec<String>,
    pub prepared: Vec<String>,
    pub pending_rows: Vec<Vec<SqlValue>>,
    pub committed_rows: Vec<Vec<SqlValue>>,
    pub inserts: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
    pub fail_after_inserts: Option<usize>,
    tables: HashSet<String>,
    pending_tables: HashSet<String>,
}

impl SinkLog {
    /// Whether a committed table with this name exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains(name)
    }
}

/// A destination sink backed by a shared in-memory log.
///
/// Clones share the same database, so a second sink sees tables committed by
/// the first.
#[derive(Debug, Clone, Default)]
pub struct MockSink {
    log: Arc<Mutex<SinkLog>>,
    in_transaction: bool,
    dropped: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, SinkLog> {
        self.log.lock().unwrap()
    }

    /// Drop the connection once `n` inserts have gone through.
    pub fn fail_after_inserts(&self, n: usize) {
        self.log().fail_after_inserts = Some(n);
    }

    fn check_alive(&self, table: &str) -> Result<()> {
        if self.dropped {
            return Err(ExportError::write(table, "connection dropped"));
        }
        Ok(())
    }
}

fn created_table(sql: &str) -> Option<&str> {
    let rest = sql.strip_prefix("CREATE TABLE ")?;
    let name = rest.split(" (").next()?;
    Some(name)
}

#[async_trait]
impl DestinationSink for MockSink {
    type Statement = ();

    async fn execute(&mut self, sql: &str) -> Result<()> {
        if self.dropped {
            return Err(ExportError::Schema("connection dropped".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        if let Some(name) = created_table(sql) {
            if log.tables.contains(name) || log.pending_tables.contains(name) {
                return Err(ExportError::Schema(format!(
                    "relation {} already exists",
                    name
                )));
            }
            log.pending_tables.insert(name.to_string());
        }
        log.executed.push(sql.to_string());
        self.in_transaction = true;
        Ok(())
    }

    async fn prepare(
        &mut self,
        table: &str,
        sql: &str,
        param_count: usize,
    ) -> Result<InsertStatement<()>> {
        self.log().prepared.push(sql.to_string());
        Ok(InsertStatement::new((), table, sql, param_count))
    }

    async fn execute_insert(&mut self, stmt: &InsertStatement<()>) -> Result<u64> {
        self.check_alive(stmt.table())?;
        let mut log = self.log.lock().unwrap();
        if log.fail_after_inserts.is_some_and(|n| log.inserts >= n) {
            self.dropped = true;
            return Err(ExportError::write(stmt.table(), "connection dropped"));
        }
        let row = stmt.bound_params()?.into_iter().cloned().collect();
        log.pending_rows.push(row);
        log.inserts += 1;
        self.in_transaction = true;
        Ok(1)
    }

    async fn commit(&mut self) -> Result<()> {
        self.check_alive("transaction")?;
        let mut log = self.log.lock().unwrap();
        let rows = std::mem::take(&mut log.pending_rows);
        log.committed_rows.extend(rows);
        let tables = std::mem::take(&mut log.pending_tables);
        log.tables.extend(tables);
        log.commits += 1;
        self.in_transaction = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if self.in_transaction {
            log.pending_rows.clear();
            log.pending_tables.clear();
            log.rollbacks += 1;
            self.in_transaction = false;
        }
        log.closes += 1;
        Ok(())
    }
}

/// Hands out clones of a [`MockSource`] and sinks sharing one log.
#[derive(Debug, Clone)]
pub struct MockFactory {
    pub source: MockSource,
    pub sink: MockSink,
    pub fail_source_connect: bool,
    pub fail_sink_connect: bool,
}

impl MockFactory {
    pub fn new(source: MockSource) -> Self {
        Self {
            source,
            sink: MockSink::new(),
            fail_source_connect: false,
            fail_sink_connect: false,
        }
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Source = MockSource;
    type Sink = MockSink;

    async fn connect_source(&self) -> Result<MockSource> {
        if self.fail_source_connect {
            return Err(ExportError::connection("mock-source", "login failed"));
        }
        Ok(self.source.clone())
    }

    async fn connect_sink(&self) -> Result<MockSink> {
        if self.fail_sink_connect {
            return Err(ExportError::connection("mock-target", "connection refused"));
        }
        Ok(self.sink.clone())
    }
}
