//! Batched row transfer from a source cursor into a prepared destination insert.
//!
//! Rows are streamed strictly in cursor order, one insert per row. The
//! destination transaction is committed every `buffer_size` rows and once more
//! at the end for a partial batch. A failure leaves the current batch
//! uncommitted; it is rolled back when the sink is closed.

mod convert;

pub use convert::RowConverter;

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{DestinationSink, FeatureSource, InsertStatement};
use crate::error::{ExportError, Result};

/// Counters of a load, valid up to the point of failure.
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    /// Rows inserted (committed or not).
    pub rows: u64,

    /// Commits issued.
    pub commits: u64,

    /// Time spent waiting on the source cursor.
    pub read_time: Duration,

    /// Time spent inserting and committing.
    pub write_time: Duration,
}

/// Drives the row stream and the commit policy.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    buffer_size: usize,
    cancel: Option<CancellationToken>,
}

impl BatchLoader {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            cancel: None,
        }
    }

    /// Abort the load with [`ExportError::Cancelled`] once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Stream every remaining row of `source` into `stmt`.
    ///
    /// `stats` is updated as rows go in, so the running total is available to
    /// the caller even when this returns an error.
    pub async fn run<Src, Snk>(
        &self,
        source: &mut Src,
        sink: &mut Snk,
        stmt: &mut InsertStatement<Snk::Statement>,
        converter: &mut RowConverter<'_>,
        stats: &mut LoadStats,
    ) -> Result<()>
    where
        Src: FeatureSource + ?Sized,
        Snk: DestinationSink + ?Sized,
    {
        let mut since_commit = 0usize;

        loop {
            if self.is_cancelled() {
                info!(
                    "Cancelled after {} rows; {} uncommitted rows will be rolled back",
                    stats.rows, since_commit
                );
                return Err(ExportError::Cancelled);
            }

            let read_start = Instant::now();
            let row = match source.fetch().await? {
                Some(row) => row,
                None => break,
            };
            stats.read_time += read_start.elapsed();

            converter.convert_row(&row, stmt)?;

            let write_start = Instant::now();
            sink.execute_insert(stmt).await?;
            stats.rows += 1;
            since_commit += 1;

            if since_commit >= self.buffer_size {
                sink.commit().await?;
                stats.commits += 1;
                since_commit = 0;
                info!("{}: committed, {} rows so far", stmt.table(), stats.rows);
            }
            stats.write_time += write_start.elapsed();
        }

        if since_commit > 0 {
            let write_start = Instant::now();
            sink.commit().await?;
            stats.commits += 1;
            stats.write_time += write_start.elapsed();
            info!("{}: committed, {} rows so far", stmt.table(), stats.rows);
        }

        debug!(
            "{}: load finished: {} rows, {} commits (read {:?}, write {:?})",
            stmt.table(),
            stats.rows,
            stats.commits,
            stats.read_time,
            stats.write_time
        );
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}
