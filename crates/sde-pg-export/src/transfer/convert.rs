//! Per-column conversion from a source row into insert parameters.

use tracing::warn;

use crate::core::{InsertStatement, SourceRow, SourceType, SqlValue};
use crate::error::{ExportError, Result};
use crate::geometry::{read_wkb, SpatialValue};
use crate::translator::TableLayout;

/// Converts source rows into bound parameters of the destination insert.
#[derive(Debug)]
pub struct RowConverter<'a> {
    layout: &'a TableLayout,
    srid: i32,
    warned_dropped_ordinates: bool,
}

impl<'a> RowConverter<'a> {
    pub fn new(layout: &'a TableLayout, srid: i32) -> Self {
        Self {
            layout,
            srid,
            warned_dropped_ordinates: false,
        }
    }

    pub fn layout(&self) -> &TableLayout {
        self.layout
    }

    /// Bind every destination parameter from `row`.
    pub fn convert_row<S>(&mut self, row: &SourceRow, stmt: &mut InsertStatement<S>) -> Result<()> {
        for dest_pos in 0..self.layout.param_count() {
            self.convert_column(row, dest_pos, stmt)?;
        }
        Ok(())
    }

    /// Read the source value feeding `dest_pos` and bind it to parameter `dest_pos + 1`.
    pub fn convert_column<S>(
        &mut self,
        row: &SourceRow,
        dest_pos: usize,
        stmt: &mut InsertStatement<S>,
    ) -> Result<()> {
        let source_pos = self.layout.source_position(dest_pos).ok_or_else(|| {
            ExportError::Conversion(format!("no source column for parameter {}", dest_pos + 1))
        })?;
        let source_type = self.layout.source_type(source_pos).ok_or_else(|| {
            ExportError::Conversion(format!("no type recorded for source column {}", source_pos))
        })?;
        let column = self.layout.column_name(dest_pos);

        let value = match source_type {
            SourceType::Int16 => SqlValue::I16(required(row.get_short(source_pos), column)?),
            SourceType::Int32 => SqlValue::I32(required(row.get_integer(source_pos), column)?),
            SourceType::Int64 => SqlValue::I64(required(row.get_long(source_pos), column)?),
            SourceType::Float32 => SqlValue::F32(required(row.get_float(source_pos), column)?),
            SourceType::Float64 => SqlValue::F64(required(row.get_double(source_pos), column)?),
            SourceType::Date => SqlValue::Timestamp(nullable(row.get_time(source_pos), column)?),
            SourceType::Text { .. } => SqlValue::Text(nullable(row.get_string(source_pos), column)?),
            SourceType::Geometry => SqlValue::Geometry(self.shape(row, source_pos, column)?),
            SourceType::Unsupported(name) => {
                return Err(ExportError::Conversion(format!(
                    "column {} has unsupported type {} and cannot be bound",
                    column, name
                )))
            }
        };

        stmt.bind(dest_pos + 1, value)
    }

    fn shape(&mut self, row: &SourceRow, source_pos: usize, column: &str) -> Result<SpatialValue> {
        let wkb = row
            .get_shape(source_pos)
            .map_err(|e| in_column(e, column))?
            .ok_or_else(|| ExportError::Conversion(format!("column {} has a null shape", column)))?;

        let decoded = read_wkb(wkb).map_err(|e| in_column(e, column))?;
        if decoded.dropped_ordinates && !self.warned_dropped_ordinates {
            warn!(
                "Column {} has Z/M ordinates; exporting 2D coordinates only",
                column
            );
            self.warned_dropped_ordinates = true;
        }

        Ok(SpatialValue::new(decoded.geometry, self.srid))
    }
}

fn in_column(err: ExportError, column: &str) -> ExportError {
    match err {
        ExportError::Conversion(msg) => ExportError::Conversion(format!("column {}: {}", column, msg)),
        ExportError::Geometry(msg) => ExportError::Geometry(format!("column {}: {}", column, msg)),
        other => other,
    }
}

fn nullable<T>(value: Result<Option<T>>, column: &str) -> Result<Option<T>> {
    value.map_err(|e| in_column(e, column))
}

fn required<T>(value: Result<Option<T>>, column: &str) -> Result<T> {
    nullable(value, column)?
        .ok_or_else(|| ExportError::Conversion(format!("column {} has a null value", column)))
}
