//! Row values on both sides of the export.
//!
//! [`SourceValue`] is what a source cursor yields per column; [`SqlValue`] is
//! what gets bound to a destination statement parameter. `SqlValue` implements
//! `tokio_postgres::types::ToSql`, which is also how geometries reach PostGIS:
//! the geometry variant is accepted for the `geometry` type and sent as EWKB.

use std::error::Error;

use bytes::BytesMut;
use chrono::NaiveDateTime;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::error::{ExportError, Result};
use crate::geometry::SpatialValue;

/// A single column value as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    DateTime(NaiveDateTime),
    Text(String),
    /// Shape serialized as well-known-binary.
    Shape(Vec<u8>),
}

impl SourceValue {
    fn kind(&self) -> &'static str {
        match self {
            SourceValue::Null => "null",
            SourceValue::I16(_) => "int16",
            SourceValue::I32(_) => "int32",
            SourceValue::I64(_) => "int64",
            SourceValue::F32(_) => "float32",
            SourceValue::F64(_) => "float64",
            SourceValue::DateTime(_) => "date",
            SourceValue::Text(_) => "string",
            SourceValue::Shape(_) => "shape",
        }
    }
}

/// One row fetched from the source cursor, indexed by source column position.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    values: Vec<SourceValue>,
}

macro_rules! typed_getter {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self, idx: usize) -> Result<Option<$ty>> {
            match self.value(idx)? {
                SourceValue::Null => Ok(None),
                SourceValue::$variant(v) => Ok(Some(v.clone())),
                other => Err(self.mismatch(idx, stringify!($variant), other)),
            }
        }
    };
}

impl SourceRow {
    pub fn new(values: Vec<SourceValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn value(&self, idx: usize) -> Result<&SourceValue> {
        self.values.get(idx).ok_or_else(|| {
            ExportError::Conversion(format!(
                "source column {} out of range (row has {} values)",
                idx,
                self.values.len()
            ))
        })
    }

    fn mismatch(&self, idx: usize, expected: &str, found: &SourceValue) -> ExportError {
        ExportError::Conversion(format!(
            "source column {} holds a {} value, expected {}",
            idx,
            found.kind(),
            expected
        ))
    }

    typed_getter!(get_short, I16, i16);
    typed_getter!(get_integer, I32, i32);
    typed_getter!(get_long, I64, i64);
    typed_getter!(get_float, F32, f32);
    typed_getter!(get_double, F64, f64);
    typed_getter!(get_time, DateTime, NaiveDateTime);
    typed_getter!(get_string, Text, String);

    /// Shape column as well-known-binary, borrowed from the row.
    pub fn get_shape(&self, idx: usize) -> Result<Option<&[u8]>> {
        match self.value(idx)? {
            SourceValue::Null => Ok(None),
            SourceValue::Shape(wkb) => Ok(Some(wkb.as_slice())),
            other => Err(self.mismatch(idx, "Shape", other)),
        }
    }
}

/// A value bound to a destination statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Timestamp(Option<NaiveDateTime>),
    Text(Option<String>),
    Geometry(SpatialValue),
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::I16(v) => v.to_sql_checked(ty, out),
            SqlValue::I32(v) => v.to_sql_checked(ty, out),
            SqlValue::I64(v) => v.to_sql_checked(ty, out),
            SqlValue::F32(v) => v.to_sql_checked(ty, out),
            SqlValue::F64(v) => v.to_sql_checked(ty, out),
            SqlValue::Timestamp(v) => v.to_sql_checked(ty, out),
            SqlValue::Text(v) => v.to_sql_checked(ty, out),
            SqlValue::Geometry(g) => {
                if !is_geometry_type(ty) {
                    return Err(format!("cannot bind a geometry to a {} parameter", ty).into());
                }
                g.write_ewkb(out)?;
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(ty: &Type) -> bool {
        <i16 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f32 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <NaiveDateTime as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || is_geometry_type(ty)
    }

    to_sql_checked!();
}

fn is_geometry_type(ty: &Type) -> bool {
    ty.name() == "geometry"
}
