//! WKB / EWKB encoding and the SRID-tagged geometry handed to the destination.

use bytes::{BufMut, BytesMut};
use geo_types::Geometry;
use wkb::writer::{write_geometry, WriteOptions};
use wkb::Endianness;

use crate::error::{ExportError, Result};

/// EWKB flag marking an SRID after the geometry type word.
const EWKB_SRID_FLAG: u32 = 0x2000_0000;

/// Byte order marker plus the geometry type word.
const WKB_HEADER_LEN: usize = 5;

/// A geometry tagged with the spatial reference it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialValue {
    geometry: Geometry<f64>,
    srid: i32,
}

impl SpatialValue {
    pub fn new(geometry: Geometry<f64>, srid: i32) -> Self {
        Self { geometry, srid }
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    /// Serialize as little-endian EWKB with the SRID in the outer header.
    pub fn to_ewkb(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(64);
        self.write_ewkb(&mut buf)?;
        Ok(buf.to_vec())
    }

    /// Append the EWKB encoding to an existing buffer.
    ///
    /// Only the outermost header carries the SRID; nested members stay plain WKB.
    pub fn write_ewkb(&self, buf: &mut BytesMut) -> Result<()> {
        let wkb = write_wkb(&self.geometry)?;
        if wkb.len() < WKB_HEADER_LEN {
            return Err(ExportError::Geometry(format!(
                "encoded geometry is only {} bytes",
                wkb.len()
            )));
        }
        let type_code = u32::from_le_bytes([wkb[1], wkb[2], wkb[3], wkb[4]]);

        buf.reserve(wkb.len() + 4);
        buf.put_u8(1);
        buf.put_u32_le(type_code | EWKB_SRID_FLAG);
        buf.put_i32_le(self.srid);
        buf.put_slice(&wkb[WKB_HEADER_LEN..]);
        Ok(())
    }
}

/// Serialize a geometry as plain little-endian 2D WKB.
pub fn write_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    let options = WriteOptions {
        endianness: Endianness::LittleEndian,
    };
    write_geometry(&mut out, geometry, &options)
        .map_err(|e| ExportError::Geometry(format!("cannot encode geometry: {}", e)))?;
    Ok(out)
}
