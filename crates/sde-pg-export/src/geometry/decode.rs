//! WKB decoding into two-dimensional `geo-types` geometries.

use geo_traits::{
    CoordTrait, Dimensions, GeometryCollectionTrait, GeometryTrait, GeometryType,
    LineStringTrait, MultiLineStringTrait, MultiPointTrait, MultiPolygonTrait, PointTrait,
    PolygonTrait,
};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::error::{ExportError, Result};

/// Result of decoding one WKB payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGeometry {
    /// The two-dimensional geometry.
    pub geometry: Geometry<f64>,

    /// Whether Z or M ordinates were present and dropped.
    pub dropped_ordinates: bool,
}

/// Decode a WKB payload in either byte order.
///
/// Z and M ordinates are accepted and discarded.
pub fn read_wkb(bytes: &[u8]) -> Result<DecodedGeometry> {
    let wkb = wkb::reader::read_wkb(bytes)
        .map_err(|e| ExportError::Geometry(format!("malformed WKB: {}", e)))?;

    Ok(DecodedGeometry {
        geometry: to_geometry(&wkb)?,
        dropped_ordinates: !matches!(wkb.dim(), Dimensions::Xy),
    })
}

fn to_geometry(geom: &impl GeometryTrait<T = f64>) -> Result<Geometry<f64>> {
    let geometry = match geom.as_type() {
        GeometryType::Point(p) => Geometry::Point(to_point(p)?),
        GeometryType::LineString(ls) => Geometry::LineString(to_line_string(ls)),
        GeometryType::Polygon(p) => Geometry::Polygon(to_polygon(p)),
        GeometryType::MultiPoint(mp) => {
            let points = mp
                .points()
                .map(|p| to_point(&p))
                .collect::<Result<Vec<_>>>()?;
            Geometry::MultiPoint(MultiPoint::new(points))
        }
        GeometryType::MultiLineString(ml) => Geometry::MultiLineString(MultiLineString::new(
            ml.line_strings().map(|ls| to_line_string(&ls)).collect(),
        )),
        GeometryType::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
            mp.polygons().map(|p| to_polygon(&p)).collect(),
        )),
        GeometryType::GeometryCollection(gc) => {
            let members = gc
                .geometries()
                .map(|g| to_geometry(&g))
                .collect::<Result<Vec<_>>>()?;
            Geometry::GeometryCollection(GeometryCollection::from(members))
        }
        _ => {
            return Err(ExportError::Geometry(
                "geometry kind has no WKB encoding".to_string(),
            ))
        }
    };
    Ok(geometry)
}

fn to_coord(c: &impl CoordTrait<T = f64>) -> Coord<f64> {
    Coord { x: c.x(), y: c.y() }
}

fn to_point(p: &impl PointTrait<T = f64>) -> Result<Point<f64>> {
    p.coord()
        .map(|c| Point::from(to_coord(&c)))
        .ok_or_else(|| ExportError::Geometry("empty point cannot be exported".to_string()))
}

fn to_line_string(ls: &impl LineStringTrait<T = f64>) -> LineString<f64> {
    LineString::new(ls.coords().map(|c| to_coord(&c)).collect())
}

fn to_polygon(p: &impl PolygonTrait<T = f64>) -> Polygon<f64> {
    let exterior = p
        .exterior()
        .map(|ring| to_line_string(&ring))
        .unwrap_or_else(|| LineString::new(Vec::new()));
    let interiors = p.interiors().map(|ring| to_line_string(&ring)).collect();
    Polygon::new(exterior, interiors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon};

    fn point_le(x: f64, y: f64) -> Vec<u8> {
        let mut out = vec![1u8];
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
        out
    }

    #[test]
    fn test_read_point_little_endian() {
        let decoded = read_wkb(&point_le(18.07, 59.33)).unwrap();
        assert_eq!(decoded.geometry, Geometry::Point(point!(x: 18.07, y: 59.33)));
        assert!(!decoded.dropped_ordinates);
    }

    #[test]
    fn test_read_point_big_endian() {
        let mut wkb = vec![0u8];
        wkb.extend_from_slice(&1u32.to_be_bytes());
        wkb.extend_from_slice(&1.5f64.to_be_bytes());
        wkb.extend_from_slice(&(-2.5f64).to_be_bytes());
        let decoded = read_wkb(&wkb).unwrap();
        assert_eq!(decoded.geometry, Geometry::Point(point!(x: 1.5, y: -2.5)));
    }

    #[test]
    fn test_read_polygon_with_hole() {
        let mut wkb = vec![1u8];
        wkb.extend_from_slice(&3u32.to_le_bytes());
        wkb.extend_from_slice(&2u32.to_le_bytes());
        let outer = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)];
        let inner = [(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 2.0)];
        for ring in [&outer[..], &inner[..]] {
            wkb.extend_from_slice(&(ring.len() as u32).to_le_bytes());
            for (x, y) in ring {
                wkb.extend_from_slice(&f64::to_le_bytes(*x));
                wkb.extend_from_slice(&f64::to_le_bytes(*y));
            }
        }
        let decoded = read_wkb(&wkb).unwrap();
        let expected = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0)]],
        );
        assert_eq!(decoded.geometry, Geometry::Polygon(expected));
    }

    #[test]
    fn test_read_multilinestring() {
        let mut wkb = vec![1u8];
        wkb.extend_from_slice(&5u32.to_le_bytes());
        wkb.extend_from_slice(&1u32.to_le_bytes());
        wkb.push(1);
        wkb.extend_from_slice(&2u32.to_le_bytes());
        wkb.extend_from_slice(&2u32.to_le_bytes());
        for v in [0.0f64, 0.0, 10.0, 5.0] {
            wkb.extend_from_slice(&v.to_le_bytes());
        }
        let decoded = read_wkb(&wkb).unwrap();
        let expected = MultiLineString::new(vec![line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 5.0)]]);
        assert_eq!(decoded.geometry, Geometry::MultiLineString(expected));
    }

    #[test]
    fn test_read_iso_z_point_drops_z() {
        let mut wkb = vec![1u8];
        wkb.extend_from_slice(&1001u32.to_le_bytes());
        for v in [1.0f64, 2.0, 99.0] {
            wkb.extend_from_slice(&v.to_le_bytes());
        }
        let decoded = read_wkb(&wkb).unwrap();
        assert_eq!(decoded.geometry, Geometry::Point(point!(x: 1.0, y: 2.0)));
        assert!(decoded.dropped_ordinates);
    }

    #[test]
    fn test_empty_input_is_geometry_error() {
        assert!(matches!(read_wkb(&[]), Err(ExportError::Geometry(_))));
    }

    #[test]
    fn test_truncated_header_is_geometry_error() {
        let wkb = point_le(1.0, 2.0);
        let err = read_wkb(&wkb[..3]).unwrap_err();
        assert!(err.to_string().contains("malformed WKB"));
    }
}
