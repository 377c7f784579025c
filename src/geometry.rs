//! Validation of client-supplied search geometries.
//!
//! Accepts GeoJSON-style `Polygon` / `MultiPolygon` objects with `[lon, lat]`
//! positions. Ring closure, winding order and self-intersection are not checked;
//! rings are closed implicitly by `geo`.

use crate::error::GeometryError;
use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use serde_json::Value;

/// Smallest closed ring that can enclose an area: three corners plus the closing position.
const MIN_RING_POSITIONS: usize = 4;

/// A geometry that passed validation, ready for a containment test.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidGeometry {
    shape: MultiPolygon<f64>,
    bounds: Option<Rect<f64>>,
}

impl ValidGeometry {
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        let bounds = shape.bounding_rect();
        Self { shape, bounds }
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// `None` when the geometry has no vertices at all.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    /// The same geometry without rings too short to enclose an area (fewer than
    /// four positions once closed). Those rings contain no point, so containment
    /// answers are unchanged, but spatial databases reject them outright.
    pub fn areal(&self) -> ValidGeometry {
        let polygons = self
            .shape
            .0
            .iter()
            .filter(|polygon| is_areal(polygon.exterior()))
            .map(|polygon| {
                let holes = polygon
                    .interiors()
                    .iter()
                    .filter(|ring| is_areal(ring))
                    .cloned()
                    .collect();
                Polygon::new(polygon.exterior().clone(), holes)
            })
            .collect();
        ValidGeometry::new(MultiPolygon::new(polygons))
    }

    /// GeoJSON text for the spatial store's `ST_GeomFromGeoJSON`.
    pub fn to_geojson(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&geojson::Geometry::new(geojson::Value::from(&self.shape)))
    }
}

pub fn validate(geometry: Option<&Value>) -> Result<ValidGeometry, GeometryError> {
    let object = match geometry {
        None | Some(Value::Null) => return Err(GeometryError::Missing),
        Some(Value::Object(object)) => object,
        Some(_) => return Err(malformed("geometry must be an object")),
    };

    let coordinates = match object.get("coordinates") {
        Some(Value::Array(rings)) => rings,
        Some(_) => return Err(malformed("coordinates must be an array")),
        None => return Err(malformed("missing coordinates")),
    };

    let kind = object.get("type").and_then(Value::as_str).unwrap_or("Polygon");
    let polygons: Vec<Polygon<f64>> = match kind {
        "Polygon" => parse_polygon(coordinates)?.into_iter().collect(),
        "MultiPolygon" => {
            let mut polygons = Vec::with_capacity(coordinates.len());
            for member in coordinates {
                let rings = member
                    .as_array()
                    .ok_or_else(|| malformed("MultiPolygon members must be arrays of rings"))?;
                polygons.extend(parse_polygon(rings)?);
            }
            polygons
        }
        other => return Err(malformed(&format!("unsupported geometry type '{other}'"))),
    };

    Ok(ValidGeometry::new(MultiPolygon::new(polygons)))
}

fn parse_polygon(rings: &[Value]) -> Result<Option<Polygon<f64>>, GeometryError> {
    let mut parsed = Vec::with_capacity(rings.len());
    for ring in rings {
        let positions = ring
            .as_array()
            .ok_or_else(|| malformed("each ring must be an array of positions"))?;
        let coords = positions
            .iter()
            .map(parse_position)
            .collect::<Result<Vec<_>, _>>()?;
        parsed.push(LineString::new(coords));
    }

    let mut rings = parsed.into_iter();
    Ok(rings
        .next()
        .map(|exterior| Polygon::new(exterior, rings.collect())))
}

fn parse_position(position: &Value) -> Result<Coord<f64>, GeometryError> {
    let pair = match position.as_array() {
        Some(pair) if pair.len() >= 2 => pair,
        _ => return Err(malformed("positions must be [longitude, latitude] arrays")),
    };
    let x = pair[0].as_f64();
    let y = pair[1].as_f64();
    match (x, y) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
        _ => Err(malformed("position values must be finite numbers")),
    }
}

fn is_areal(ring: &LineString<f64>) -> bool {
    ring.0.len() >= MIN_RING_POSITIONS
}

fn malformed(message: &str) -> GeometryError {
    GeometryError::Malformed(message.to_string())
}
