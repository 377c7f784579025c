use crate::geometry::ValidGeometry;
use crate::types::EstablishmentPoint;
use geo::algorithm::contains::Contains;
use geo::{Coord, Point, Rect};
use rayon::prelude::*;

/// Every point of `points` inside `geometry`, in input order.
///
/// Holes are subtracted. Points lying exactly on an edge are classified by
/// `geo`'s `Contains` and callers must not rely on either outcome.
pub fn search(points: &[EstablishmentPoint], geometry: &ValidGeometry) -> Vec<EstablishmentPoint> {
    let Some(bounds) = geometry.bounds() else {
        return Vec::new();
    };

    points
        .par_iter()
        .filter(|p| is_inside(geometry, &bounds, p))
        .cloned()
        .collect()
}

fn is_inside(geometry: &ValidGeometry, bounds: &Rect<f64>, point: &EstablishmentPoint) -> bool {
    let coord = Coord {
        x: point.longitude,
        y: point.latitude,
    };
    within_bounds(bounds, coord) && geometry.shape().contains(&Point::from(coord))
}

// Inclusive, so it can only ever reject points the exact test would reject too.
fn within_bounds(bounds: &Rect<f64>, c: Coord<f64>) -> bool {
    let (min, max) = (bounds.min(), bounds.max());
    c.x >= min.x && c.x <= max.x && c.y >= min.y && c.y <= max.y
}
