//! Planar centroids for small polygons expressed in degrees.
//!
//! Parking bays span a few meters, so treating lon/lat as a flat plane is
//! well within the precision of the source data.

use super::GeoPoint;

/// Area-weighted centroid of a polygon (`rings[0]` outer, the rest holes).
///
/// Falls back to the mean of the outer ring's vertices when the polygon has
/// no area (collinear or repeated points). Returns `None` for an empty outer
/// ring.
pub fn polygon_centroid(rings: &[Vec<GeoPoint>]) -> Option<GeoPoint> {
    centroid_of(std::iter::once(rings))
}

/// Area-weighted centroid across several polygons.
pub fn multipolygon_centroid(polygons: &[Vec<Vec<GeoPoint>>]) -> Option<GeoPoint> {
    centroid_of(polygons.iter().map(Vec::as_slice))
}

fn centroid_of<'a, I>(polygons: I) -> Option<GeoPoint>
where
    I: Iterator<Item = &'a [Vec<GeoPoint>]> + Clone,
{
    let mut area_sum = 0.0;
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;

    for rings in polygons.clone() {
        for (ring_i, ring) in rings.iter().enumerate() {
            let Some((area, c)) = ring_area_centroid(ring) else {
                continue;
            };
            // Outer rings add, holes subtract, regardless of winding.
            let w = if ring_i == 0 { area.abs() } else { -area.abs() };
            area_sum += w;
            lat_sum += w * c.lat_deg;
            lon_sum += w * c.lon_deg;
        }
    }

    if area_sum.abs() > 1e-18 {
        return Some(GeoPoint::new(lat_sum / area_sum, lon_sum / area_sum));
    }

    vertex_mean(polygons.filter_map(|rings| rings.first()))
}

/// Signed shoelace area and centroid of one ring.
fn ring_area_centroid(ring: &[GeoPoint]) -> Option<(f64, GeoPoint)> {
    let pts = open_ring(ring);
    if pts.len() < 3 {
        return None;
    }

    // Shift to the first vertex to keep the cross products small.
    let origin = pts[0];
    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        let (x0, y0) = (a.lon_deg - origin.lon_deg, a.lat_deg - origin.lat_deg);
        let (x1, y1) = (b.lon_deg - origin.lon_deg, b.lat_deg - origin.lat_deg);
        let cross = x0 * y1 - x1 * y0;
        twice_area += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    if twice_area.abs() <= 1e-18 {
        return None;
    }
    let area = twice_area * 0.5;
    let inv = 1.0 / (3.0 * twice_area);
    Some((
        area,
        GeoPoint::new(origin.lat_deg + cy * inv, origin.lon_deg + cx * inv),
    ))
}

fn vertex_mean<'a>(rings: impl Iterator<Item = &'a Vec<GeoPoint>>) -> Option<GeoPoint> {
    let mut n = 0usize;
    let mut lat = 0.0;
    let mut lon = 0.0;
    for ring in rings {
        for p in open_ring(ring) {
            lat += p.lat_deg;
            lon += p.lon_deg;
            n += 1;
        }
    }
    if n == 0 {
        return None;
    }
    Some(GeoPoint::new(lat / n as f64, lon / n as f64))
}

/// Drops a closing vertex that repeats the first one.
fn open_ring(ring: &[GeoPoint]) -> &[GeoPoint] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() >= 2 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}
