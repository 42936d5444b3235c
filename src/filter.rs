//! Discards line strips that stray too far from a map's center.

use geo::{MultiLineString, Point};
use tracing::debug;
use uom::si::f64::Length;
use uom::si::length::{meter, nautical_mile};

/// Mean earth radius of the spherical model.
pub const EARTH_RADIUS_METRES: f64 = 6_371_000.0;

/// Nautical miles per metre used for the radius check. Slightly larger than
/// `uom`'s exact 1/1852, which would keep points a few centimetres further out.
pub const NAUTICAL_MILES_PER_METRE: f64 = 0.000_539_957;

/// Distance in nautical miles as the radius check sees it.
pub fn nautical_miles(distance: Length) -> f64 {
    distance.get::<meter>() * NAUTICAL_MILES_PER_METRE
}

/// Great-circle distance between two lon/lat points using the haversine formula.
pub fn haversine_distance(a: Point, b: Point) -> Length {
    let (lat1, lng1) = (a.y().to_radians(), a.x().to_radians());
    let (lat2, lng2) = (b.y().to_radians(), b.x().to_radians());
    let (dlat, dlng) = (lat2 - lat1, lng2 - lng1);

    let x = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * x.sqrt().atan2((1.0 - x).sqrt());

    Length::new::<meter>(EARTH_RADIUS_METRES * c)
}

/// Keeps only the strips whose points all lie within `max_radius` of `center`.
///
/// Strips are accepted or rejected as a whole, partial strips are never produced.
pub fn retain_within(lines: MultiLineString, center: Point, max_radius: Length) -> MultiLineString {
    let max_radius = max_radius.get::<nautical_mile>();
    let total = lines.0.len();
    let retained: MultiLineString = lines
        .into_iter()
        .filter(|strip| {
            strip
                .points()
                .all(|point| nautical_miles(haversine_distance(point, center)) <= max_radius)
        })
        .collect();

    if retained.0.len() < total {
        debug!(
            "dropped {} of {total} line strips beyond radius",
            total - retained.0.len()
        );
    }

    retained
}
