// src/distance.rs

use crate::geo::GeoPoint;

/* ---------------- CONSTANTES ---------------- */

// Miles per degree, flat-earth shortcut tuned for mid-latitudes.
pub const MILES_PER_DEGREE: f64 = 69.2;
// Average radius of the Earth in kilometers (spherical model).
const EARTH_RADIUS_KM: f64 = 6371.0;
const GEO_PRECISION: f64 = 1e-10;

/* ---------------- NUMERIC UTILS -------------- */

// Rounding to N decimal places (capped at 10).
pub fn round(value: f64, decimals: u32) -> f64 {
    let precision = decimals.min(10);
    let factor = 10_f64.powi(precision as i32);
    (value * factor).round() / factor
}

/* ---------------- PLANAR ESTIMATES --------------- */

// Equirectangular distance in miles: degree deltas treated as a flat
// grid, no cos(latitude) correction and no antimeridian wrap.
// Only meaningful for ranking places in the same region; do not compare
// its output with geodesic distances.
pub fn equirectangular_miles(reference: GeoPoint, point: GeoPoint) -> f64 {
    let dx = reference.latitude() - point.latitude();
    let dy = reference.longitude() - point.longitude();
    (dx * dx + dy * dy).sqrt() * MILES_PER_DEGREE
}

// Compass needle angle in degrees, range (-180, 180].
// atan2(Δlon, Δlat): 0 when the point lies due north of the reference
// on the degree grid, 90 when it lies due east.
pub fn bearing_degrees(reference: GeoPoint, point: GeoPoint) -> f64 {
    let d_lon = point.longitude() - reference.longitude();
    let d_lat = point.latitude() - reference.latitude();
    d_lon.atan2(d_lat).to_degrees()
}

/* ---------------- GREAT CIRCLE --------------- */

#[derive(Debug, thiserror::Error)]
pub enum HaversineError {
    #[error("invalid distance")]
    InvalidDistance,

    // A negative distance should never happen.
    #[error("negative distance `{dist}`")]
    NegativeDistance { dist: f64 },
}

// Great-circle distance in kilometers. Used for search radii, never
// for ranking.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> Result<f64, HaversineError> {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude() - a.longitude()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let distance = 2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt());

    if !distance.is_finite() {
        return Err(HaversineError::InvalidDistance);
    }
    if distance < -GEO_PRECISION {
        return Err(HaversineError::NegativeDistance { dist: distance });
    }

    Ok(distance)
}

/* ---------------- TEST ---------------- */
