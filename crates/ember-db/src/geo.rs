//! Great-circle distance and the bounding-box prefilter used by discovery.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters of latitude per degree, used for the box approximation.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Haversine distance in meters between two (lat, lng) points.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Axis-aligned box around a center point. Deliberately an
/// over-approximation near latitude extremes; candidates are re-ranked by
/// exact distance downstream.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(lat: f64, lng: f64, radius_meters: f64) -> Self {
        let lat_degrees = radius_meters / METERS_PER_DEGREE;
        let lng_degrees = radius_meters / (METERS_PER_DEGREE * lat.to_radians().cos());
        BoundingBox {
            min_lat: lat - lat_degrees,
            max_lat: lat + lat_degrees,
            min_lng: lng - lng_degrees,
            max_lng: lng + lng_degrees,
        }
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}
