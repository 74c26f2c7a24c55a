use serde::{Deserialize, Serialize};

use crate::models::vehicle::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Delivery pricing in rupees: a flat base plus a per-kilometre rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base: f64,
    pub per_km: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            base: 30.0,
            per_km: 10.0,
        }
    }
}

impl FeeSchedule {
    pub fn fee_for(&self, distance_km: f64) -> f64 {
        (self.base + self.per_km * distance_km.max(0.0)).round()
    }
}

/// Distance between two optional coordinates, rounded to 0.1 km. Unknown
/// endpoints count as zero distance so only the base fee applies.
pub fn route_distance_km(from: Option<&GeoPoint>, to: Option<&GeoPoint>) -> f64 {
    match (from, to) {
        (Some(from), Some(to)) => (haversine_km(from, to) * 10.0).round() / 10.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::{FeeSchedule, haversine_km, route_distance_km};
    use crate::models::vehicle::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 18.5204,
            lng: 73.8567,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn mumbai_to_pune_is_around_120_km() {
        let mumbai = GeoPoint {
            lat: 19.0760,
            lng: 72.8777,
        };
        let pune = GeoPoint {
            lat: 18.5204,
            lng: 73.8567,
        };
        let distance = haversine_km(&mumbai, &pune);
        assert!((distance - 120.0).abs() < 5.0);
    }

    #[test]
    fn fee_is_base_plus_rate_rounded() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee_for(0.0), 30.0);
        assert_eq!(fees.fee_for(2.46), 55.0);
        assert_eq!(fees.fee_for(-3.0), 30.0);
    }

    #[test]
    fn missing_coordinates_mean_zero_distance() {
        let p = GeoPoint { lat: 1.0, lng: 1.0 };
        assert_eq!(route_distance_km(Some(&p), None), 0.0);
        assert_eq!(route_distance_km(None, None), 0.0);
    }
}
