// geo.rs
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Width of one grid bucket in degrees. Roughly 55 km at the equator.
const CELL_SIZE_DEG: f64 = 0.5;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Longitude must be a finite number between -180 and 180, got {0}")]
    InvalidLongitude(f64),

    #[error("Latitude must be a finite number between -90 and 90, got {0}")]
    InvalidLatitude(f64),

    #[error("Distance must be a positive number of meters, got {0}")]
    InvalidDistance(f64),
}

/// A WGS84 position. Construct through [`GeoPoint::new`] so that the
/// coordinate ranges are always checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, GeoError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        Ok(Self { longitude, latitude })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance_m(self, other)
    }

    pub fn to_geojson(&self) -> GeoJsonPoint {
        GeoJsonPoint::from(*self)
    }
}

/// `{ "type": "Point", "coordinates": [lon, lat] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoJsonPoint {
    /// For coordinates already validated on the way in.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        GeoJsonPoint {
            kind: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        GeoJsonPoint {
            kind: "Point".to_string(),
            coordinates: [point.longitude, point.latitude],
        }
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn validate_distance(max_distance_m: f64) -> Result<f64, GeoError> {
    if !max_distance_m.is_finite() || max_distance_m <= 0.0 {
        return Err(GeoError::InvalidDistance(max_distance_m));
    }
    Ok(max_distance_m)
}

/// Degree rectangle that contains every point within a radius of a center.
/// Used as a cheap prefilter ahead of the exact haversine cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
}

impl BoundingBox {
    pub fn around(center: &GeoPoint, radius_m: f64) -> Self {
        let angular = radius_m / EARTH_RADIUS_M;
        let lat = center.latitude.to_radians();
        let min_lat = lat - angular;
        let max_lat = lat + angular;

        let half_pi = std::f64::consts::FRAC_PI_2;
        if min_lat <= -half_pi || max_lat >= half_pi || angular >= std::f64::consts::PI {
            // a pole is inside the circle
            return BoundingBox {
                min_longitude: -180.0,
                max_longitude: 180.0,
                min_latitude: min_lat.max(-half_pi).to_degrees(),
                max_latitude: max_lat.min(half_pi).to_degrees(),
            };
        }

        let delta_lon = (angular.sin() / lat.cos()).clamp(-1.0, 1.0).asin().to_degrees();
        let min_lon = center.longitude - delta_lon;
        let max_lon = center.longitude + delta_lon;

        if min_lon < -180.0 || max_lon > 180.0 {
            // crosses the antimeridian, keep every longitude
            return BoundingBox {
                min_longitude: -180.0,
                max_longitude: 180.0,
                min_latitude: min_lat.to_degrees(),
                max_latitude: max_lat.to_degrees(),
            };
        }

        BoundingBox {
            min_longitude: min_lon,
            max_longitude: max_lon,
            min_latitude: min_lat.to_degrees(),
            max_latitude: max_lat.to_degrees(),
        }
    }
}

type Cell = (i32, i32);

fn cell_of(longitude: f64, latitude: f64) -> Cell {
    (
        (longitude / CELL_SIZE_DEG).floor() as i32,
        (latitude / CELL_SIZE_DEG).floor() as i32,
    )
}

/// Grid-bucketed spatial index keyed by record id.
///
/// Radius queries only visit buckets overlapping the query's bounding box,
/// then apply the exact haversine cutoff and sort nearest first.
#[derive(Debug, Default, Clone)]
pub struct GeoIndex {
    positions: HashMap<Uuid, GeoPoint>,
    cells: HashMap<Cell, HashSet<Uuid>>,
}

impl GeoIndex {
    /// Insert or move an entry.
    pub fn insert(&mut self, id: Uuid, point: GeoPoint) {
        self.remove(id);
        self.cells
            .entry(cell_of(point.longitude, point.latitude))
            .or_default()
            .insert(id);
        self.positions.insert(id, point);
    }

    pub fn remove(&mut self, id: Uuid) -> Option<GeoPoint> {
        let point = self.positions.remove(&id)?;
        let cell = cell_of(point.longitude, point.latitude);
        if let Some(bucket) = self.cells.get_mut(&cell) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
        Some(point)
    }

    /// Entries within `max_distance_m` of `center`, nearest first.
    /// Entries beyond the cutoff are never returned.
    pub fn find_nearby(&self, center: &GeoPoint, max_distance_m: f64) -> Vec<(Uuid, f64)> {
        let bbox = BoundingBox::around(center, max_distance_m);
        let (min_x, min_y) = cell_of(bbox.min_longitude, bbox.min_latitude);
        let (max_x, max_y) = cell_of(bbox.max_longitude, bbox.max_latitude);

        let span = (max_x - min_x + 1) as usize * (max_y - min_y + 1) as usize;
        let mut hits: Vec<(Uuid, f64)> = if span > self.cells.len() {
            // fewer occupied buckets than the box covers, walk them directly
            self.cells
                .iter()
                .filter(|((x, y), _)| (min_x..=max_x).contains(x) && (min_y..=max_y).contains(y))
                .flat_map(|(_, ids)| ids.iter())
                .filter_map(|id| self.within(center, *id, max_distance_m))
                .collect()
        } else {
            let mut hits = Vec::new();
            for x in min_x..=max_x {
                for y in min_y..=max_y {
                    if let Some(ids) = self.cells.get(&(x, y)) {
                        hits.extend(
                            ids.iter()
                                .filter_map(|id| self.within(center, *id, max_distance_m)),
                        );
                    }
                }
            }
            hits
        };

        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    fn within(&self, center: &GeoPoint, id: Uuid, max_distance_m: f64) -> Option<(Uuid, f64)> {
        let point = self.positions.get(&id)?;
        let distance = haversine_distance_m(center, point);
        (distance <= max_distance_m).then_some((id, distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).unwrap()
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert_eq!(GeoPoint::new(181.0, 0.0), Err(GeoError::InvalidLongitude(181.0)));
        assert_eq!(GeoPoint::new(0.0, -90.5), Err(GeoError::InvalidLatitude(-90.5)));
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
        assert!(GeoPoint::new(-180.0, 90.0).is_ok());
    }

    #[test]
    fn haversine_matches_known_distances() {
        let bangalore = point(77.5946, 12.9716);
        let chennai = point(80.2707, 13.0827);
        let d = haversine_distance_m(&bangalore, &chennai);
        assert!((d - 290_000.0).abs() < 5_000.0, "got {d}");

        assert_eq!(haversine_distance_m(&bangalore, &bangalore), 0.0);

        // one degree of latitude
        let d = haversine_distance_m(&point(0.0, 0.0), &point(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn geojson_is_longitude_first() {
        let json = serde_json::to_value(point(77.5946, 12.9716).to_geojson()).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"][0], 77.5946);
        assert_eq!(json["coordinates"][1], 12.9716);
    }

    #[test]
    fn bounding_box_widens_across_antimeridian_and_poles() {
        let bbox = BoundingBox::around(&point(179.9, 0.0), 50_000.0);
        assert_eq!(bbox.min_longitude, -180.0);
        assert_eq!(bbox.max_longitude, 180.0);

        let bbox = BoundingBox::around(&point(10.0, 89.9), 50_000.0);
        assert_eq!(bbox.min_longitude, -180.0);
        assert!((bbox.max_latitude - 90.0).abs() < 1e-9);

        let center = point(77.5946, 12.9716);
        let bbox = BoundingBox::around(&center, 10_000.0);
        assert!(bbox.min_longitude < center.longitude() && center.longitude() < bbox.max_longitude);
        assert!(bbox.min_latitude < center.latitude() && center.latitude() < bbox.max_latitude);
        assert!(bbox.min_longitude > 0.0);
    }

    #[test]
    fn find_nearby_applies_hard_cutoff_and_orders_by_distance() {
        let mut index = GeoIndex::default();
        let near = Uuid::new_v4();
        let nearer = Uuid::new_v4();
        let far = Uuid::new_v4();
        let center = point(77.5946, 12.9716);

        index.insert(near, point(77.65, 12.99)); // ~6 km
        index.insert(nearer, point(77.60, 12.975)); // <1 km
        index.insert(far, point(80.2707, 13.0827)); // ~290 km

        let hits = index.find_nearby(&center, 10_000.0);
        let ids: Vec<Uuid> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![nearer, near]);
        assert!(hits[0].1 <= hits[1].1);
    }

    #[test]
    fn find_nearby_returns_empty_when_nothing_matches() {
        let mut index = GeoIndex::default();
        assert!(index.find_nearby(&point(0.0, 0.0), 1_000.0).is_empty());

        index.insert(Uuid::new_v4(), point(77.5946, 12.9716));
        assert!(index.find_nearby(&point(0.0, 0.0), 1_000.0).is_empty());
    }

    #[test]
    fn moving_an_entry_updates_its_bucket() {
        let mut index = GeoIndex::default();
        let id = Uuid::new_v4();
        let bangalore = point(77.5946, 12.9716);

        index.insert(id, bangalore);
        assert_eq!(index.find_nearby(&bangalore, 10_000.0).len(), 1);

        index.insert(id, point(0.0, 0.0));
        assert!(index.find_nearby(&bangalore, 10_000.0).is_empty());
        assert_eq!(index.positions.len(), 1);

        assert!(index.remove(id).is_some());
        assert!(index.positions.is_empty());
        assert!(index.cells.is_empty());
    }

    #[test]
    fn find_nearby_sees_entries_across_the_antimeridian() {
        let mut index = GeoIndex::default();
        let id = Uuid::new_v4();
        index.insert(id, point(-179.95, 0.0));

        let hits = index.find_nearby(&point(179.95, 0.0), 20_000.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, id);
    }
}
