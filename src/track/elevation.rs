use super::point::CoordKey;
use crate::geo::GeoPoint;
use std::collections::HashMap;

/// Terrain elevation by rounded coordinate, built from one batched lookup.
///
/// Keys are exact [`CoordKey`]s: a point only matches a result that rounds
/// to the same six decimal places. When the service returns the same
/// coordinate twice the later value wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElevationLookup {
    values: HashMap<CoordKey, f64>,
}

impl ElevationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: GeoPoint, elevation: f64) {
        self.values.insert(position.into(), elevation);
    }

    pub fn get(&self, key: CoordKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(GeoPoint, f64)> for ElevationLookup {
    fn from_iter<I: IntoIterator<Item = (GeoPoint, f64)>>(iter: I) -> Self {
        let mut lookup = Self::new();
        for (position, elevation) in iter {
            lookup.insert(position, elevation);
        }
        lookup
    }
}
