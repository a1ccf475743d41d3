//! Persistence boundary for the records the enrichment jobs touch.
//!
//! The logbook's real database sits behind [`RecordStore`]: create, get one
//! by id, and update by id with a patch. Jobs only ever write the fields
//! they own, expressed as a [`PhotoPatch`] or [`FlightPatch`], so two jobs
//! for the same record never overwrite each other.
//!
//! [`MemoryStore`] is the in-process implementation used by the CLI and the
//! tests. Its contents can be loaded from and saved to a JSON snapshot:
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_id": 4,
//!   "photos": {},
//!   "flights": { "1": { "id": 1, "track_filename": null, … } },
//!   "airports": { "2": { "id": 2, "icao_code": "LKTB", … } },
//!   "weather": {}
//! }
//! ```

use crate::external::WeatherSample;
use crate::geo::{GeoPoint, Locatable};
use crate::imaging::TransformSpec;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub type RecordId = u64;

/// Version of the JSON snapshot format.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: RecordId },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported snapshot version {0}")]
    Version(u32),
    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    fn not_found(kind: &'static str, id: RecordId) -> Self {
        Self::NotFound { kind, id }
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: RecordId,
    pub flight_id: RecordId,
    pub filename: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub taken_at: Option<NaiveDateTime>,
    pub gps: Option<GeoPoint>,
    pub gps_altitude: Option<f64>,
    pub terrain_elevation: Option<f64>,
    /// Last edit applied to the original.
    pub adjustment: Option<TransformSpec>,
}

/// Fields known when a photo is uploaded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewPhoto {
    pub flight_id: RecordId,
    pub filename: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub taken_at: Option<NaiveDateTime>,
    pub gps: Option<GeoPoint>,
    pub gps_altitude: Option<f64>,
}

/// Partial photo update; `None` leaves a field alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhotoPatch {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub terrain_elevation: Option<f64>,
    pub adjustment: Option<TransformSpec>,
}

impl PhotoPatch {
    pub fn dimensions(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn terrain_elevation(elevation: f64) -> Self {
        Self {
            terrain_elevation: Some(elevation),
            ..Self::default()
        }
    }

    fn apply(self, photo: &mut PhotoRecord) {
        if let Some(w) = self.width {
            photo.width = Some(w);
        }
        if let Some(h) = self.height {
            photo.height = Some(h);
        }
        if let Some(e) = self.terrain_elevation {
            photo.terrain_elevation = Some(e);
        }
        if let Some(a) = self.adjustment {
            photo.adjustment = Some(a);
        }
    }
}

/// One end of a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Takeoff,
    Landing,
}

impl Leg {
    pub const BOTH: [Leg; 2] = [Leg::Takeoff, Leg::Landing];
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Leg::Takeoff => "takeoff",
            Leg::Landing => "landing",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegRecord {
    pub airport_id: Option<RecordId>,
    pub at: Option<DateTime<Utc>>,
    pub weather_id: Option<RecordId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub id: RecordId,
    pub track_filename: Option<String>,
    #[serde(default)]
    pub has_terrain_elevation: bool,
    #[serde(default)]
    pub takeoff: LegRecord,
    #[serde(default)]
    pub landing: LegRecord,
}

impl FlightRecord {
    pub fn leg(&self, leg: Leg) -> &LegRecord {
        match leg {
            Leg::Takeoff => &self.takeoff,
            Leg::Landing => &self.landing,
        }
    }

    fn leg_mut(&mut self, leg: Leg) -> &mut LegRecord {
        match leg {
            Leg::Takeoff => &mut self.takeoff,
            Leg::Landing => &mut self.landing,
        }
    }
}

/// Partial flight update; `None` leaves a field alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightPatch {
    pub track_filename: Option<String>,
    pub has_terrain_elevation: Option<bool>,
    pub takeoff_weather_id: Option<RecordId>,
    pub landing_weather_id: Option<RecordId>,
}

impl FlightPatch {
    pub fn track(filename: impl Into<String>, has_terrain_elevation: bool) -> Self {
        Self {
            track_filename: Some(filename.into()),
            has_terrain_elevation: Some(has_terrain_elevation),
            ..Self::default()
        }
    }

    pub fn weather(leg: Leg, weather_id: RecordId) -> Self {
        match leg {
            Leg::Takeoff => Self {
                takeoff_weather_id: Some(weather_id),
                ..Self::default()
            },
            Leg::Landing => Self {
                landing_weather_id: Some(weather_id),
                ..Self::default()
            },
        }
    }

    fn apply(self, flight: &mut FlightRecord) {
        if let Some(name) = self.track_filename {
            flight.track_filename = Some(name);
        }
        if let Some(flag) = self.has_terrain_elevation {
            flight.has_terrain_elevation = flag;
        }
        if let Some(id) = self.takeoff_weather_id {
            flight.leg_mut(Leg::Takeoff).weather_id = Some(id);
        }
        if let Some(id) = self.landing_weather_id {
            flight.leg_mut(Leg::Landing).weather_id = Some(id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportRecord {
    pub id: RecordId,
    pub icao_code: String,
    pub name: String,
    pub position: Option<GeoPoint>,
    #[serde(default = "default_true")]
    pub usable_for_matching: bool,
}

fn default_true() -> bool {
    true
}

impl Locatable for AirportRecord {
    fn position(&self) -> Option<GeoPoint> {
        self.position
    }

    fn usable_for_matching(&self) -> bool {
        self.usable_for_matching
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub id: RecordId,
    pub sample: WeatherSample,
}

// ============================================================================
// Store interface
// ============================================================================

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, StoreError>;
    async fn get_photo(&self, id: RecordId) -> Result<PhotoRecord, StoreError>;
    async fn update_photo(&self, id: RecordId, patch: PhotoPatch)
    -> Result<PhotoRecord, StoreError>;
    /// Photos with a GPS position but no terrain elevation yet.
    async fn photos_missing_elevation(&self) -> Result<Vec<PhotoRecord>, StoreError>;

    async fn get_flight(&self, id: RecordId) -> Result<FlightRecord, StoreError>;
    async fn update_flight(
        &self,
        id: RecordId,
        patch: FlightPatch,
    ) -> Result<FlightRecord, StoreError>;
    /// Ids of the flights whose `track_filename` is exactly `filename`.
    async fn flights_using_track(&self, filename: &str) -> Result<Vec<RecordId>, StoreError>;

    async fn get_airport(&self, id: RecordId) -> Result<AirportRecord, StoreError>;
    async fn airports(&self) -> Result<Vec<AirportRecord>, StoreError>;

    async fn create_weather(&self, sample: WeatherSample) -> Result<WeatherRecord, StoreError>;
    async fn get_weather(&self, id: RecordId) -> Result<WeatherRecord, StoreError>;
    async fn update_weather(
        &self,
        id: RecordId,
        sample: WeatherSample,
    ) -> Result<WeatherRecord, StoreError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    next_id: RecordId,
    #[serde(default)]
    photos: BTreeMap<RecordId, PhotoRecord>,
    #[serde(default)]
    flights: BTreeMap<RecordId, FlightRecord>,
    #[serde(default)]
    airports: BTreeMap<RecordId, AirportRecord>,
    #[serde(default)]
    weather: BTreeMap<RecordId, WeatherRecord>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            next_id: 1,
            photos: BTreeMap::new(),
            flights: BTreeMap::new(),
            airports: BTreeMap::new(),
            weather: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    fn allocate_id(&mut self) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Keep `next_id` above every id already present.
    fn reserve(&mut self, id: RecordId) {
        self.next_id = self.next_id.max(id + 1);
    }
}

/// Mutex-guarded record maps. Ids are shared across record kinds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON snapshot. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Version(snapshot.version));
        }
        Ok(Self {
            inner: Mutex::new(snapshot),
        })
    }

    /// Save a JSON snapshot, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&*self.lock()?)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or replace a flight. Flights are created by the CRUD layer;
    /// this seeds the store.
    pub fn put_flight(&self, flight: FlightRecord) -> Result<(), StoreError> {
        let mut db = self.lock()?;
        db.reserve(flight.id);
        db.flights.insert(flight.id, flight);
        Ok(())
    }

    /// Insert or replace an airport.
    pub fn put_airport(&self, airport: AirportRecord) -> Result<(), StoreError> {
        let mut db = self.lock()?;
        db.reserve(airport.id);
        db.airports.insert(airport.id, airport);
        Ok(())
    }

    /// Point a flight leg at an airport and time, as a flight edit would.
    pub fn set_leg(
        &self,
        flight_id: RecordId,
        leg: Leg,
        airport_id: Option<RecordId>,
        at: Option<DateTime<Utc>>,
    ) -> Result<FlightRecord, StoreError> {
        let mut db = self.lock()?;
        let flight = db
            .flights
            .get_mut(&flight_id)
            .ok_or_else(|| StoreError::not_found("flight", flight_id))?;
        let record = flight.leg_mut(leg);
        record.airport_id = airport_id;
        record.at = at;
        Ok(flight.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, StoreError> {
        let mut db = self.lock()?;
        let record = PhotoRecord {
            id: db.allocate_id(),
            flight_id: photo.flight_id,
            filename: photo.filename,
            width: photo.width,
            height: photo.height,
            taken_at: photo.taken_at,
            gps: photo.gps,
            gps_altitude: photo.gps_altitude,
            terrain_elevation: None,
            adjustment: None,
        };
        db.photos.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_photo(&self, id: RecordId) -> Result<PhotoRecord, StoreError> {
        self.lock()?
            .photos
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("photo", id))
    }

    async fn update_photo(
        &self,
        id: RecordId,
        patch: PhotoPatch,
    ) -> Result<PhotoRecord, StoreError> {
        let mut db = self.lock()?;
        let photo = db
            .photos
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("photo", id))?;
        patch.apply(photo);
        Ok(photo.clone())
    }

    async fn photos_missing_elevation(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        Ok(self
            .lock()?
            .photos
            .values()
            .filter(|p| p.gps.is_some() && p.terrain_elevation.is_none())
            .cloned()
            .collect())
    }

    async fn get_flight(&self, id: RecordId) -> Result<FlightRecord, StoreError> {
        self.lock()?
            .flights
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("flight", id))
    }

    async fn update_flight(
        &self,
        id: RecordId,
        patch: FlightPatch,
    ) -> Result<FlightRecord, StoreError> {
        let mut db = self.lock()?;
        let flight = db
            .flights
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("flight", id))?;
        patch.apply(flight);
        Ok(flight.clone())
    }

    async fn flights_using_track(&self, filename: &str) -> Result<Vec<RecordId>, StoreError> {
        Ok(self
            .lock()?
            .flights
            .values()
            .filter(|f| f.track_filename.as_deref() == Some(filename))
            .map(|f| f.id)
            .collect())
    }

    async fn get_airport(&self, id: RecordId) -> Result<AirportRecord, StoreError> {
        self.lock()?
            .airports
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("airport", id))
    }

    async fn airports(&self) -> Result<Vec<AirportRecord>, StoreError> {
        Ok(self.lock()?.airports.values().cloned().collect())
    }

    async fn create_weather(&self, sample: WeatherSample) -> Result<WeatherRecord, StoreError> {
        let mut db = self.lock()?;
        let record = WeatherRecord {
            id: db.allocate_id(),
            sample,
        };
        db.weather.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_weather(&self, id: RecordId) -> Result<WeatherRecord, StoreError> {
        self.lock()?
            .weather
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("weather", id))
    }

    async fn update_weather(
        &self,
        id: RecordId,
        sample: WeatherSample,
    ) -> Result<WeatherRecord, StoreError> {
        let mut db = self.lock()?;
        let record = db
            .weather
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("weather", id))?;
        record.sample = sample;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hour: u32) -> WeatherSample {
        WeatherSample {
            datetime: chrono::NaiveDate::from_ymd_opt(2023, 7, 14)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            qnh: Some(1015.0),
            temperature_surface: Some(18.0),
            dewpoint_surface: Some(11.0),
            rain: Some(0.0),
            cloudcover_total: Some(20.0),
            cloudcover_low: Some(5.0),
            wind_speed_surface: Some(6.0),
            wind_direction_surface: Some(250.0),
        }
    }

    #[tokio::test]
    async fn photo_patch_touches_only_its_fields() {
        let store = MemoryStore::new();
        let photo = store
            .create_photo(NewPhoto {
                flight_id: 1,
                filename: "a.jpg".into(),
                width: Some(4000),
                height: Some(3000),
                gps: Some(GeoPoint::new(49.5, 14.18)),
                ..NewPhoto::default()
            })
            .await
            .unwrap();

        store
            .update_photo(photo.id, PhotoPatch::terrain_elevation(350.0))
            .await
            .unwrap();
        let updated = store
            .update_photo(photo.id, PhotoPatch::dimensions(2500, 1875))
            .await
            .unwrap();

        assert_eq!(updated.terrain_elevation, Some(350.0));
        assert_eq!((updated.width, updated.height), (Some(2500), Some(1875)));
        assert_eq!(updated.gps, photo.gps);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_photo(42).await,
            Err(StoreError::NotFound { kind: "photo", id: 42 })
        ));
        assert!(matches!(
            store.update_flight(7, FlightPatch::default()).await,
            Err(StoreError::NotFound { kind: "flight", .. })
        ));
    }

    #[tokio::test]
    async fn weather_patch_links_one_leg() {
        let store = MemoryStore::new();
        store
            .put_flight(FlightRecord {
                id: 10,
                ..FlightRecord::default()
            })
            .unwrap();
        let weather = store.create_weather(sample(9)).await.unwrap();
        assert!(weather.id > 10, "ids continue after seeded records");

        let flight = store
            .update_flight(10, FlightPatch::weather(Leg::Landing, weather.id))
            .await
            .unwrap();
        assert_eq!(flight.landing.weather_id, Some(weather.id));
        assert_eq!(flight.takeoff.weather_id, None);
    }

    #[tokio::test]
    async fn flights_using_track_matches_exact_name() {
        let store = MemoryStore::new();
        for (id, track) in [(1, Some("a.gpx")), (2, Some("terrain_a.gpx")), (3, None)] {
            store
                .put_flight(FlightRecord {
                    id,
                    track_filename: track.map(String::from),
                    ..FlightRecord::default()
                })
                .unwrap();
        }
        assert_eq!(store.flights_using_track("a.gpx").await.unwrap(), vec![1]);
        assert_eq!(store.flights_using_track("terrain_a.gpx").await.unwrap(), vec![2]);
        assert!(store.flights_using_track("b.gpx").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn photos_missing_elevation_filters() {
        let store = MemoryStore::new();
        let with_gps = NewPhoto {
            flight_id: 1,
            filename: "gps.jpg".into(),
            gps: Some(GeoPoint::new(1.0, 2.0)),
            ..NewPhoto::default()
        };
        let a = store.create_photo(with_gps.clone()).await.unwrap();
        let b = store.create_photo(with_gps).await.unwrap();
        store
            .create_photo(NewPhoto {
                flight_id: 1,
                filename: "plain.jpg".into(),
                ..NewPhoto::default()
            })
            .await
            .unwrap();
        store
            .update_photo(b.id, PhotoPatch::terrain_elevation(1.0))
            .await
            .unwrap();

        let missing = store.photos_missing_elevation().await.unwrap();
        assert_eq!(missing.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a.id]);
    }

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("state").join("records.json");

        let store = MemoryStore::new();
        store
            .put_airport(AirportRecord {
                id: 3,
                icao_code: "LKTB".into(),
                name: "Brno".into(),
                position: Some(GeoPoint::new(49.15, 16.69)),
                usable_for_matching: true,
            })
            .unwrap();
        store.create_weather(sample(12)).await.unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded.get_airport(3).await.unwrap().icao_code, "LKTB");
        assert_eq!(loaded.airports().await.unwrap().len(), 1);
        let next = loaded.create_weather(sample(13)).await.unwrap();
        assert_eq!(next.id, 5);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let store = MemoryStore::load(Path::new("/nonexistent/records.json")).unwrap();
        assert!(store.lock().unwrap().photos.is_empty());
    }

    #[test]
    fn load_rejects_other_versions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(&path, r#"{"version": 99, "next_id": 1}"#).unwrap();
        assert!(matches!(
            MemoryStore::load(&path),
            Err(StoreError::Version(99))
        ));
    }

    #[test]
    fn airport_defaults_to_usable() {
        let airport: AirportRecord =
            serde_json::from_str(r#"{"id": 1, "icao_code": "LKPR", "name": "Praha", "position": null}"#)
                .unwrap();
        assert!(airport.usable_for_matching);
        assert!(Locatable::position(&airport).is_none());
    }
}
