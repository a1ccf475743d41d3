//! Hourly weather from Open-Meteo.
//!
//! The forecast API also serves the recent past, while the archive only
//! has days that are at least a few days old. Everything seven or more days
//! back goes to the archive, everything newer to the forecast endpoint.
//! One response covers a whole day, so responses are cached per day and
//! location for six hours.

use super::{ServiceError, check_status, http_client};
use crate::geo::GeoPoint;
use crate::track::CoordKey;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Days in the past from which the archive endpoint is used.
pub const ARCHIVE_AFTER_DAYS: i64 = 7;

pub const CACHE_TTL: Duration = Duration::from_secs(6 * 3600);

pub const HOURLY_METRICS: [&str; 8] = [
    "pressure_msl",
    "temperature_2m",
    "dewpoint_2m",
    "rain",
    "cloudcover_low",
    "cloudcover",
    "windspeed_10m",
    "winddirection_10m",
];

/// Timestamps are requested and indexed in UTC.
const TIMEZONE: &str = "UTC";

const SERVICE: &str = "weather service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherEndpoint {
    Forecast,
    Archive,
}

/// Pick the endpoint for `date` as seen from `today`.
pub fn select_endpoint(today: NaiveDate, date: NaiveDate) -> WeatherEndpoint {
    if (today - date).num_days() >= ARCHIVE_AFTER_DAYS {
        WeatherEndpoint::Archive
    } else {
        WeatherEndpoint::Forecast
    }
}

/// One hourly observation, as stored on a flight leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub datetime: NaiveDateTime,
    pub qnh: Option<f64>,
    pub temperature_surface: Option<f64>,
    pub dewpoint_surface: Option<f64>,
    pub rain: Option<f64>,
    pub cloudcover_total: Option<f64>,
    pub cloudcover_low: Option<f64>,
    pub wind_speed_surface: Option<f64>,
    pub wind_direction_surface: Option<f64>,
}

/// The `hourly` block of a response. Newer metric spellings are accepted
/// as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct HourlySeries {
    time: Vec<String>,
    pressure_msl: Vec<Option<f64>>,
    temperature_2m: Vec<Option<f64>>,
    #[serde(alias = "dew_point_2m")]
    dewpoint_2m: Vec<Option<f64>>,
    rain: Vec<Option<f64>>,
    #[serde(alias = "cloud_cover_low")]
    cloudcover_low: Vec<Option<f64>>,
    #[serde(alias = "cloud_cover")]
    cloudcover: Vec<Option<f64>>,
    #[serde(alias = "wind_speed_10m")]
    windspeed_10m: Vec<Option<f64>>,
    #[serde(alias = "wind_direction_10m")]
    winddirection_10m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlySeries,
}

fn parse_response(body: &str) -> Result<HourlySeries, ServiceError> {
    serde_json::from_str::<ForecastResponse>(body)
        .map(|r| r.hourly)
        .map_err(|e| ServiceError::malformed(SERVICE, e.to_string()))
}

fn missing_hour(hour: usize) -> ServiceError {
    ServiceError::malformed(SERVICE, format!("no data for hour {hour}"))
}

fn value_at(series: &[Option<f64>], hour: usize) -> Result<Option<f64>, ServiceError> {
    series.get(hour).copied().ok_or_else(|| missing_hour(hour))
}

impl HourlySeries {
    /// Extract the sample at `hour` (index into the day's series).
    pub fn sample_at(&self, hour: usize) -> Result<WeatherSample, ServiceError> {
        let value = |series: &Vec<Option<f64>>| value_at(series, hour);

        let raw_time = self.time.get(hour).ok_or_else(|| missing_hour(hour))?;
        let datetime = NaiveDateTime::parse_from_str(raw_time, "%Y-%m-%dT%H:%M").map_err(|e| {
            ServiceError::malformed(SERVICE, format!("bad time '{raw_time}': {e}"))
        })?;

        Ok(WeatherSample {
            datetime,
            qnh: value(&self.pressure_msl)?,
            temperature_surface: value(&self.temperature_2m)?,
            dewpoint_surface: value(&self.dewpoint_2m)?,
            rain: value(&self.rain)?,
            cloudcover_total: value(&self.cloudcover)?,
            cloudcover_low: value(&self.cloudcover_low)?,
            wind_speed_surface: value(&self.windspeed_10m)?,
            wind_direction_surface: value(&self.winddirection_10m)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub date: NaiveDate,
    pub position: CoordKey,
}

/// Time-limited cache of per-day responses.
///
/// The clock is passed in so expiry is testable without sleeping.
#[derive(Debug)]
pub struct DayCache<V> {
    ttl: Duration,
    entries: HashMap<DayKey, (Instant, V)>,
}

impl<V: Clone> DayCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &DayKey, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|(stored, _)| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(_, v)| v.clone())
    }

    /// Store `value`, dropping entries that already expired.
    pub fn insert(&mut self, key: DayKey, value: V, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored, _)| now.saturating_duration_since(*stored) < ttl);
        self.entries.insert(key, (now, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    /// The hourly sample covering `at` at `position`.
    async fn hourly_sample(
        &self,
        at: DateTime<Utc>,
        position: GeoPoint,
    ) -> Result<WeatherSample, ServiceError>;
}

/// Open-Meteo client owning the forecast/archive choice and the day cache.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    forecast_url: String,
    archive_url: String,
    cache: Mutex<DayCache<Arc<HourlySeries>>>,
}

impl OpenMeteoClient {
    pub fn new(
        forecast_url: impl Into<String>,
        archive_url: impl Into<String>,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(timeout)?,
            forecast_url: forecast_url.into(),
            archive_url: archive_url.into(),
            cache: Mutex::new(DayCache::new(cache_ttl)),
        })
    }

    /// URL for one day at one position, as seen from `today`.
    pub fn day_url(
        &self,
        today: NaiveDate,
        date: NaiveDate,
        position: GeoPoint,
    ) -> Result<reqwest::Url, ServiceError> {
        let base = match select_endpoint(today, date) {
            WeatherEndpoint::Archive => &self.archive_url,
            WeatherEndpoint::Forecast => &self.forecast_url,
        };
        let day = date.format("%Y-%m-%d").to_string();
        reqwest::Url::parse_with_params(
            base,
            [
                ("latitude", position.latitude.to_string()),
                ("longitude", position.longitude.to_string()),
                ("timezone", TIMEZONE.to_string()),
                ("hourly", HOURLY_METRICS.join(",")),
                ("start_date", day.clone()),
                ("end_date", day),
            ],
        )
        .map_err(|e| ServiceError::malformed(SERVICE, format!("bad endpoint '{base}': {e}")))
    }

    fn cached(&self, key: &DayKey) -> Option<Arc<HourlySeries>> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(key, Instant::now()))
    }

    async fn download_day(
        &self,
        date: NaiveDate,
        position: GeoPoint,
    ) -> Result<Arc<HourlySeries>, ServiceError> {
        let key = DayKey {
            date,
            position: position.into(),
        };
        if let Some(hit) = self.cached(&key) {
            debug!(%date, "weather cache hit");
            return Ok(hit);
        }

        let url = self.day_url(Utc::now().date_naive(), date, position)?;
        debug!(url = url.as_str(), "weather request");
        let response = self.client.get(url).send().await?;
        let body = check_status(SERVICE, response)?.text().await?;
        let series = Arc::new(parse_response(&body)?);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&series), Instant::now());
        }
        Ok(series)
    }
}

#[async_trait]
impl WeatherService for OpenMeteoClient {
    async fn hourly_sample(
        &self,
        at: DateTime<Utc>,
        position: GeoPoint,
    ) -> Result<WeatherSample, ServiceError> {
        let series = self.download_day(at.date_naive(), position).await?;
        series.sample_at(at.hour() as usize)
    }
}
