//! Terrain elevation lookup.
//!
//! Request and response follow the Open-Elevation API:
//!
//! ```text
//! POST {"locations": [{"latitude": 49.5, "longitude": 14.18}, …]}
//!   → {"results": [{"latitude": 49.5, "longitude": 14.18, "elevation": 350}, …]}
//! ```
//!
//! The service may drop or reorder coordinates, so callers correlate results
//! by rounded coordinate rather than by position in the list.

use super::{ServiceError, check_status, http_client};
use crate::geo::GeoPoint;
use crate::track::ElevationLookup;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const OPEN_ELEVATION_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

const SERVICE: &str = "elevation service";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct LookupRequest {
    locations: Vec<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationResult {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl ElevationResult {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<ElevationResult>,
}

/// Build an [`ElevationLookup`] from service results.
pub fn to_lookup(results: &[ElevationResult]) -> ElevationLookup {
    results.iter().map(|r| (r.position(), r.elevation)).collect()
}

#[async_trait]
pub trait ElevationService: Send + Sync {
    /// Elevation for every point the service could resolve.
    async fn lookup(&self, points: &[GeoPoint]) -> Result<Vec<ElevationResult>, ServiceError>;
}

fn request_body(points: &[GeoPoint]) -> LookupRequest {
    LookupRequest {
        locations: points
            .iter()
            .map(|p| Location {
                latitude: p.latitude,
                longitude: p.longitude,
            })
            .collect(),
    }
}

fn parse_response(body: &str) -> Result<Vec<ElevationResult>, ServiceError> {
    serde_json::from_str::<LookupResponse>(body)
        .map(|r| r.results)
        .map_err(|e| ServiceError::malformed(SERVICE, e.to_string()))
}

/// HTTP client for an Open-Elevation compatible endpoint.
pub struct OpenElevationClient {
    client: reqwest::Client,
    endpoint: String,
    batch_size: usize,
}

impl OpenElevationClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
            batch_size: batch_size.max(1),
        })
    }

    async fn lookup_batch(&self, points: &[GeoPoint]) -> Result<Vec<ElevationResult>, ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body(points))
            .send()
            .await?;
        let body = check_status(SERVICE, response)?.text().await?;
        parse_response(&body)
    }
}

#[async_trait]
impl ElevationService for OpenElevationClient {
    async fn lookup(&self, points: &[GeoPoint]) -> Result<Vec<ElevationResult>, ServiceError> {
        let mut results = Vec::with_capacity(points.len());
        for batch in points.chunks(self.batch_size) {
            debug!(endpoint = %self.endpoint, points = batch.len(), "elevation lookup");
            results.extend(self.lookup_batch(batch).await?);
        }
        Ok(results)
    }
}
