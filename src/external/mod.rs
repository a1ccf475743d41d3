//! Clients for the third-party services the enrichment jobs call.
//!
//! Each service is a trait so jobs can be tested against in-process fakes;
//! the HTTP implementations only know the request/response contract.
//!
//! | Trait | Implementation | Service |
//! |---|---|---|
//! | [`ElevationService`] | [`OpenElevationClient`] | Open-Elevation batched lookup |
//! | [`WeatherService`] | [`OpenMeteoClient`] | Open-Meteo forecast / archive, hourly |

pub mod elevation;
pub mod weather;

pub use elevation::{ElevationResult, ElevationService, OpenElevationClient};
pub use weather::{OpenMeteoClient, WeatherEndpoint, WeatherSample, WeatherService};

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },
    #[error("Malformed {service} response: {message}")]
    MalformedResponse {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service,
            message: message.into(),
        }
    }
}

/// Shared HTTP client setup: request timeout and a recognizable user agent.
fn http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()?)
}

/// Turn a non-2xx response into [`ServiceError::Status`].
fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ServiceError::Status {
            service,
            status: status.as_u16(),
        })
    }
}
