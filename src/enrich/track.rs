//! Track pipeline: replace a flight's GPX upload and merge terrain
//! elevation into a `terrain_` copy.

use super::{Context, Enricher, Result, Upload, blocking, store_upload};
use crate::external::ElevationService;
use crate::external::elevation::to_lookup;
use crate::geo::suggest_legs;
use crate::naming::UploadKind;
use crate::store::{AirportRecord, FlightPatch, FlightRecord, RecordId};
use crate::track::{TERRAIN_PREFIX, TrackDocument, TrackPoint, terrain_file_name};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Airports guessed for a flight from its track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirportSuggestion {
    pub takeoff: Option<AirportRecord>,
    pub landing: Option<AirportRecord>,
}

/// Parse `source`, look up terrain elevation for every point in one batched
/// call, and write the merged document to `target`.
///
/// Returns the merged document.
pub async fn merge_track_elevation(
    elevation: &dyn ElevationService,
    source: PathBuf,
    target: PathBuf,
) -> Result<TrackDocument> {
    let document = blocking(move || Ok(TrackDocument::parse(&source)?)).await?;
    let coordinates = document.coordinates().to_vec();
    let results = elevation.lookup(&coordinates).await?;
    let lookup = to_lookup(&results);

    blocking(move || {
        let merged = document.merge_terrain_elevation(&lookup)?;
        merged.write(&target)?;
        Ok(merged)
    })
    .await
}

/// Remove a stored track and its enriched copy, unless a flight still
/// references either of them. Missing files are fine.
async fn remove_unreferenced_track(ctx: &Context, filename: &str) {
    let base = filename.strip_prefix(TERRAIN_PREFIX).unwrap_or(filename);
    let names = [base.to_string(), terrain_file_name(base)];
    for name in &names {
        match ctx.store.flights_using_track(name).await {
            Ok(users) if users.is_empty() => {}
            Ok(users) => {
                debug!(file = %name, ?users, "track still referenced, kept");
                return;
            }
            Err(e) => {
                warn!(file = %name, error = %e, "track references unknown, kept");
                return;
            }
        }
    }
    for name in &names {
        if let Err(e) = tokio::fs::remove_file(ctx.paths.track(name)).await {
            debug!(file = %name, error = %e, "track file not removed");
        }
    }
}

impl Enricher {
    /// Replace the flight's track with `upload` and schedule terrain
    /// elevation enrichment for it.
    ///
    /// The previous files are removed only once the new upload is stored
    /// and the flight points at it; a rejected upload changes nothing.
    pub async fn replace_track(&self, flight_id: RecordId, upload: Upload) -> Result<FlightRecord> {
        let previous = self.ctx.store.get_flight(flight_id).await?.track_filename;

        let filename = store_upload(&self.ctx.paths.tracks, &upload, UploadKind::Track).await?;
        let flight = match self
            .ctx
            .store
            .update_flight(flight_id, FlightPatch::track(filename.clone(), false))
            .await
        {
            Ok(flight) => flight,
            Err(e) => {
                remove_unreferenced_track(&self.ctx, &filename).await;
                return Err(e.into());
            }
        };
        info!(flight = flight_id, file = %filename, "track stored");

        if let Some(previous) = previous {
            remove_unreferenced_track(&self.ctx, &previous).await;
        }

        self.jobs.submit(
            "track.elevation",
            enrich_track(self.ctx.clone(), flight_id, filename),
        );
        Ok(flight)
    }

    /// Takeoff and landing airports nearest to the first and last point of
    /// the flight's track. Empty when the flight has no track.
    pub async fn suggest_airports(&self, flight_id: RecordId) -> Result<AirportSuggestion> {
        let flight = self.ctx.store.get_flight(flight_id).await?;
        let Some(filename) = flight.track_filename else {
            return Ok(AirportSuggestion::default());
        };

        let path = self.ctx.paths.track(&filename);
        let (first, last) = blocking(move || {
            let document = TrackDocument::parse(&path)?;
            Ok((
                document.first_point().map(TrackPoint::position),
                document.last_point().map(TrackPoint::position),
            ))
        })
        .await?;

        let airports = self.ctx.store.airports().await?;
        let legs = suggest_legs(first, last, &airports, self.ctx.settings.max_match_km);
        Ok(AirportSuggestion {
            takeoff: legs.takeoff.cloned(),
            landing: legs.landing.cloned(),
        })
    }
}

async fn still_current(ctx: &Context, flight_id: RecordId, filename: &str) -> Result<bool> {
    let flight = ctx.store.get_flight(flight_id).await?;
    Ok(flight.track_filename.as_deref() == Some(filename))
}

async fn enrich_track(ctx: Context, flight_id: RecordId, filename: String) -> Result<()> {
    if !still_current(&ctx, flight_id, &filename).await? {
        debug!(flight = flight_id, file = %filename, "track replaced before enrichment");
        return Ok(());
    }

    let enriched = terrain_file_name(&filename);
    let merged = merge_track_elevation(
        ctx.elevation.as_ref(),
        ctx.paths.track(&filename),
        ctx.paths.track(&enriched),
    )
    .await?;

    // the flight may have moved on to a newer upload meanwhile
    if !still_current(&ctx, flight_id, &filename).await? {
        debug!(flight = flight_id, file = %filename, "track replaced during enrichment");
        remove_unreferenced_track(&ctx, &filename).await;
        return Ok(());
    }

    ctx.store
        .update_flight(flight_id, FlightPatch::track(enriched.clone(), true))
        .await?;
    info!(
        flight = flight_id,
        file = %enriched,
        points = merged.len(),
        matched = merged.terrain_elevations().len(),
        "track enriched"
    );
    Ok(())
}
