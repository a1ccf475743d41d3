//! Weather pipeline: one hourly sample per changed flight leg.

use super::{Context, Enricher, Result};
use crate::store::{FlightPatch, Leg, RecordId};
use tracing::{debug, info};

impl Enricher {
    /// Schedule a weather refresh for each changed leg of a flight.
    pub fn flight_legs_changed(&self, flight_id: RecordId, legs: &[Leg]) {
        for leg in Leg::BOTH.into_iter().filter(|l| legs.contains(l)) {
            let name = match leg {
                Leg::Takeoff => "weather.takeoff",
                Leg::Landing => "weather.landing",
            };
            self.jobs
                .submit(name, leg_weather(self.ctx.clone(), flight_id, leg));
        }
    }
}

/// Fetch the sample for the leg's airport and time, then update the leg's
/// weather record in place or create and link a new one.
///
/// Jobs for the same leg run one at a time, so a second refresh sees the
/// record the first one linked.
async fn leg_weather(ctx: Context, flight_id: RecordId, leg: Leg) -> Result<()> {
    let _guard = ctx.locks.lock(format!("weather:{flight_id}:{leg}")).await;
    let flight = ctx.store.get_flight(flight_id).await?;
    let record = flight.leg(leg);
    let (Some(airport_id), Some(at)) = (record.airport_id, record.at) else {
        debug!(flight = flight_id, %leg, "leg has no airport or time");
        return Ok(());
    };
    let airport = ctx.store.get_airport(airport_id).await?;
    let Some(position) = airport.position else {
        debug!(flight = flight_id, %leg, airport = %airport.icao_code, "airport has no coordinates");
        return Ok(());
    };

    let sample = ctx.weather.hourly_sample(at, position).await?;
    let weather_id = match record.weather_id {
        Some(id) => ctx.store.update_weather(id, sample).await?.id,
        None => {
            let created = ctx.store.create_weather(sample).await?;
            ctx.store
                .update_flight(flight_id, FlightPatch::weather(leg, created.id))
                .await?;
            created.id
        }
    };
    info!(flight = flight_id, %leg, weather = weather_id, "leg weather stored");
    Ok(())
}
