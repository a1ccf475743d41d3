//! # logbook-media
//!
//! The media and telemetry side of a flight logbook: photo editing, GPX
//! track statistics, and best-effort enrichment from terrain-elevation and
//! weather services.
//!
//! # Architecture: Primary Write, Then Enrichment
//!
//! Every request that touches media does its essential work synchronously
//! and hands the slow, failure-prone rest to background jobs:
//!
//! ```text
//! 1. Store     upload   →  opaque file + primary record      (caller waits)
//! 2. Enrich    record   →  resize, thumbnail, elevation, weather (jobs)
//! ```
//!
//! A job that fails is logged and dropped. The primary record stays exactly
//! as the synchronous step left it, so a flaky third-party service can cost
//! a missing elevation value but never a lost upload.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`geo`] | Great-circle distance, nearest-airport matching, DMS conversion |
//! | [`imaging`] | Owned-value image editor, original-copy bookkeeping, EXIF, backend seam |
//! | [`track`] | GPX parsing, memoized series and summaries, terrain elevation merge |
//! | [`external`] | Elevation and weather service contracts and HTTP clients |
//! | [`store`] | Record persistence interface and the JSON-backed in-memory store |
//! | [`enrich`] | The `Enricher` facade and its fire-and-forget job queue |
//! | [`naming`] | Opaque, unique names for stored uploads |
//! | [`files`] | Replace-by-rename writes for stored files |
//! | [`config`] | `logbook.toml` loading, validation and merging |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Edits Never Stack
//!
//! The first destructive edit copies the stored photo to `_original_<name>`.
//! Every later edit starts from that copy and overwrites only the current
//! file, so rotating four times or re-cropping does not compound JPEG loss.
//!
//! ## Tracks Are Rewritten, Not Re-serialized
//!
//! Merging terrain elevation re-emits the uploaded XML event by event and
//! only inserts `<terrain_elevation>` where a point matched. Everything the
//! parser does not model (extensions, metadata, whitespace) survives.
//!
//! ## Coordinate Identity
//!
//! Elevation results are matched to points by coordinates rounded to six
//! decimal places, never by position in the response, because the service
//! may drop or reorder entries.

pub mod config;
pub mod enrich;
pub mod external;
pub mod files;
pub mod geo;
pub mod imaging;
pub mod logging;
pub mod naming;
pub mod output;
pub mod store;
pub mod track;

#[cfg(test)]
pub(crate) mod test_helpers;
