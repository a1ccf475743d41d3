//! Photo pipeline: upload, display copies, terrain elevation, edits.

use super::{Context, EnrichError, Enricher, Result, Upload, blocking, store_upload};
use crate::external::elevation::to_lookup;
use crate::geo::GeoPoint;
use crate::imaging::{
    CaptureMetadata, ImageAsset, ImageEditor, OutputFormat, TransformSpec, apply_edit,
    create_thumbnail, resize_for_display,
};
use crate::naming::UploadKind;
use crate::store::{NewPhoto, PhotoPatch, PhotoRecord, RecordId};
use crate::track::CoordKey;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Quarter-turn direction for [`Enricher::rotate_photo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Counter-clockwise.
    Left,
    /// Clockwise.
    Right,
}

impl Direction {
    fn degrees(self) -> f64 {
        match self {
            Direction::Left => 90.0,
            Direction::Right => -90.0,
        }
    }
}

/// `spec` with one more quarter turn, normalized to `[0, 360)`.
fn rotated_spec(mut spec: TransformSpec, direction: Direction) -> TransformSpec {
    let angle = (spec.rotate.unwrap_or(0.0) + direction.degrees()).rem_euclid(360.0);
    spec.rotate = (angle != 0.0).then_some(angle);
    spec
}

impl Enricher {
    /// Store an uploaded photo and create its record.
    ///
    /// Dimensions and EXIF capture metadata are read before returning;
    /// resizing, the thumbnail and terrain elevation follow as jobs.
    pub async fn upload_photo(&self, flight_id: RecordId, upload: Upload) -> Result<PhotoRecord> {
        let filename = store_upload(&self.ctx.paths.photos, &upload, UploadKind::Photo).await?;
        let asset = self.ctx.photo_asset(&filename);

        let images = Arc::clone(&self.ctx.images);
        let path = asset.current_path();
        let inspected = blocking(move || {
            let dims = images.identify(&path)?;
            let metadata = images.read_metadata(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "unreadable EXIF, storing without it");
                CaptureMetadata::default()
            });
            Ok((dims, metadata))
        })
        .await;
        let (dims, metadata) = match inspected {
            Ok(found) => found,
            Err(e) => {
                if let Err(cleanup) = asset.remove_files() {
                    warn!(file = %filename, error = %cleanup, "could not remove rejected upload");
                }
                return Err(e);
            }
        };

        let photo = self
            .ctx
            .store
            .create_photo(NewPhoto {
                flight_id,
                filename,
                width: Some(dims.width),
                height: Some(dims.height),
                taken_at: metadata.taken_at,
                gps: metadata.gps,
                gps_altitude: metadata.altitude,
            })
            .await?;
        info!(photo = photo.id, flight = flight_id, file = %photo.filename, "photo stored");

        self.jobs
            .submit("photo.display", display_copies(self.ctx.clone(), photo.id, asset));
        if let Some(gps) = photo.gps {
            self.jobs
                .submit("photo.elevation", photo_elevation(self.ctx.clone(), photo.id, gps));
        }
        Ok(photo)
    }

    /// Apply `spec` to the photo's untouched original and replace the
    /// current file. Stores the new dimensions and the applied transform.
    pub async fn edit_photo(&self, photo_id: RecordId, spec: TransformSpec) -> Result<PhotoRecord> {
        let photo = self.ctx.store.get_photo(photo_id).await?;
        let asset = self.ctx.photo_asset(&photo.filename);
        let _guard = self.ctx.lock_photo(&photo.filename).await;

        let images = Arc::clone(&self.ctx.images);
        let quality = self.ctx.settings.quality;
        let target = asset.clone();
        let dims = blocking(move || Ok(apply_edit(images.as_ref(), &target, spec, quality)?)).await?;

        let photo = self
            .ctx
            .store
            .update_photo(
                photo_id,
                PhotoPatch {
                    width: Some(dims.width),
                    height: Some(dims.height),
                    adjustment: Some(spec),
                    ..PhotoPatch::default()
                },
            )
            .await?;
        debug!(photo = photo_id, ?spec, "photo edited");

        self.jobs
            .submit("photo.thumbnail", regenerate_thumbnail(self.ctx.clone(), asset));
        Ok(photo)
    }

    /// Turn the photo a quarter, keeping the rest of its last edit.
    pub async fn rotate_photo(
        &self,
        photo_id: RecordId,
        direction: Direction,
    ) -> Result<PhotoRecord> {
        let photo = self.ctx.store.get_photo(photo_id).await?;
        let spec = rotated_spec(photo.adjustment.unwrap_or_default(), direction);
        self.edit_photo(photo_id, spec).await
    }

    /// JPEG bytes of `spec` applied to the photo, scaled to preview height
    /// first. Nothing is written.
    pub async fn preview(&self, photo_id: RecordId, spec: TransformSpec) -> Result<Vec<u8>> {
        let photo = self.ctx.store.get_photo(photo_id).await?;
        let asset = self.ctx.photo_asset(&photo.filename);
        let height = self.ctx.settings.preview_height;
        let quality = self.ctx.settings.quality;

        blocking(move || {
            let editor = ImageEditor::open(&asset.edit_source())?
                .resize(None, Some(height))?
                .apply(&spec);
            Ok(editor.encode(OutputFormat::Jpeg, quality)?)
        })
        .await
    }

    /// Look up terrain elevation for every photo that has GPS but no
    /// elevation yet, in one request. Returns how many photos were updated.
    pub async fn backfill_photo_elevation(&self) -> Result<usize> {
        let photos = self.ctx.store.photos_missing_elevation().await?;
        let points: Vec<GeoPoint> = photos.iter().filter_map(|p| p.gps).collect();
        if points.is_empty() {
            return Ok(0);
        }

        let lookup = to_lookup(&self.ctx.elevation.lookup(&points).await?);
        let mut updated = 0;
        for photo in &photos {
            let Some(elevation) = photo.gps.and_then(|gps| lookup.get(CoordKey::from(gps))) else {
                continue;
            };
            self.ctx
                .store
                .update_photo(photo.id, PhotoPatch::terrain_elevation(elevation))
                .await?;
            updated += 1;
        }
        info!(updated, candidates = photos.len(), "photo elevation backfill");
        Ok(updated)
    }
}

/// Shrink the current file to display width, then regenerate the thumbnail.
///
/// Skipped once the photo has been edited: the edit already rewrote the
/// current file from the original and owns its dimensions.
async fn display_copies(ctx: Context, photo_id: RecordId, asset: ImageAsset) -> Result<()> {
    let _guard = ctx.lock_photo(asset.filename()).await;
    if asset.has_original() {
        debug!(photo = photo_id, "photo already edited, display copies skipped");
        return Ok(());
    }

    let images = Arc::clone(&ctx.images);
    let settings = Arc::clone(&ctx.settings);
    let resized = blocking(move || {
        let resized = resize_for_display(images.as_ref(), &asset, &settings.display)?;
        create_thumbnail(images.as_ref(), &asset, &settings.thumbnail)?;
        Ok(resized)
    })
    .await?;

    if let Some(dims) = resized {
        ctx.store
            .update_photo(photo_id, PhotoPatch::dimensions(dims.width, dims.height))
            .await?;
        debug!(photo = photo_id, width = dims.width, height = dims.height, "photo resized");
    }
    Ok(())
}

async fn regenerate_thumbnail(ctx: Context, asset: ImageAsset) -> Result<()> {
    let _guard = ctx.lock_photo(asset.filename()).await;
    let images = Arc::clone(&ctx.images);
    let config = ctx.settings.thumbnail;
    let path = blocking(move || Ok(create_thumbnail(images.as_ref(), &asset, &config)?)).await?;
    debug!(thumbnail = %path.display(), "thumbnail written");
    Ok(())
}

async fn photo_elevation(ctx: Context, photo_id: RecordId, gps: GeoPoint) -> Result<()> {
    let results = ctx.elevation.lookup(&[gps]).await?;
    match to_lookup(&results).get(CoordKey::from(gps)) {
        Some(elevation) => {
            ctx.store
                .update_photo(photo_id, PhotoPatch::terrain_elevation(elevation))
                .await?;
            debug!(photo = photo_id, elevation, "photo terrain elevation stored");
        }
        None => debug!(photo = photo_id, "no terrain elevation for photo position"),
    }
    Ok(())
}
