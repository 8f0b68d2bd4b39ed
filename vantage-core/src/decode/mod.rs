//! Turning fetched bytes into displayable planes.

pub mod container;

use bytes::Bytes;
use image::DynamicImage;
use tracing::debug;
use vantage_model::{
    AssetId, CachedAsset, DecodedImage, ImagePlanes, MediaKind, QualityTier,
};

use crate::error::{EngineError, Result};

fn to_plane(image: DynamicImage) -> DecodedImage {
    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    DecodedImage::new(width, height, Bytes::from(rgba.into_raw()))
}

/// Decode an image payload into one flat plane or a stereo pair.
///
/// Containers with two or more frames are treated as left/right eyes
/// (frames 0 and 1); anything else decodes as a single image.
pub fn decode_planes(bytes: &[u8]) -> Result<ImagePlanes> {
    if bytes.is_empty() {
        return Err(EngineError::Decode("empty payload".into()));
    }

    let frames = container::jpeg_frames(bytes);
    if frames.len() >= 2 {
        let left = image::load_from_memory(&bytes[frames[0].clone()])?;
        let right = image::load_from_memory(&bytes[frames[1].clone()])?;
        return Ok(ImagePlanes::Stereo {
            left: to_plane(left),
            right: to_plane(right),
        });
    }

    let flat = image::load_from_memory(bytes)?;
    Ok(ImagePlanes::Flat(to_plane(flat)))
}

/// Decode a fetched image into a cache entry at `tier`.
pub fn decode_image_asset(
    asset_id: AssetId,
    payload: Bytes,
    tier: QualityTier,
) -> Result<CachedAsset> {
    let planes = decode_planes(&payload)?;
    let is_spatial = planes.is_stereo();
    debug!(
        "decoded asset; asset_id={asset_id}, tier={tier}, spatial={is_spatial}, bytes={}",
        payload.len()
    );
    Ok(CachedAsset {
        asset_id,
        kind: MediaKind::Image,
        payload,
        planes,
        is_spatial,
        tier,
    })
}

/// Same as [`decode_image_asset`] but off the async executor.
pub async fn decode_image_asset_blocking(
    asset_id: AssetId,
    payload: Bytes,
    tier: QualityTier,
) -> Result<CachedAsset> {
    tokio::task::spawn_blocking(move || {
        decode_image_asset(asset_id, payload, tier)
    })
    .await
    .map_err(|e| EngineError::Decode(format!("decode task failed: {e}")))?
}
