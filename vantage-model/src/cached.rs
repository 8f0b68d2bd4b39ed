use bytes::Bytes;

use crate::{
    asset::MediaKind, ids::AssetId, image::ImagePlanes, quality::QualityTier,
};

/// Decoded, displayable payload for one asset.
///
/// Exactly one instance exists per id inside the window cache; an upgrade
/// replaces the whole value rather than mutating it.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedAsset {
    pub asset_id: AssetId,
    pub kind: MediaKind,
    /// Encoded source bytes; empty for stream markers
    pub payload: Bytes,
    pub planes: ImagePlanes,
    pub is_spatial: bool,
    pub tier: QualityTier,
}

impl CachedAsset {
    /// Placeholder for a video whose bytes are served by a streaming bridge.
    pub fn stream_marker(asset_id: AssetId, tier: QualityTier) -> Self {
        Self {
            asset_id,
            kind: MediaKind::Video,
            payload: Bytes::new(),
            planes: ImagePlanes::Stream,
            is_spatial: false,
            tier,
        }
    }

    pub fn is_stream_marker(&self) -> bool {
        matches!(self.planes, ImagePlanes::Stream)
    }

    /// A complete source payload that can be persisted without refetching.
    pub fn has_full_payload(&self) -> bool {
        self.tier.is_full_quality() && !self.payload.is_empty()
    }
}

impl std::fmt::Debug for CachedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAsset")
            .field("asset_id", &self.asset_id)
            .field("kind", &self.kind)
            .field("payload_bytes", &self.payload.len())
            .field("planes", &self.planes)
            .field("is_spatial", &self.is_spatial)
            .field("tier", &self.tier)
            .finish()
    }
}
