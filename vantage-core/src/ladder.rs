//! Quality ladder: which tier to fetch for an asset, and from where.
//!
//! Lookup order is durable offline copy, then the on-disk tier cache, then
//! the network. Whatever comes from the network is written through to the
//! durable store so a revisit after eviction skips the download.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use vantage_model::{AssetId, AssetRecord, CachedAsset, QualityTier, RemoteVariant};

use crate::{
    decode::decode_image_asset_blocking,
    error::{EngineError, Result},
    ports::{DurableStore, SpatialClassifier},
    remote::RemoteAssets,
};

/// How an asset climbs the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderPlan {
    /// Videos: no bytes are held; the streaming bridge serves them
    StreamMarker,
    /// Known stereo assets: the preview endpoint drops the second plane
    OriginalOnly,
    /// Preview first, original after the settle delay
    PreviewFirst,
}

#[derive(Clone)]
pub struct QualityLadder {
    remote: RemoteAssets,
    store: Arc<dyn DurableStore>,
    classifier: Arc<dyn SpatialClassifier>,
}

impl std::fmt::Debug for QualityLadder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityLadder")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl QualityLadder {
    pub fn new(
        remote: RemoteAssets,
        store: Arc<dyn DurableStore>,
        classifier: Arc<dyn SpatialClassifier>,
    ) -> Self {
        Self {
            remote,
            store,
            classifier,
        }
    }

    pub fn remote(&self) -> &RemoteAssets {
        &self.remote
    }

    pub fn plan(&self, record: &AssetRecord) -> LadderPlan {
        if record.is_video() {
            LadderPlan::StreamMarker
        } else if record.is_spatial || self.classifier.is_known_spatial(record.id) {
            LadderPlan::OriginalOnly
        } else {
            LadderPlan::PreviewFirst
        }
    }

    /// Serve from the durable offline copy, if one exists.
    pub async fn load_offline(&self, record: &AssetRecord) -> Result<Option<CachedAsset>> {
        let id = record.id;
        if !self.store.exists(id, QualityTier::Offline).await? {
            return Ok(None);
        }
        if record.is_video() {
            return Ok(Some(CachedAsset::stream_marker(id, QualityTier::Offline)));
        }
        let Some(bytes) = self.store.get(id, QualityTier::Offline).await? else {
            return Ok(None);
        };
        debug!("serving asset from offline storage; asset_id={id}");
        let asset = decode_image_asset_blocking(id, bytes, QualityTier::Offline).await?;
        self.remember_spatial(&asset);
        Ok(Some(asset))
    }

    /// Fetch and decode one remote tier, consulting the on-disk copy first.
    pub async fn fetch_tier(
        &self,
        record: &AssetRecord,
        variant: RemoteVariant,
    ) -> Result<CachedAsset> {
        let id = record.id;
        let tier = variant.tier().ok_or_else(|| {
            EngineError::NotFound(format!("{variant} is not a display tier"))
        })?;

        let bytes = match self.store.get(id, tier).await {
            Ok(Some(bytes)) => {
                debug!("tier cache hit; asset_id={id}, tier={tier}");
                bytes
            }
            Ok(None) => self.download(id, variant, tier).await?,
            Err(e) => {
                warn!("tier cache read failed; asset_id={id}, tier={tier}, err={e}");
                self.download(id, variant, tier).await?
            }
        };

        let asset = decode_image_asset_blocking(id, bytes, tier).await?;
        self.remember_spatial(&asset);
        Ok(asset)
    }

    async fn download(
        &self,
        id: AssetId,
        variant: RemoteVariant,
        tier: QualityTier,
    ) -> Result<Bytes> {
        let bytes = self.remote.fetch(id, variant).await?;
        if let Err(e) = self.store.put(id, tier, bytes.clone()).await {
            warn!("tier cache write failed; asset_id={id}, tier={tier}, err={e}");
        }
        Ok(bytes)
    }

    /// Best tier reachable without the delayed upgrade: used for neighbours,
    /// where a preview is good enough until the cursor arrives.
    pub async fn fetch_settled(&self, record: &AssetRecord) -> Result<CachedAsset> {
        match self.plan(record) {
            LadderPlan::StreamMarker => Ok(CachedAsset::stream_marker(
                record.id,
                QualityTier::Original,
            )),
            LadderPlan::OriginalOnly => self.fetch_tier(record, RemoteVariant::Original).await,
            LadderPlan::PreviewFirst => self.fetch_preview_or_original(record).await,
        }
    }

    /// Preview, falling back to the original when the preview fails.
    pub async fn fetch_preview_or_original(
        &self,
        record: &AssetRecord,
    ) -> Result<CachedAsset> {
        match self.fetch_tier(record, RemoteVariant::Preview).await {
            Ok(asset) => Ok(asset),
            Err(e) if e.is_auth() || e.is_cancelled() => Err(e),
            Err(e) => {
                debug!(
                    "preview unavailable, fetching original; asset_id={}, err={e}",
                    record.id
                );
                self.fetch_tier(record, RemoteVariant::Original).await
            }
        }
    }

    fn remember_spatial(&self, asset: &CachedAsset) {
        if asset.is_spatial && !self.classifier.is_known_spatial(asset.asset_id) {
            debug!("classified asset as spatial; asset_id={}", asset.asset_id);
            self.classifier.mark_spatial(asset.asset_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        infra::{MemorySpatialClassifier, MemoryStore},
        testing::{FakeAssetService, fixtures},
    };

    fn ladder(
        service: &FakeAssetService,
        store: Arc<MemoryStore>,
        classifier: Arc<MemorySpatialClassifier>,
    ) -> QualityLadder {
        QualityLadder::new(service.remote(), store, classifier)
    }

    #[tokio::test]
    async fn preview_failure_falls_back_to_original() {
        let service = FakeAssetService::new();
        let record = AssetRecord::image("a.jpg");
        service.serve_image(&record, fixtures::jpeg(16, 16, 200));
        service.set_status(record.id, RemoteVariant::Preview, 500);
        let ladder = ladder(
            &service,
            Arc::new(MemoryStore::new()),
            Arc::new(MemorySpatialClassifier::new()),
        );

        let asset = ladder.fetch_settled(&record).await.unwrap();
        assert_eq!(asset.tier, QualityTier::Original);
        assert_eq!(service.count(record.id, RemoteVariant::Original), 1);
    }

    #[tokio::test]
    async fn downloads_are_written_through_and_reused() {
        let service = FakeAssetService::new();
        let record = AssetRecord::image("a.jpg");
        service.serve_image(&record, fixtures::jpeg(16, 16, 200));
        let store = Arc::new(MemoryStore::new());
        let ladder = ladder(
            &service,
            store.clone(),
            Arc::new(MemorySpatialClassifier::new()),
        );

        ladder.fetch_tier(&record, RemoteVariant::Original).await.unwrap();
        ladder.fetch_tier(&record, RemoteVariant::Original).await.unwrap();
        assert!(store.contains(record.id, QualityTier::Original));
        assert_eq!(service.count(record.id, RemoteVariant::Original), 1);
    }

    #[tokio::test]
    async fn stereo_originals_mark_the_asset_spatial() {
        let service = FakeAssetService::new();
        let record = AssetRecord::image("pair.mpo");
        service.serve_image(&record, fixtures::stereo_jpeg(8, 8));
        let classifier = Arc::new(MemorySpatialClassifier::new());
        let ladder = ladder(&service, Arc::new(MemoryStore::new()), classifier.clone());

        assert_eq!(ladder.plan(&record), LadderPlan::PreviewFirst);
        let asset = ladder.fetch_tier(&record, RemoteVariant::Original).await.unwrap();
        assert!(asset.is_spatial);
        assert_eq!(ladder.plan(&record), LadderPlan::OriginalOnly);
    }

    #[tokio::test]
    async fn offline_copy_wins_and_videos_become_markers() {
        let service = FakeAssetService::new();
        let store = Arc::new(MemoryStore::new());
        let image = AssetRecord::image("a.png");
        let video = AssetRecord::video("b.mp4");
        store
            .put(image.id, QualityTier::Offline, Bytes::from(fixtures::png(3, 3)))
            .await
            .unwrap();
        store
            .put(video.id, QualityTier::Offline, Bytes::from(fixtures::video_bytes(64)))
            .await
            .unwrap();
        let ladder = ladder(&service, store, Arc::new(MemorySpatialClassifier::new()));

        let asset = ladder.load_offline(&image).await.unwrap().expect("offline image");
        assert_eq!(asset.tier, QualityTier::Offline);
        let marker = ladder.load_offline(&video).await.unwrap().expect("offline video");
        assert!(marker.is_stream_marker());
        assert_eq!(marker.tier, QualityTier::Offline);
        assert!(service.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_preview_does_not_fall_back() {
        let service = FakeAssetService::new();
        let record = AssetRecord::image("a.jpg");
        service.serve_image(&record, fixtures::jpeg(4, 4, 1));
        service.set_status(record.id, RemoteVariant::Preview, 401);
        let ladder = ladder(
            &service,
            Arc::new(MemoryStore::new()),
            Arc::new(MemorySpatialClassifier::new()),
        );

        let err = ladder.fetch_settled(&record).await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(service.count(record.id, RemoteVariant::Original), 0);
    }
}
