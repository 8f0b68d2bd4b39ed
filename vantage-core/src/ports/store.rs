use async_trait::async_trait;
use bytes::Bytes;
use vantage_model::{AssetId, QualityTier};

use crate::error::Result;

/// Disk-backed bytes keyed by asset id and tier.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn exists(&self, id: AssetId, tier: QualityTier) -> Result<bool>;

    async fn get(&self, id: AssetId, tier: QualityTier) -> Result<Option<Bytes>>;

    async fn put(&self, id: AssetId, tier: QualityTier, bytes: Bytes)
    -> Result<()>;
}
