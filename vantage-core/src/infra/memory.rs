use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use vantage_model::{AssetId, QualityTier};

use crate::{
    error::Result,
    ports::{DurableStore, SpatialClassifier, TokenProvider},
};

/// Durable-store stand-in kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<(AssetId, QualityTier), Bytes>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: AssetId, tier: QualityTier) -> bool {
        self.entries.contains_key(&(id, tier))
    }

    /// Number of successful `put` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn exists(&self, id: AssetId, tier: QualityTier) -> Result<bool> {
        Ok(self.contains(id, tier))
    }

    async fn get(&self, id: AssetId, tier: QualityTier) -> Result<Option<Bytes>> {
        Ok(self.entries.get(&(id, tier)).map(|e| e.value().clone()))
    }

    async fn put(
        &self,
        id: AssetId,
        tier: QualityTier,
        bytes: Bytes,
    ) -> Result<()> {
        self.entries.insert((id, tier), bytes);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySpatialClassifier {
    spatial: DashSet<AssetId>,
}

impl MemorySpatialClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialClassifier for MemorySpatialClassifier {
    fn is_known_spatial(&self, id: AssetId) -> bool {
        self.spatial.contains(&id)
    }

    fn mark_spatial(&self, id: AssetId) {
        self.spatial.insert(id);
    }
}

/// Fixed token, for services using long-lived API keys.
#[derive(Clone)]
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticTokenProvider").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
