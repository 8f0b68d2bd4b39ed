use std::{
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use vantage_model::{AssetId, QualityTier};

use crate::{
    error::{EngineError, Result},
    ports::DurableStore,
};

/// Root directory managed by `cacache` (index plus content-addressed blobs).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AssetCacheRoot(PathBuf);

impl AssetCacheRoot {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for AssetCacheRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetCacheRoot").field(&self.0).finish()
    }
}

/// Stable, versioned key for one asset tier.
pub fn asset_cache_key(id: AssetId, tier: QualityTier) -> String {
    format!("assets/v1/{}/{}", id.0.as_simple(), tier.as_str())
}

/// Durable store over `cacache`; entries are integrity-checked on read.
#[derive(Clone, Debug)]
pub struct CacacheStore {
    root: AssetCacheRoot,
}

impl CacacheStore {
    pub fn new(root: AssetCacheRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &AssetCacheRoot {
        &self.root
    }
}

fn map_read_error(key: &str, err: cacache::Error) -> Option<EngineError> {
    match err {
        cacache::Error::EntryNotFound(_, _) => None,
        cacache::Error::IntegrityError(err) => Some(EngineError::Storage(
            format!("cache entry failed integrity check: {key} ({err})"),
        )),
        cacache::Error::SizeMismatch(wanted, actual) => {
            Some(EngineError::Storage(format!(
                "cache entry size mismatch: key={key}, wanted={wanted}, actual={actual}"
            )))
        }
        cacache::Error::IoError(_, msg) => {
            Some(EngineError::Storage(format!("cacache read I/O error: {msg}")))
        }
        cacache::Error::SerdeError(_, msg) => Some(EngineError::Storage(
            format!("cacache read serde error: {msg}"),
        )),
    }
}

#[async_trait]
impl DurableStore for CacacheStore {
    async fn exists(&self, id: AssetId, tier: QualityTier) -> Result<bool> {
        let key = asset_cache_key(id, tier);
        let meta = cacache::metadata(self.root.as_path(), &key)
            .await
            .map_err(|e| {
                EngineError::Storage(format!("cacache metadata failed: {e}"))
            })?;
        Ok(meta.is_some())
    }

    async fn get(&self, id: AssetId, tier: QualityTier) -> Result<Option<Bytes>> {
        let key = asset_cache_key(id, tier);
        match cacache::read(self.root.as_path(), &key).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) => match map_read_error(&key, e) {
                None => Ok(None),
                Some(err) => Err(err),
            },
        }
    }

    async fn put(
        &self,
        id: AssetId,
        tier: QualityTier,
        bytes: Bytes,
    ) -> Result<()> {
        let key = asset_cache_key(id, tier);
        let integrity = cacache::write(self.root.as_path(), &key, &bytes)
            .await
            .map_err(|e| {
                EngineError::Storage(format!("cacache write failed: {e}"))
            })?;
        debug!(
            "durable store write; key={key}, bytes={}, integrity={integrity}",
            bytes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn asset_cache_key_is_stable_and_versioned() {
        let id = AssetId(
            Uuid::parse_str("01234567-89ab-cdef-0123-456789abcdef").unwrap(),
        );
        assert_eq!(
            asset_cache_key(id, QualityTier::Offline),
            "assets/v1/0123456789abcdef0123456789abcdef/offline"
        );
    }

    #[tokio::test]
    async fn put_then_get_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            CacacheStore::new(AssetCacheRoot::new(dir.path().to_path_buf()));
        let id = AssetId::new();

        assert!(!store.exists(id, QualityTier::Offline).await.unwrap());
        assert!(store.get(id, QualityTier::Offline).await.unwrap().is_none());

        store
            .put(id, QualityTier::Offline, Bytes::from_static(b"payload"))
            .await
            .unwrap();

        assert!(store.exists(id, QualityTier::Offline).await.unwrap());
        assert!(!store.exists(id, QualityTier::Preview).await.unwrap());
        assert_eq!(
            store.get(id, QualityTier::Offline).await.unwrap().as_deref(),
            Some(&b"payload"[..])
        );
    }
}
