//! Offline download queue.
//!
//! Persists full-quality bytes for individual assets into the durable
//! store under [`QualityTier::Offline`]. Downloads are owned by the queue,
//! not by the window cache, so they keep running across navigation and
//! window teardown.

mod progress;

pub use progress::ProgressThrottle;

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vantage_model::{
    AssetId, CachedAsset, DownloadState, DownloadTask, QualityTier, RemoteVariant,
};

use crate::{
    error::{EngineError, Result},
    events::{EngineEvent, EventBus},
    ports::DurableStore,
    remote::RemoteAssets,
};

/// Result of [`OfflineQueue::request_offline_save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineSaveOutcome {
    /// A durable copy already exists
    AlreadyOffline,
    /// The resident full-quality payload was persisted without a download
    SavedFromMemory,
    /// A download task was queued
    Started,
    /// A download for this asset is already running; nothing was started
    InProgress,
}

struct Slot {
    task: DownloadTask,
    token: CancellationToken,
}

struct QueueInner {
    remote: RemoteAssets,
    store: Arc<dyn DurableStore>,
    events: EventBus,
    progress_interval: Duration,
    slots: Mutex<HashMap<AssetId, Slot>>,
    permits: Arc<Semaphore>,
    runtime: Handle,
}

#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("active", &self.inner.slots.lock().len())
            .field("available_permits", &self.inner.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl OfflineQueue {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        remote: RemoteAssets,
        store: Arc<dyn DurableStore>,
        events: EventBus,
        progress_interval: Duration,
        max_concurrent: usize,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            EngineError::Config(format!("offline queue needs a Tokio runtime: {e}"))
        })?;
        Ok(Self {
            inner: Arc::new(QueueInner {
                remote,
                store,
                events,
                progress_interval,
                slots: Mutex::new(HashMap::new()),
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
                runtime,
            }),
        })
    }

    /// Make `asset_id` available offline.
    ///
    /// `resident` is the window cache's entry for the asset, if any; a
    /// full-quality payload there is written straight to the store.
    pub async fn request_offline_save(
        &self,
        asset_id: AssetId,
        resident: Option<CachedAsset>,
    ) -> Result<OfflineSaveOutcome> {
        let inner = &self.inner;
        if inner.store.exists(asset_id, QualityTier::Offline).await? {
            debug!("offline copy already present; asset_id={asset_id}");
            return Ok(OfflineSaveOutcome::AlreadyOffline);
        }
        if inner.slots.lock().contains_key(&asset_id) {
            debug!("offline download already running; asset_id={asset_id}");
            return Ok(OfflineSaveOutcome::InProgress);
        }

        if let Some(asset) = resident.filter(|a| a.asset_id == asset_id && a.has_full_payload()) {
            inner
                .store
                .put(asset_id, QualityTier::Offline, asset.payload)
                .await?;
            info!("persisted resident asset for offline use; asset_id={asset_id}");
            return Ok(OfflineSaveOutcome::SavedFromMemory);
        }

        let token = CancellationToken::new();
        {
            let mut slots = inner.slots.lock();
            if slots.contains_key(&asset_id) {
                return Ok(OfflineSaveOutcome::InProgress);
            }
            slots.insert(
                asset_id,
                Slot {
                    task: DownloadTask::queued(asset_id),
                    token: token.clone(),
                },
            );
        }
        inner.events.publish(EngineEvent::DownloadQueued { asset_id });
        info!("queued offline download; asset_id={asset_id}");

        let task_inner = Arc::clone(inner);
        inner
            .runtime
            .spawn(async move { task_inner.run(asset_id, token).await });
        Ok(OfflineSaveOutcome::Started)
    }

    /// Cancel a queued or running download. Returns whether one existed.
    pub fn cancel(&self, asset_id: AssetId) -> bool {
        match self.inner.slots.lock().get(&asset_id) {
            Some(slot) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn task(&self, asset_id: AssetId) -> Option<DownloadTask> {
        self.inner
            .slots
            .lock()
            .get(&asset_id)
            .map(|slot| slot.task.clone())
    }

    pub fn active_tasks(&self) -> Vec<DownloadTask> {
        self.inner
            .slots
            .lock()
            .values()
            .map(|slot| slot.task.clone())
            .collect()
    }

    pub fn is_downloading(&self, asset_id: AssetId) -> bool {
        self.inner.slots.lock().contains_key(&asset_id)
    }
}

impl QueueInner {
    async fn run(&self, asset_id: AssetId, token: CancellationToken) {
        let result = tokio::select! {
            _ = token.cancelled() => Err(EngineError::Cancelled(format!("offline download {asset_id}"))),
            result = self.download_and_store(asset_id) => result,
        };

        let state = match result {
            Ok(bytes) => {
                info!("offline download complete; asset_id={asset_id}, bytes={bytes}");
                DownloadState::Done
            }
            Err(e) if e.is_cancelled() => {
                debug!("offline download cancelled; asset_id={asset_id}");
                DownloadState::Cancelled
            }
            Err(e) => {
                warn!("offline download failed; asset_id={asset_id}, err={e}");
                DownloadState::Failed {
                    reason: e.to_string(),
                }
            }
        };

        self.slots.lock().remove(&asset_id);
        self.events
            .publish(EngineEvent::DownloadFinished { asset_id, state });
    }

    /// Returns the number of bytes persisted.
    ///
    /// The whole body is held in memory until the single `put`, because
    /// [`DurableStore`] takes a complete payload; peak memory per download
    /// is the asset's size, and at most `max_concurrent` downloads hold a
    /// buffer at once. The upfront reservation is capped at 256 MiB.
    async fn download_and_store(&self, asset_id: AssetId) -> Result<u64> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Cancelled("download queue closed".into()))?;
        self.update(asset_id, |task| task.state = DownloadState::Downloading);

        let mut response = self
            .remote
            .open(asset_id, RemoteVariant::Original, None)
            .await?;
        let total = response.content_length;
        self.update(asset_id, |task| task.total_bytes = total);

        let mut throttle = ProgressThrottle::new(self.progress_interval);
        let mut buf = Vec::with_capacity(total.unwrap_or(0).min(256 * 1024 * 1024) as usize);
        while let Some(chunk) = response.body.next().await {
            buf.extend_from_slice(&chunk?);
            let downloaded = buf.len() as u64;
            if throttle.ready() {
                self.report(asset_id, downloaded, total);
            }
        }

        let downloaded = buf.len() as u64;
        if let Some(total) = total
            && downloaded != total
        {
            return Err(EngineError::Network(format!(
                "body ended after {downloaded} of {total} bytes"
            )));
        }
        if downloaded == 0 {
            return Err(EngineError::NotFound(format!("empty original for {asset_id}")));
        }
        self.report(asset_id, downloaded, total);

        self.store
            .put(asset_id, QualityTier::Offline, Bytes::from(buf))
            .await?;
        Ok(downloaded)
    }

    fn update(&self, asset_id: AssetId, f: impl FnOnce(&mut DownloadTask)) {
        if let Some(slot) = self.slots.lock().get_mut(&asset_id) {
            f(&mut slot.task);
        }
    }

    fn report(&self, asset_id: AssetId, downloaded_bytes: u64, total_bytes: Option<u64>) {
        self.update(asset_id, |task| task.downloaded_bytes = downloaded_bytes);
        self.events.publish(EngineEvent::DownloadProgress {
            asset_id,
            downloaded_bytes,
            total_bytes,
        });
    }
}
