//! Leading-bytes cache for videos near the cursor.
//!
//! Each video within the pre-buffer radius gets its first `prefix_len`
//! bytes fetched with one ranged request so playback can start from memory
//! while the streaming bridge opens the network read for the rest.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vantage_model::{AssetId, ByteRange, PreBufferEntry, QualityTier, RemoteVariant};

use crate::{
    error::{EngineError, Result},
    events::{EngineEvent, EventBus},
    ports::DurableStore,
    remote::RemoteAssets,
};

#[derive(Debug)]
struct PendingPrefix {
    ticket: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Pending {
    by_id: HashMap<AssetId, PendingPrefix>,
    next_ticket: u64,
}

pub struct PreBufferCache {
    remote: RemoteAssets,
    store: Arc<dyn DurableStore>,
    events: EventBus,
    prefix_len: u64,
    entries: DashMap<AssetId, PreBufferEntry>,
    /// Ids whose prefix was handed to a stream; not refetched until they
    /// leave the radius
    consumed: DashSet<AssetId>,
    /// Completion writes into `entries` happen under this lock so a retain
    /// racing a finishing task cannot leave an out-of-radius entry behind.
    pending: Mutex<Pending>,
}

impl std::fmt::Debug for PreBufferCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreBufferCache")
            .field("prefix_len", &self.prefix_len)
            .field("entries", &self.entries.len())
            .field("pending", &self.pending.lock().by_id.len())
            .finish_non_exhaustive()
    }
}

impl PreBufferCache {
    pub fn new(
        remote: RemoteAssets,
        store: Arc<dyn DurableStore>,
        events: EventBus,
        prefix_len: u64,
    ) -> Self {
        Self {
            remote,
            store,
            events,
            prefix_len: prefix_len.max(1),
            entries: DashMap::new(),
            consumed: DashSet::new(),
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Start fetching the prefix for `asset_id` unless it is already
    /// buffered, consumed or pending. Returns whether a task was spawned.
    pub fn schedule(self: &Arc<Self>, asset_id: AssetId) -> bool {
        if self.entries.contains_key(&asset_id) || self.consumed.contains(&asset_id) {
            return false;
        }
        let (ticket, token) = {
            let mut pending = self.pending.lock();
            if pending.by_id.contains_key(&asset_id) {
                return false;
            }
            pending.next_ticket = pending.next_ticket.wrapping_add(1);
            let ticket = pending.next_ticket;
            let token = CancellationToken::new();
            pending.by_id.insert(
                asset_id,
                PendingPrefix {
                    ticket,
                    token: token.clone(),
                },
            );
            (ticket, token)
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = this.fetch_prefix(asset_id) => Some(result),
            };
            this.complete(asset_id, ticket, outcome);
        });
        true
    }

    async fn fetch_prefix(&self, asset_id: AssetId) -> Result<Option<PreBufferEntry>> {
        match self.store.exists(asset_id, QualityTier::Offline).await {
            Ok(true) => {
                debug!("skipping pre-buffer for offline video; asset_id={asset_id}");
                return Ok(None);
            }
            Ok(false) => {}
            Err(e) => warn!("offline lookup failed; asset_id={asset_id}, err={e}"),
        }

        let range = ByteRange::with_len(0, self.prefix_len)?;
        let mut response = self
            .remote
            .open(asset_id, RemoteVariant::Original, Some(range))
            .await?;
        let total_length = response.total_length().ok_or_else(|| {
            EngineError::Network(format!(
                "range response for {asset_id} carried no total length"
            ))
        })?;
        let content_type = response.content_type.clone();

        // A server ignoring `Range` answers 200 with the whole body; stop
        // reading once the prefix is full.
        let limit = self.prefix_len.min(total_length) as usize;
        let mut buf = Vec::with_capacity(limit);
        while buf.len() < limit {
            let Some(chunk) = response.body.next().await else {
                break;
            };
            let chunk = chunk?;
            let take = (limit - buf.len()).min(chunk.len());
            buf.extend_from_slice(&chunk[..take]);
        }

        Ok(Some(PreBufferEntry {
            asset_id,
            bytes: Bytes::from(buf),
            total_length,
            content_type,
        }))
    }

    fn complete(
        &self,
        asset_id: AssetId,
        ticket: u64,
        outcome: Option<Result<Option<PreBufferEntry>>>,
    ) {
        let mut pending = self.pending.lock();
        match pending.by_id.get(&asset_id) {
            Some(p) if p.ticket == ticket && !p.token.is_cancelled() => {
                pending.by_id.remove(&asset_id);
            }
            _ => {
                debug!("discarding superseded pre-buffer; asset_id={asset_id}");
                return;
            }
        }

        match outcome {
            Some(Ok(Some(entry))) => {
                let buffered = entry.buffered_len();
                let total_length = entry.total_length;
                self.entries.insert(asset_id, entry);
                drop(pending);
                debug!(
                    "pre-buffered video prefix; asset_id={asset_id}, buffered={buffered}, total={total_length}"
                );
                self.events.publish(EngineEvent::PreBuffered {
                    asset_id,
                    buffered,
                    total_length,
                });
            }
            Some(Ok(None)) => {}
            Some(Err(e)) => {
                warn!("pre-buffer failed; asset_id={asset_id}, err={e}");
            }
            None => debug!("pre-buffer cancelled; asset_id={asset_id}"),
        }
    }

    pub fn get(&self, asset_id: AssetId) -> Option<PreBufferEntry> {
        self.entries.get(&asset_id).map(|e| e.value().clone())
    }

    /// Remove and return the entry once a stream starts reading the
    /// network past the prefix.
    pub fn consume(&self, asset_id: AssetId) -> Option<PreBufferEntry> {
        self.consumed.insert(asset_id);
        self.entries.remove(&asset_id).map(|(_, entry)| entry)
    }

    pub fn contains(&self, asset_id: AssetId) -> bool {
        self.entries.contains_key(&asset_id)
    }

    pub fn is_pending(&self, asset_id: AssetId) -> bool {
        self.pending.lock().by_id.contains_key(&asset_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries, consumption marks and pending fetches for every id not
    /// in `keep`. Returns the number of entries removed.
    pub fn retain(&self, keep: &HashSet<AssetId>) -> usize {
        let mut pending = self.pending.lock();
        pending.by_id.retain(|id, p| {
            let kept = keep.contains(id);
            if !kept {
                p.token.cancel();
            }
            kept
        });
        self.consumed.retain(|id| keep.contains(id));
        let before = self.entries.len();
        self.entries.retain(|id, _| keep.contains(id));
        before - self.entries.len()
    }

    pub fn clear(&self) {
        self.retain(&HashSet::new());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{infra::MemoryStore, testing::FakeAssetService};
    use vantage_model::AssetRecord;

    fn cache(service: &FakeAssetService, store: Arc<MemoryStore>, len: u64) -> Arc<PreBufferCache> {
        Arc::new(PreBufferCache::new(
            service.remote(),
            store,
            EventBus::new(16),
            len,
        ))
    }

    async fn wait_until(cache: &PreBufferCache, id: AssetId) {
        for _ in 0..200 {
            if !cache.is_pending(id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pre-buffer never settled");
    }

    #[tokio::test]
    async fn fetches_exactly_the_prefix() {
        let service = FakeAssetService::new();
        let video = AssetRecord::video("clip.mp4");
        service.serve_video(&video, vec![7u8; 300 * 1024]);
        let cache = cache(&service, Arc::new(MemoryStore::new()), 100 * 1024);

        assert!(cache.schedule(video.id));
        assert!(!cache.schedule(video.id));
        wait_until(&cache, video.id).await;

        let entry = cache.get(video.id).expect("entry");
        assert_eq!(entry.buffered_len(), 100 * 1024);
        assert_eq!(entry.total_length, 300 * 1024);
        let requests = service
            .transport
            .requests_for(&service.url(video.id, RemoteVariant::Original));
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].range.map(|r| r.header_value()).as_deref(),
            Some("bytes=0-102399")
        );
    }

    #[tokio::test]
    async fn full_body_answers_are_truncated() {
        let service = FakeAssetService::new();
        let video = AssetRecord::video("clip.mp4");
        service.serve_video(&video, vec![1u8; 200 * 1024]);
        service
            .transport
            .ignore_range(&service.url(video.id, RemoteVariant::Original));
        let cache = cache(&service, Arc::new(MemoryStore::new()), 64 * 1024);

        cache.schedule(video.id);
        wait_until(&cache, video.id).await;

        let entry = cache.get(video.id).expect("entry");
        assert_eq!(entry.buffered_len(), 64 * 1024);
        assert_eq!(entry.total_length, 200 * 1024);
    }

    #[tokio::test]
    async fn offline_videos_are_skipped() {
        let service = FakeAssetService::new();
        let video = AssetRecord::video("clip.mp4");
        service.serve_video(&video, vec![1u8; 1024]);
        let store = Arc::new(MemoryStore::new());
        store
            .put(video.id, QualityTier::Offline, Bytes::from_static(b"local"))
            .await
            .unwrap();
        let cache = cache(&service, store, 512);

        cache.schedule(video.id);
        wait_until(&cache, video.id).await;
        assert!(cache.get(video.id).is_none());
        assert_eq!(service.count(video.id, RemoteVariant::Original), 0);
    }

    #[tokio::test]
    async fn retain_cancels_and_consumed_ids_are_not_refetched() {
        let service = FakeAssetService::new();
        let video = AssetRecord::video("clip.mp4");
        service.serve_video(&video, vec![1u8; 4096]);
        service.set_delay(video.id, RemoteVariant::Original, Duration::from_millis(200));
        let cache = cache(&service, Arc::new(MemoryStore::new()), 1024);

        cache.schedule(video.id);
        assert!(cache.is_pending(video.id));
        cache.clear();
        assert!(!cache.is_pending(video.id));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(cache.get(video.id).is_none());

        service.set_delay(video.id, RemoteVariant::Original, Duration::ZERO);
        cache.schedule(video.id);
        wait_until(&cache, video.id).await;
        assert!(cache.consume(video.id).is_some());
        assert!(!cache.schedule(video.id));
        assert!(cache.is_empty());
    }
}
