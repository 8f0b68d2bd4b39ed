//! Cursor-windowed memory cache.
//!
//! Holds decoded assets for indices within `window_radius` of the cursor
//! and thumbnails within `thumbnail_radius`. Every cursor move supersedes
//! the previous position's work: running tasks are cancelled and any result
//! they still produce fails the epoch check and is dropped.

mod pipeline;
pub mod state;

use std::{collections::HashSet, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vantage_model::{AssetId, AssetRecord, CachedAsset};

use crate::{
    config::EngineConfig,
    error::{EngineError, Result},
    events::{EngineEvent, EventBus},
    ladder::QualityLadder,
    prebuffer::PreBufferCache,
    prefetch::{self, PrefetchOutcome},
};

pub(crate) use pipeline::report_failure;
pub use state::{Epoch, PublishOutcome, window_bounds};
use state::{CacheState, SharedState};

/// Navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn apply(self, cursor: usize, len: usize) -> Option<usize> {
        match self {
            Direction::Forward => cursor.checked_add(1).filter(|next| *next < len),
            Direction::Backward => cursor.checked_sub(1),
        }
    }
}

/// What is available for an index without loading anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peek {
    Full(CachedAsset),
    Thumbnail(Bytes),
    Missing,
}

/// State and collaborators shared between the cache handle and its tasks.
pub(crate) struct WindowShared {
    pub config: EngineConfig,
    pub state: SharedState,
    pub events: EventBus,
    pub ladder: QualityLadder,
    pub prebuffer: Arc<PreBufferCache>,
}

impl WindowShared {
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.state.lock().is_current(epoch)
    }

    pub fn record_at(&self, index: usize) -> Option<AssetRecord> {
        self.state.lock().assets.get(index).cloned()
    }

    pub fn cached(&self, id: AssetId) -> Option<CachedAsset> {
        self.state.lock().memory.get(&id).cloned()
    }

    /// Write a load result if its epoch is still current.
    pub fn publish(
        &self,
        epoch: Epoch,
        index: usize,
        asset: CachedAsset,
    ) -> PublishOutcome {
        let asset_id = asset.asset_id;
        let tier = asset.tier;
        let outcome = self
            .state
            .lock()
            .publish(epoch, self.config.window_radius, asset);
        match outcome {
            PublishOutcome::Published => {
                debug!("published asset; index={index}, asset_id={asset_id}, tier={tier}");
                self.events.publish(EngineEvent::AssetReady {
                    index,
                    asset_id,
                    tier,
                });
            }
            other => {
                debug!(
                    "dropped load result; index={index}, asset_id={asset_id}, outcome={other:?}"
                );
            }
        }
        outcome
    }

    pub fn publish_upgrade(
        &self,
        epoch: Epoch,
        index: usize,
        asset: CachedAsset,
    ) -> PublishOutcome {
        let asset_id = asset.asset_id;
        let outcome = self.state.lock().publish_upgrade(epoch, index, asset);
        if outcome == PublishOutcome::Published {
            debug!("upgraded to original; index={index}, asset_id={asset_id}");
            self.events
                .publish(EngineEvent::QualityUpgraded { index, asset_id });
        } else {
            debug!("dropped upgrade; index={index}, asset_id={asset_id}, outcome={outcome:?}");
        }
        outcome
    }

    /// Whether the preview shown at `index` still wants its upgrade.
    pub fn upgrade_wanted(&self, epoch: Epoch, index: usize, id: AssetId) -> bool {
        let state = self.state.lock();
        state.is_current(epoch)
            && state.cursor == index
            && state
                .memory
                .get(&id)
                .is_some_and(|a| a.tier == vantage_model::QualityTier::Preview)
    }

    pub fn publish_thumbnail(
        &self,
        epoch: Epoch,
        index: usize,
        asset_id: AssetId,
        bytes: Bytes,
    ) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch)
                || !state.within(asset_id, self.config.thumbnail_radius)
            {
                return false;
            }
            state.thumbnails.insert(asset_id, bytes);
        }
        self.events
            .publish(EngineEvent::ThumbnailReady { index, asset_id });
        true
    }
}

struct CursorTasks {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl CursorTasks {
    fn cancel(self) {
        self.token.cancel();
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Handle to the window cache. All methods return immediately; loading
/// happens on background tasks spawned onto the runtime captured at
/// construction.
pub struct WindowCache {
    shared: Arc<WindowShared>,
    runtime: Handle,
    tasks: Mutex<Option<CursorTasks>>,
}

impl std::fmt::Debug for WindowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WindowCache")
            .field("len", &state.assets.len())
            .field("cursor", &state.cursor)
            .field("generation", &state.generation)
            .field("cached", &state.memory.len())
            .field("in_flight", &state.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl WindowCache {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: EngineConfig,
        events: EventBus,
        ladder: QualityLadder,
        prebuffer: Arc<PreBufferCache>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            EngineError::Config(format!("window cache needs a Tokio runtime: {e}"))
        })?;
        Ok(Self {
            shared: Arc::new(WindowShared {
                config,
                state: Arc::new(Mutex::new(CacheState::default())),
                events,
                ladder,
                prebuffer,
            }),
            runtime,
            tasks: Mutex::new(None),
        })
    }

    /// Replace the asset list and jump to `start`. Everything cached for
    /// the previous list is dropped.
    pub fn configure(&self, assets: Vec<AssetRecord>, start: usize) {
        let mut tasks = self.tasks.lock();
        let len = assets.len();
        let start = if len == 0 {
            0
        } else if start >= len {
            warn!("start index out of range, clamping; start={start}, len={len}");
            len - 1
        } else {
            start
        };

        let (epoch, current) = {
            let mut state = self.shared.state.lock();
            state.reset(assets, start);
            (state.epoch(), state.assets.get(start).cloned())
        };
        cancel_tasks(&mut tasks);
        self.shared.prebuffer.clear();
        info!("window configured; len={len}, cursor={start}");

        if let Some(record) = current {
            self.shared.events.publish(EngineEvent::Loading {
                index: start,
                asset_id: record.id,
            });
            *tasks = Some(self.spawn_cursor_tasks(epoch));
        }
    }

    /// Move the cursor by one. Returns `false` at either end of the list.
    ///
    /// Concurrent calls are serialized: the cursor move and the task swap
    /// happen under one lock, so the running tasks always belong to the
    /// latest position.
    pub fn advance(&self, direction: Direction) -> bool {
        {
            let mut tasks = self.tasks.lock();
            let (epoch, record, cached) = {
                let mut state = self.shared.state.lock();
                let Some(next) = direction.apply(state.cursor, state.assets.len()) else {
                    return false;
                };
                let epoch = state.move_cursor(next);
                let record = state.assets[next].clone();
                let cached = state.memory.contains_key(&record.id);
                (epoch, record, cached)
            };
            cancel_tasks(&mut tasks);
            debug!(
                "cursor moved; cursor={}, generation={}, asset_id={}, cached={cached}",
                epoch.cursor, epoch.generation, record.id
            );

            if !cached {
                self.shared.events.publish(EngineEvent::Loading {
                    index: epoch.cursor,
                    asset_id: record.id,
                });
            }
            *tasks = Some(self.spawn_cursor_tasks(epoch));
        }
        self.evict();
        true
    }

    /// Drop memory entries, thumbnails and pre-buffered prefixes outside
    /// their radii. Returns the number of memory and thumbnail entries
    /// removed.
    pub fn evict(&self) -> usize {
        let config = &self.shared.config;
        let (removed, keep) = {
            let mut state = self.shared.state.lock();
            let removed = state.evict(config.window_radius, config.thumbnail_radius);
            let keep: HashSet<AssetId> = state
                .window(config.prebuffer_radius)
                .map(|w| w.map(|i| state.assets[i].id).collect())
                .unwrap_or_default();
            (removed, keep)
        };
        let prefixes = self.shared.prebuffer.retain(&keep);
        if removed + prefixes > 0 {
            debug!("evicted outside window; entries={removed}, prefixes={prefixes}");
        }
        removed
    }

    pub fn peek(&self, index: usize) -> Peek {
        let state = self.shared.state.lock();
        let Some(record) = state.assets.get(index) else {
            return Peek::Missing;
        };
        if let Some(asset) = state.memory.get(&record.id) {
            Peek::Full(asset.clone())
        } else if let Some(thumb) = state.thumbnails.get(&record.id) {
            Peek::Thumbnail(thumb.clone())
        } else {
            Peek::Missing
        }
    }

    pub fn cached(&self, id: AssetId) -> Option<CachedAsset> {
        self.shared.cached(id)
    }

    pub fn cursor(&self) -> usize {
        self.shared.state.lock().cursor
    }

    pub fn epoch(&self) -> Epoch {
        self.shared.state.lock().epoch()
    }

    pub fn current(&self) -> Option<AssetRecord> {
        let state = self.shared.state.lock();
        state.assets.get(state.cursor).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices whose asset is in the memory map, ascending.
    pub fn cached_indices(&self) -> Vec<usize> {
        let state = self.shared.state.lock();
        let mut indices: Vec<usize> = state
            .memory
            .keys()
            .filter_map(|id| state.index_of.get(id).copied())
            .collect();
        indices.sort_unstable();
        indices
    }

    pub fn is_in_flight(&self, id: AssetId) -> bool {
        self.shared.state.lock().in_flight.contains_key(&id)
    }

    /// Load `index` at settled quality if it is inside the window and not
    /// already cached or loading.
    pub async fn prefetch_index(&self, index: usize) -> PrefetchOutcome {
        let epoch = self.epoch();
        prefetch::prefetch_one(&self.shared, epoch, index).await
    }

    /// Cancel everything and forget the list. Offline downloads are not
    /// affected.
    pub fn clear(&self) {
        let mut tasks = self.tasks.lock();
        self.shared.state.lock().reset(Vec::new(), 0);
        cancel_tasks(&mut tasks);
        self.shared.prebuffer.clear();
        info!("window cleared");
    }

    fn spawn_cursor_tasks(&self, epoch: Epoch) -> CursorTasks {
        let token = CancellationToken::new();
        let pipeline = self.runtime.spawn(pipeline::run(
            Arc::clone(&self.shared),
            epoch,
            token.clone(),
        ));
        let watchdog = self.runtime.spawn(pipeline::watchdog(
            Arc::clone(&self.shared),
            epoch,
            token.clone(),
        ));
        CursorTasks {
            token,
            handles: vec![pipeline, watchdog],
        }
    }
}

fn cancel_tasks(tasks: &mut Option<CursorTasks>) {
    if let Some(previous) = tasks.take() {
        previous.cancel();
    }
}

impl Drop for WindowCache {
    fn drop(&mut self) {
        cancel_tasks(self.tasks.get_mut());
    }
}
