//! Wiring of the engine's components around one set of collaborators.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;
use vantage_model::AssetId;

use crate::{
    config::EngineConfig,
    error::Result,
    events::{EngineEvent, EventBus},
    ladder::QualityLadder,
    offline::{OfflineQueue, OfflineSaveOutcome},
    ports::{DurableStore, HttpTransport, SpatialClassifier, TokenProvider},
    prebuffer::PreBufferCache,
    remote::{AssetEndpoints, RemoteAssets},
    streaming::StreamingBridge,
    window::WindowCache,
};

/// External dependencies the engine is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub endpoints: AssetEndpoints,
    pub transport: Arc<dyn HttpTransport>,
    pub tokens: Arc<dyn TokenProvider>,
    pub store: Arc<dyn DurableStore>,
    pub classifier: Arc<dyn SpatialClassifier>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Entry point for a viewer session.
pub struct ViewerEngine {
    config: EngineConfig,
    events: EventBus,
    remote: RemoteAssets,
    store: Arc<dyn DurableStore>,
    prebuffer: Arc<PreBufferCache>,
    window: WindowCache,
    offline: OfflineQueue,
}

impl std::fmt::Debug for ViewerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerEngine")
            .field("config", &self.config)
            .field("window", &self.window)
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}

impl ViewerEngine {
    /// Validate `config` and build every component. Must be called from
    /// within a Tokio runtime.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let Collaborators {
            endpoints,
            transport,
            tokens,
            store,
            classifier,
        } = collaborators;

        let events = EventBus::new(config.event_capacity);
        let remote = RemoteAssets::new(endpoints, transport, tokens);
        let prebuffer = Arc::new(PreBufferCache::new(
            remote.clone(),
            store.clone(),
            events.clone(),
            config.prebuffer_bytes,
        ));
        let ladder = QualityLadder::new(remote.clone(), store.clone(), classifier);
        let window = WindowCache::new(
            config.clone(),
            events.clone(),
            ladder,
            prebuffer.clone(),
        )?;
        let offline = OfflineQueue::new(
            remote.clone(),
            store.clone(),
            events.clone(),
            config.progress_interval,
            config.max_concurrent_downloads,
        )?;

        info!(
            "viewer engine ready; base={}, window_radius={}, prebuffer_radius={}",
            remote.endpoints().base(),
            config.window_radius,
            config.prebuffer_radius
        );
        Ok(Self {
            config,
            events,
            remote,
            store,
            prebuffer,
            window,
            offline,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn window(&self) -> &WindowCache {
        &self.window
    }

    pub fn offline(&self) -> &OfflineQueue {
        &self.offline
    }

    pub fn prebuffer(&self) -> &PreBufferCache {
        &self.prebuffer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Open a streaming bridge for a video.
    pub async fn open_stream(&self, asset_id: AssetId) -> Result<StreamingBridge> {
        StreamingBridge::open(
            asset_id,
            self.remote.clone(),
            self.prebuffer.clone(),
            self.store.as_ref(),
        )
        .await
    }

    /// Make an asset available offline, reusing the window cache's copy
    /// when it already holds full quality.
    pub async fn request_offline_save(&self, asset_id: AssetId) -> Result<OfflineSaveOutcome> {
        let resident = self.window.cached(asset_id);
        self.offline.request_offline_save(asset_id, resident).await
    }
}
