//! State-change notifications for the presentation layer.
//!
//! The engine never exposes mutable fields for a UI to observe; every
//! visible transition is published here instead.

use std::fmt;

use tokio::sync::broadcast;
use vantage_model::{AssetId, DownloadState, QualityTier};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The cursor landed on an index whose asset is not cached yet
    Loading { index: usize, asset_id: AssetId },
    /// The current asset (or a prefetched neighbour) was published
    AssetReady {
        index: usize,
        asset_id: AssetId,
        tier: QualityTier,
    },
    /// The displayed preview was replaced with the original
    QualityUpgraded { index: usize, asset_id: AssetId },
    /// The current index stayed in the loading state past the timeout
    LoadTimedOut { index: usize, asset_id: AssetId },
    ThumbnailReady { index: usize, asset_id: AssetId },
    PreBuffered {
        asset_id: AssetId,
        buffered: u64,
        total_length: u64,
    },
    DownloadQueued { asset_id: AssetId },
    DownloadProgress {
        asset_id: AssetId,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    },
    DownloadFinished {
        asset_id: AssetId,
        state: DownloadState,
    },
}

/// In-process fan-out of [`EngineEvent`]s.
///
/// Sending never blocks and never fails; with no subscribers the event is
/// dropped, and slow subscribers observe `Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}
