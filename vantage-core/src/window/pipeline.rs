//! Work started for one cursor position.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use vantage_model::{AssetRecord, CachedAsset, QualityTier, RemoteVariant};

use super::{
    Epoch, PublishOutcome, WindowShared,
    state::{BeginRefusal, begin_load, begin_upgrade},
};
use crate::{
    error::EngineError,
    events::EngineEvent,
    ladder::LadderPlan,
    prefetch::{self, neighbor_order},
};

/// Current-index load, then upgrade and neighbour prefetch side by side.
pub(super) async fn run(shared: Arc<WindowShared>, epoch: Epoch, token: CancellationToken) {
    schedule_prebuffer(&shared, epoch);

    tokio::select! {
        _ = token.cancelled() => {
            debug!("cursor pipeline cancelled; cursor={}, generation={}", epoch.cursor, epoch.generation);
        }
        _ = async {
            let upgrade = load_current(&shared, epoch).await;
            tokio::join!(
                async {
                    if let Some(upgrade) = upgrade {
                        upgrade.run(&shared).await;
                    }
                },
                prefetch::run(&shared, epoch),
            );
        } => {}
    }
}

/// Emit a timeout event if the current index is still loading once the
/// configured timeout elapses.
pub(super) async fn watchdog(shared: Arc<WindowShared>, epoch: Epoch, token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep(shared.config.loading_timeout) => {
            let stuck = {
                let state = shared.state.lock();
                state
                    .assets
                    .get(epoch.cursor)
                    .filter(|r| state.is_current(epoch) && !state.memory.contains_key(&r.id))
                    .map(|r| r.id)
            };
            if let Some(asset_id) = stuck {
                warn!(
                    "current asset still loading after {:?}; index={}, asset_id={asset_id}",
                    shared.config.loading_timeout, epoch.cursor
                );
                shared.events.publish(EngineEvent::LoadTimedOut {
                    index: epoch.cursor,
                    asset_id,
                });
            }
        }
    }
}

fn schedule_prebuffer(shared: &WindowShared, epoch: Epoch) {
    let videos: Vec<_> = {
        let state = shared.state.lock();
        if !state.is_current(epoch) {
            return;
        }
        let len = state.assets.len();
        std::iter::once(epoch.cursor)
            .chain(neighbor_order(epoch.cursor, shared.config.prebuffer_radius, len))
            .filter_map(|i| state.assets.get(i))
            .filter(|r| r.is_video())
            .map(|r| r.id)
            .collect()
    };
    for id in videos {
        shared.prebuffer.schedule(id);
    }
}

pub(super) struct PendingUpgrade {
    record: AssetRecord,
    index: usize,
    epoch: Epoch,
}

impl PendingUpgrade {
    async fn run(self, shared: &WindowShared) {
        let Self {
            record,
            index,
            epoch,
        } = self;
        tokio::time::sleep(shared.config.upgrade_settle_delay).await;
        if !shared.upgrade_wanted(epoch, index, record.id) {
            return;
        }
        let _guard = match begin_upgrade(&shared.state, epoch, record.id) {
            Ok(guard) => guard,
            Err(refusal) => {
                debug!("upgrade skipped; asset_id={}, reason={refusal:?}", record.id);
                return;
            }
        };
        match shared
            .ladder
            .fetch_tier(&record, RemoteVariant::Original)
            .await
        {
            Ok(asset) => {
                shared.publish_upgrade(epoch, index, asset);
            }
            // The preview stays up
            Err(e) => report_failure(&record, "upgrade", &e),
        }
    }
}

/// Run the ladder for the cursor's asset. Returns the upgrade still owed
/// when a preview was published.
async fn load_current(shared: &WindowShared, epoch: Epoch) -> Option<PendingUpgrade> {
    let index = epoch.cursor;
    let record = shared.record_at(index)?;
    let plan = shared.ladder.plan(&record);
    let upgrade = PendingUpgrade {
        record: record.clone(),
        index,
        epoch,
    };

    if let Some(existing) = shared.cached(record.id) {
        shared.events.publish(EngineEvent::AssetReady {
            index,
            asset_id: record.id,
            tier: existing.tier,
        });
        let owed = existing.tier == QualityTier::Preview && plan == LadderPlan::PreviewFirst;
        return owed.then_some(upgrade);
    }

    let _guard = match begin_load(&shared.state, epoch, record.id) {
        Ok(guard) => guard,
        Err(BeginRefusal::InFlight) => {
            debug!("current asset already loading; asset_id={}", record.id);
            return None;
        }
        Err(refusal) => {
            debug!("current load skipped; asset_id={}, reason={refusal:?}", record.id);
            return None;
        }
    };

    match shared.ladder.load_offline(&record).await {
        Ok(Some(asset)) => {
            shared.publish(epoch, index, asset);
            return None;
        }
        Ok(None) => {}
        Err(e) => warn!("offline read failed; asset_id={}, err={e}", record.id),
    }
    if !shared.is_current(epoch) {
        return None;
    }

    match plan {
        LadderPlan::StreamMarker => {
            shared.publish(
                epoch,
                index,
                CachedAsset::stream_marker(record.id, QualityTier::Original),
            );
            None
        }
        LadderPlan::OriginalOnly => {
            match shared
                .ladder
                .fetch_tier(&record, RemoteVariant::Original)
                .await
            {
                Ok(asset) => {
                    shared.publish(epoch, index, asset);
                }
                Err(e) => report_failure(&record, "original", &e),
            }
            None
        }
        LadderPlan::PreviewFirst => {
            match shared.ladder.fetch_preview_or_original(&record).await {
                Ok(asset) => {
                    let tier = asset.tier;
                    let published = shared.publish(epoch, index, asset);
                    (published == PublishOutcome::Published && tier == QualityTier::Preview)
                        .then_some(upgrade)
                }
                Err(e) => {
                    report_failure(&record, "preview", &e);
                    None
                }
            }
        }
    }
}

/// A failed load leaves the index in the loading state; the watchdog
/// reports it if it persists.
pub(crate) fn report_failure(record: &AssetRecord, stage: &str, err: &EngineError) {
    let id = record.id;
    match err {
        e if e.is_cancelled() => debug!("load cancelled; asset_id={id}, stage={stage}"),
        e if e.is_auth() => error!("asset service rejected credentials; asset_id={id}, stage={stage}"),
        EngineError::Decode(msg) => {
            warn!("undecodable payload; asset_id={id}, stage={stage}, err={msg}")
        }
        e => warn!("load failed; asset_id={id}, stage={stage}, err={e}"),
    }
}
