//! Neighbour prefetching around the cursor.
//!
//! Two passes run side by side once the current asset has loaded: a cheap
//! concurrent thumbnail sweep over `thumbnail_radius`, and a sequential
//! full-quality sweep over `window_radius` that walks forward neighbours
//! before backward ones. Both stop as soon as the cursor moves.

use futures::future::join_all;
use tracing::{debug, trace, warn};
use vantage_model::{AssetId, QualityTier, RemoteVariant};

use crate::window::{
    Epoch, PublishOutcome, WindowShared,
    state::{BeginRefusal, begin_load},
};

/// What a single prefetch attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    Published(QualityTier),
    AlreadyCached,
    /// Videos are streamed, never prefetched
    SkippedVideo,
    InFlight,
    /// The cursor moved before the attempt started
    Stale,
    OutOfRange,
    /// Loaded, but the cursor had moved on or the index left the window
    Discarded,
    Failed,
}

/// Neighbour indices within `radius` of `cursor`, nearest first, all
/// forward neighbours before any backward one. The cursor itself is not
/// included.
pub fn neighbor_order(cursor: usize, radius: usize, len: usize) -> Vec<usize> {
    let forward = (1..=radius)
        .filter_map(|d| cursor.checked_add(d))
        .filter(|i| *i < len);
    let backward = (1..=radius).filter_map(|d| cursor.checked_sub(d));
    forward.chain(backward).collect()
}

pub(crate) async fn run(shared: &WindowShared, epoch: Epoch) {
    tokio::join!(thumbnail_pass(shared, epoch), full_pass(shared, epoch));
}

async fn thumbnail_pass(shared: &WindowShared, epoch: Epoch) {
    let targets: Vec<(usize, AssetId)> = {
        let state = shared.state.lock();
        if !state.is_current(epoch) {
            return;
        }
        neighbor_order(epoch.cursor, shared.config.thumbnail_radius, state.assets.len())
            .into_iter()
            .filter_map(|i| state.assets.get(i).map(|r| (i, r.id)))
            .filter(|(_, id)| {
                !state.memory.contains_key(id) && !state.thumbnails.contains_key(id)
            })
            .collect()
    };
    if targets.is_empty() {
        return;
    }
    trace!("thumbnail pass; cursor={}, targets={}", epoch.cursor, targets.len());

    let remote = shared.ladder.remote();
    join_all(targets.into_iter().map(|(index, id)| async move {
        if !shared.is_current(epoch) {
            return;
        }
        match remote.fetch(id, RemoteVariant::Thumbnail).await {
            Ok(bytes) => {
                shared.publish_thumbnail(epoch, index, id, bytes);
            }
            Err(e) if e.is_auth() => warn!("thumbnail rejected; asset_id={id}, err={e}"),
            Err(e) => debug!("thumbnail fetch failed; asset_id={id}, err={e}"),
        }
    }))
    .await;
}

async fn full_pass(shared: &WindowShared, epoch: Epoch) {
    let len = shared.state.lock().assets.len();
    for index in neighbor_order(epoch.cursor, shared.config.window_radius, len) {
        if !shared.is_current(epoch) {
            debug!("prefetch pass superseded; cursor={}", epoch.cursor);
            return;
        }
        let outcome = prefetch_one(shared, epoch, index).await;
        trace!("prefetch; index={index}, outcome={outcome:?}");
    }
}

/// Load one neighbour at settled quality: offline copy, else preview
/// (original for spatial assets). No upgrade is scheduled.
pub(crate) async fn prefetch_one(
    shared: &WindowShared,
    epoch: Epoch,
    index: usize,
) -> PrefetchOutcome {
    let Some(record) = shared.record_at(index) else {
        return PrefetchOutcome::OutOfRange;
    };
    if record.is_video() {
        return PrefetchOutcome::SkippedVideo;
    }
    let _guard = match begin_load(&shared.state, epoch, record.id) {
        Ok(guard) => guard,
        Err(BeginRefusal::Cached) => return PrefetchOutcome::AlreadyCached,
        Err(BeginRefusal::InFlight) => return PrefetchOutcome::InFlight,
        Err(BeginRefusal::Stale) => return PrefetchOutcome::Stale,
    };

    let loaded = match shared.ladder.load_offline(&record).await {
        Ok(Some(asset)) => Ok(asset),
        Ok(None) => shared.ladder.fetch_settled(&record).await,
        Err(e) => {
            warn!("offline read failed; asset_id={}, err={e}", record.id);
            shared.ladder.fetch_settled(&record).await
        }
    };

    match loaded {
        Ok(asset) => {
            let tier = asset.tier;
            match shared.publish(epoch, index, asset) {
                PublishOutcome::Published => PrefetchOutcome::Published(tier),
                _ => PrefetchOutcome::Discarded,
            }
        }
        Err(e) => {
            crate::window::report_failure(&record, "prefetch", &e);
            PrefetchOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_neighbours_come_first() {
        assert_eq!(neighbor_order(5, 2, 10), vec![6, 7, 4, 3]);
    }

    #[test]
    fn order_is_clipped_at_both_ends() {
        assert_eq!(neighbor_order(0, 3, 10), vec![1, 2, 3]);
        assert_eq!(neighbor_order(9, 2, 10), vec![8, 7]);
        assert!(neighbor_order(0, 3, 1).is_empty());
    }
}
