//! Mutable state behind the window cache.
//!
//! Single-writer rule: every mutation of the cursor, the memory map, the
//! thumbnail map and the in-flight set happens inside one short critical
//! section on [`SharedState`]; the lock is never held across an `.await`.
//! Background tasks capture an [`Epoch`] before suspending and re-check it
//! under the same lock before writing anything back.

use std::{
    collections::HashMap,
    ops::RangeInclusive,
    sync::Arc,
};

use bytes::Bytes;
use parking_lot::Mutex;
use vantage_model::{AssetId, AssetRecord, CachedAsset, QualityTier};

/// Snapshot of the cursor taken when a task starts.
///
/// `generation` bumps on every cursor move or reconfiguration, so a task
/// that captured an older epoch can tell its result is stale even when the
/// cursor has since come back to the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub generation: u64,
    pub cursor: usize,
}

/// Inclusive index window `[cursor - radius, cursor + radius]` clipped to
/// the list bounds; `None` for an empty list.
pub fn window_bounds(
    cursor: usize,
    radius: usize,
    len: usize,
) -> Option<RangeInclusive<usize>> {
    if len == 0 {
        return None;
    }
    let lo = cursor.saturating_sub(radius);
    let hi = cursor.saturating_add(radius).min(len - 1);
    Some(lo..=hi)
}

#[derive(Debug, Default)]
pub(crate) struct CacheState {
    pub assets: Vec<AssetRecord>,
    pub index_of: HashMap<AssetId, usize>,
    pub cursor: usize,
    pub generation: u64,
    pub memory: HashMap<AssetId, CachedAsset>,
    pub thumbnails: HashMap<AssetId, Bytes>,
    /// Asset id -> ticket of the task currently loading it
    pub in_flight: HashMap<AssetId, u64>,
    next_ticket: u64,
}

impl CacheState {
    pub fn epoch(&self) -> Epoch {
        Epoch {
            generation: self.generation,
            cursor: self.cursor,
        }
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.generation == epoch.generation
    }

    /// Replace everything; the old generation's tasks become stale.
    pub fn reset(&mut self, assets: Vec<AssetRecord>, cursor: usize) {
        let mut index_of = HashMap::with_capacity(assets.len());
        for (index, record) in assets.iter().enumerate() {
            index_of.entry(record.id).or_insert(index);
        }
        self.assets = assets;
        self.index_of = index_of;
        self.cursor = cursor;
        self.generation = self.generation.wrapping_add(1);
        self.memory.clear();
        self.thumbnails.clear();
        self.in_flight.clear();
    }

    /// Move the cursor; clears the in-flight set because every task tied
    /// to the previous position is superseded.
    pub fn move_cursor(&mut self, cursor: usize) -> Epoch {
        self.cursor = cursor;
        self.generation = self.generation.wrapping_add(1);
        self.in_flight.clear();
        self.epoch()
    }

    pub fn window(&self, radius: usize) -> Option<RangeInclusive<usize>> {
        window_bounds(self.cursor, radius, self.assets.len())
    }

    pub fn within(&self, id: AssetId, radius: usize) -> bool {
        match (self.index_of.get(&id), self.window(radius)) {
            (Some(index), Some(window)) => window.contains(index),
            _ => false,
        }
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.next_ticket
    }
}

pub(crate) type SharedState = Arc<Mutex<CacheState>>;

/// Why a load could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginRefusal {
    Stale,
    InFlight,
    /// Already in the memory map
    Cached,
}

/// Membership in the in-flight set; released on drop.
///
/// Removal is keyed by ticket so a guard outliving a cursor move cannot
/// evict the newer task that replaced it.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    state: SharedState,
    asset_id: AssetId,
    ticket: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.in_flight.get(&self.asset_id) == Some(&self.ticket) {
            state.in_flight.remove(&self.asset_id);
        }
    }
}

/// Check-then-insert into the in-flight set, atomically with the epoch
/// check. Refuses ids that are already cached.
pub(crate) fn begin_load(
    state: &SharedState,
    epoch: Epoch,
    asset_id: AssetId,
) -> Result<InFlightGuard, BeginRefusal> {
    begin(state, epoch, asset_id, false)
}

/// Like [`begin_load`] but for replacing a cached preview.
pub(crate) fn begin_upgrade(
    state: &SharedState,
    epoch: Epoch,
    asset_id: AssetId,
) -> Result<InFlightGuard, BeginRefusal> {
    begin(state, epoch, asset_id, true)
}

fn begin(
    state: &SharedState,
    epoch: Epoch,
    asset_id: AssetId,
    replacing: bool,
) -> Result<InFlightGuard, BeginRefusal> {
    let mut guard = state.lock();
    if !guard.is_current(epoch) {
        return Err(BeginRefusal::Stale);
    }
    if guard.in_flight.contains_key(&asset_id) {
        return Err(BeginRefusal::InFlight);
    }
    if !replacing && guard.memory.contains_key(&asset_id) {
        return Err(BeginRefusal::Cached);
    }
    let ticket = guard.issue_ticket();
    guard.in_flight.insert(asset_id, ticket);
    Ok(InFlightGuard {
        state: Arc::clone(state),
        asset_id,
        ticket,
    })
}

/// Result of trying to write a load result into the memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Cursor moved on; the result was dropped
    Stale,
    /// Index is outside the window
    OutOfWindow,
    /// A higher tier is already displayed
    Superseded,
}

impl CacheState {
    /// Insert `asset` if the epoch is current, the asset is inside the
    /// window and the write does not lower the displayed tier.
    pub fn publish(
        &mut self,
        epoch: Epoch,
        radius: usize,
        asset: CachedAsset,
    ) -> PublishOutcome {
        if !self.is_current(epoch) {
            return PublishOutcome::Stale;
        }
        if !self.within(asset.asset_id, radius) {
            return PublishOutcome::OutOfWindow;
        }
        if let Some(existing) = self.memory.get(&asset.asset_id)
            && existing.tier > asset.tier
        {
            return PublishOutcome::Superseded;
        }
        self.memory.insert(asset.asset_id, asset);
        PublishOutcome::Published
    }

    /// Apply a preview -> original upgrade: only while the cursor still
    /// sits on `index` and the displayed tier is still `Preview`.
    pub fn publish_upgrade(
        &mut self,
        epoch: Epoch,
        index: usize,
        asset: CachedAsset,
    ) -> PublishOutcome {
        if !self.is_current(epoch) || self.cursor != index {
            return PublishOutcome::Stale;
        }
        match self.memory.get(&asset.asset_id) {
            Some(existing) if existing.tier == QualityTier::Preview => {
                self.memory.insert(asset.asset_id, asset);
                PublishOutcome::Published
            }
            Some(_) => PublishOutcome::Superseded,
            None => PublishOutcome::OutOfWindow,
        }
    }

    /// Drop memory entries outside `radius` and thumbnails outside
    /// `thumbnail_radius`. Returns the number of evicted entries.
    pub fn evict(&mut self, radius: usize, thumbnail_radius: usize) -> usize {
        let Some(window) = self.window(radius) else {
            let removed = self.memory.len() + self.thumbnails.len();
            self.memory.clear();
            self.thumbnails.clear();
            return removed;
        };
        let thumbs = self.window(thumbnail_radius).unwrap_or(window.clone());

        let before = self.memory.len() + self.thumbnails.len();
        let index_of = &self.index_of;
        self.memory.retain(|id, _| {
            index_of.get(id).is_some_and(|i| window.contains(i))
        });
        self.thumbnails.retain(|id, _| {
            index_of.get(id).is_some_and(|i| thumbs.contains(i))
        });
        before - (self.memory.len() + self.thumbnails.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_model::{AssetRecord, ImagePlanes, MediaKind};

    fn asset(id: AssetId, tier: QualityTier) -> CachedAsset {
        CachedAsset {
            asset_id: id,
            kind: MediaKind::Image,
            payload: Bytes::from_static(b"x"),
            planes: ImagePlanes::Stream,
            is_spatial: false,
            tier,
        }
    }

    fn state_with(len: usize, cursor: usize) -> CacheState {
        let mut state = CacheState::default();
        let records = (0..len).map(|i| AssetRecord::image(format!("{i}.jpg")));
        state.reset(records.collect(), cursor);
        state
    }

    #[test]
    fn bounds_clip_to_list() {
        assert_eq!(window_bounds(0, 3, 10), Some(0..=3));
        assert_eq!(window_bounds(8, 3, 10), Some(5..=9));
        assert_eq!(window_bounds(0, 3, 0), None);
    }

    #[test]
    fn stale_publish_is_dropped() {
        let mut state = state_with(10, 0);
        let epoch = state.epoch();
        let id = state.assets[1].id;
        state.move_cursor(1);
        assert_eq!(
            state.publish(epoch, 3, asset(id, QualityTier::Preview)),
            PublishOutcome::Stale
        );
        assert!(state.memory.is_empty());
    }

    #[test]
    fn publish_never_lowers_the_tier() {
        let mut state = state_with(5, 0);
        let epoch = state.epoch();
        let id = state.assets[0].id;
        assert_eq!(
            state.publish(epoch, 3, asset(id, QualityTier::Original)),
            PublishOutcome::Published
        );
        assert_eq!(
            state.publish(epoch, 3, asset(id, QualityTier::Preview)),
            PublishOutcome::Superseded
        );
        assert_eq!(state.memory[&id].tier, QualityTier::Original);
    }

    #[test]
    fn upgrade_requires_displayed_preview_and_same_index() {
        let mut state = state_with(5, 2);
        let epoch = state.epoch();
        let id = state.assets[2].id;
        state.publish(epoch, 3, asset(id, QualityTier::Preview));
        assert_eq!(
            state.publish_upgrade(epoch, 2, asset(id, QualityTier::Original)),
            PublishOutcome::Published
        );
        assert_eq!(
            state.publish_upgrade(epoch, 2, asset(id, QualityTier::Original)),
            PublishOutcome::Superseded
        );
    }

    #[test]
    fn guard_release_is_ticket_scoped() {
        let shared: SharedState = Arc::new(Mutex::new(state_with(3, 0)));
        let id = shared.lock().assets[0].id;

        let initial = shared.lock().epoch();
        let first = begin_load(&shared, initial, id).unwrap();
        assert_eq!(
            begin_load(&shared, initial, id).unwrap_err(),
            BeginRefusal::InFlight
        );

        let epoch = shared.lock().move_cursor(0);
        let second = begin_load(&shared, epoch, id).unwrap();
        drop(first);
        assert!(shared.lock().in_flight.contains_key(&id));
        drop(second);
        assert!(shared.lock().in_flight.is_empty());
    }

    #[test]
    fn evict_keeps_only_the_window() {
        let mut state = state_with(10, 0);
        let epoch = state.epoch();
        let ids: Vec<_> = state.assets.iter().map(|r| r.id).collect();
        for id in &ids[..4] {
            state.publish(epoch, 3, asset(*id, QualityTier::Preview));
        }
        state.move_cursor(5);
        let removed = state.evict(3, 5);
        assert_eq!(removed, 2);
        assert!(!state.memory.contains_key(&ids[0]));
        assert!(!state.memory.contains_key(&ids[1]));
        assert!(state.memory.contains_key(&ids[2]));
    }
}
