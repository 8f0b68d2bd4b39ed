mod common;

use std::time::Duration;

use common::{harness, images, next_event, test_config, wait_until};
use vantage_core::{Direction, EngineConfig, EngineEvent, Peek, PrefetchOutcome};
use vantage_core::{ports::DurableStore, testing::fixtures};
use vantage_model::{AssetRecord, ImagePlanes, QualityTier, RemoteVariant};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn window_follows_the_cursor() {
    let h = harness(test_config());
    let records = images(&h.service, 10);
    let window = h.engine.window();

    window.configure(records.clone(), 0);
    wait_until("initial window", || window.cached_indices() == vec![0, 1, 2, 3]).await;

    for _ in 0..5 {
        assert!(window.advance(Direction::Forward));
    }
    assert_eq!(window.cursor(), 5);
    wait_until("shifted window", || {
        window.cached_indices() == vec![2, 3, 4, 5, 6, 7, 8]
    })
    .await;
    assert!(window.cached(records[0].id).is_none());
    assert!(window.cached(records[1].id).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn advance_stops_at_both_ends() {
    let h = harness(test_config());
    let records = images(&h.service, 2);
    let window = h.engine.window();
    window.configure(records, 0);

    assert!(!window.advance(Direction::Backward));
    assert!(window.advance(Direction::Forward));
    assert!(!window.advance(Direction::Forward));
    assert_eq!(window.cursor(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn results_from_superseded_positions_never_land_outside_the_window() {
    let config = EngineConfig {
        window_radius: 1,
        thumbnail_radius: 1,
        prebuffer_radius: 1,
        ..test_config()
    };
    let h = harness(config);
    let records = images(&h.service, 10);
    for record in &records[..4] {
        h.service
            .set_delay(record.id, RemoteVariant::Preview, Duration::from_millis(150));
    }
    let window = h.engine.window();

    window.configure(records.clone(), 0);
    for _ in 0..5 {
        window.advance(Direction::Forward);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    wait_until("window around 5", || window.cached_indices() == vec![4, 5, 6]).await;
    // Let every delayed response from the early positions arrive.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(window.cached_indices(), vec![4, 5, 6]);
    for record in &records[..4] {
        assert!(window.cached(record.id).is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_results_inside_the_new_window_are_discarded() {
    let h = harness(test_config());
    let records = images(&h.service, 10);
    let slow = records[3].id;
    // Keeps both cursor pipelines busy so only the explicit prefetch
    // touches index 3.
    h.service
        .set_delay(records[1].id, RemoteVariant::Preview, Duration::from_secs(30));
    h.service
        .set_delay(slow, RemoteVariant::Preview, Duration::from_millis(200));
    let window = h.engine.window();
    window.configure(records, 0);

    let (outcome, moved) = tokio::join!(window.prefetch_index(3), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        window.advance(Direction::Forward)
    });
    assert!(moved);
    // Index 3 is still inside the window around cursor 1.
    assert_eq!(outcome, PrefetchOutcome::Discarded);
    assert!(window.cached(slow).is_none());
    assert!(!window.cached_indices().contains(&3));
    assert_eq!(h.service.count(slow, RemoteVariant::Preview), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_advances_keep_the_cursor_loading() {
    let h = harness(test_config());
    let records = images(&h.service, 10);
    let window = h.engine.window();

    for round in 0..25 {
        window.configure(records.clone(), 4);
        let barrier = std::sync::Barrier::new(2);
        std::thread::scope(|scope| {
            for direction in [Direction::Forward, Direction::Backward] {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    window.advance(direction);
                });
            }
        });

        assert_eq!(window.cursor(), 4);
        let current = window.current().expect("cursor in range");
        wait_until(&format!("round {round} current asset"), || {
            window.cached(current.id).is_some()
        })
        .await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_loads_of_one_asset_fetch_once() {
    let h = harness(test_config());
    let records = images(&h.service, 5);
    let target = records[2].id;
    h.service
        .set_delay(target, RemoteVariant::Preview, Duration::from_millis(200));
    let window = h.engine.window();
    window.configure(records, 0);

    let (a, b) = tokio::join!(window.prefetch_index(2), window.prefetch_index(2));
    let published = [a, b]
        .iter()
        .filter(|o| matches!(o, PrefetchOutcome::Published(_)))
        .count();
    assert!(published <= 1, "outcomes: {a:?}, {b:?}");

    wait_until("index 2 cached", || window.cached(target).is_some()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.service.count(target, RemoteVariant::Preview), 1);
    assert_eq!(h.service.count(target, RemoteVariant::Original), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn displayed_quality_only_moves_up() {
    let h = harness(test_config());
    let records = images(&h.service, 2);
    let first = records[0].id;
    let window = h.engine.window();
    let mut events = h.engine.subscribe();

    window.configure(records, 0);
    let ready = next_event(&mut events, |e| {
        matches!(e, EngineEvent::AssetReady { asset_id, .. } if *asset_id == first)
    })
    .await;
    assert!(matches!(
        ready,
        EngineEvent::AssetReady { tier: QualityTier::Preview, .. }
    ));
    next_event(&mut events, |e| {
        matches!(e, EngineEvent::QualityUpgraded { asset_id, .. } if *asset_id == first)
    })
    .await;
    assert_eq!(window.cached(first).map(|a| a.tier), Some(QualityTier::Original));

    // Coming back to an upgraded asset keeps the original.
    window.advance(Direction::Forward);
    window.advance(Direction::Backward);
    let ready = next_event(&mut events, |e| {
        matches!(e, EngineEvent::AssetReady { asset_id, .. } if *asset_id == first)
    })
    .await;
    assert!(matches!(
        ready,
        EngineEvent::AssetReady { tier: QualityTier::Original, .. }
    ));
    assert_eq!(h.service.count(first, RemoteVariant::Preview), 1);
    assert_eq!(h.service.count(first, RemoteVariant::Original), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spatial_assets_skip_the_preview() {
    let h = harness(test_config());
    let record = AssetRecord::image("pair.mpo").with_spatial(true);
    h.service.serve_image(&record, fixtures::stereo_jpeg(8, 8));
    let window = h.engine.window();

    window.configure(vec![record.clone()], 0);
    wait_until("spatial asset", || window.cached(record.id).is_some()).await;

    let asset = window.cached(record.id).unwrap();
    assert_eq!(asset.tier, QualityTier::Original);
    assert!(asset.is_spatial);
    assert!(matches!(asset.planes, ImagePlanes::Stereo { .. }));
    assert_eq!(h.service.count(record.id, RemoteVariant::Preview), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn offline_copies_are_used_without_the_network() {
    let h = harness(test_config());
    let record = AssetRecord::image("local.png");
    h.store
        .put(
            record.id,
            QualityTier::Offline,
            bytes::Bytes::from(fixtures::png(5, 5)),
        )
        .await
        .unwrap();
    let window = h.engine.window();

    window.configure(vec![record.clone()], 0);
    wait_until("offline asset", || window.cached(record.id).is_some()).await;
    assert_eq!(window.cached(record.id).unwrap().tier, QualityTier::Offline);
    assert!(h.service.transport.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn videos_become_stream_markers_and_are_prebuffered() {
    let h = harness(test_config());
    let video = AssetRecord::video("clip.mp4");
    h.service
        .serve_video(&video, fixtures::video_bytes(256 * 1024));
    let window = h.engine.window();

    window.configure(vec![video.clone()], 0);
    wait_until("marker and prefix", || {
        window.cached(video.id).is_some() && h.engine.prebuffer().contains(video.id)
    })
    .await;

    assert!(window.cached(video.id).unwrap().is_stream_marker());
    let entry = h.engine.prebuffer().get(video.id).unwrap();
    assert_eq!(entry.buffered_len(), 64 * 1024);
    assert_eq!(entry.total_length, 256 * 1024);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peek_reports_thumbnails_beyond_the_decoded_window() {
    let config = EngineConfig {
        window_radius: 1,
        thumbnail_radius: 3,
        prebuffer_radius: 3,
        ..test_config()
    };
    let h = harness(config);
    let records = images(&h.service, 10);
    let window = h.engine.window();

    window.configure(records, 0);
    wait_until("neighbours", || {
        window.cached_indices() == vec![0, 1] && matches!(window.peek(3), Peek::Thumbnail(_))
    })
    .await;
    assert!(matches!(window.peek(1), Peek::Full(_)));
    assert!(matches!(window.peek(2), Peek::Thumbnail(_)));
    assert_eq!(window.peek(5), Peek::Missing);
    assert_eq!(window.peek(42), Peek::Missing);
}

#[tokio::test(start_paused = true)]
async fn stuck_loads_raise_a_timeout() {
    let config = EngineConfig {
        loading_timeout: Duration::from_secs(2),
        ..test_config()
    };
    let h = harness(config);
    let record = AssetRecord::image("slow.jpg");
    h.service.serve_image(&record, fixtures::jpeg(4, 4, 4));
    h.service
        .set_delay(record.id, RemoteVariant::Preview, Duration::from_secs(3600));
    let mut events = h.engine.subscribe();

    h.engine.window().configure(vec![record.clone()], 0);
    next_event(&mut events, |e| matches!(e, EngineEvent::Loading { .. })).await;
    let timed_out = next_event(&mut events, |e| {
        matches!(e, EngineEvent::LoadTimedOut { .. })
    })
    .await;
    assert_eq!(
        timed_out,
        EngineEvent::LoadTimedOut {
            index: 0,
            asset_id: record.id
        }
    );
    assert!(h.engine.window().cached(record.id).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unauthorized_loads_stay_in_loading() {
    let h = harness(test_config());
    let record = AssetRecord::image("private.jpg");
    h.service.serve_image(&record, fixtures::jpeg(4, 4, 4));
    h.service.set_status(record.id, RemoteVariant::Preview, 401);
    let window = h.engine.window();

    window.configure(vec![record.clone()], 0);
    wait_until("preview attempt", || {
        h.service.count(record.id, RemoteVariant::Preview) == 1
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(window.cached(record.id).is_none());
    assert_eq!(h.service.count(record.id, RemoteVariant::Original), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clear_drops_everything() {
    let h = harness(test_config());
    let records = images(&h.service, 4);
    let window = h.engine.window();
    window.configure(records, 0);
    wait_until("loaded", || !window.cached_indices().is_empty()).await;

    window.clear();
    assert!(window.is_empty());
    assert!(window.cached_indices().is_empty());
    assert!(!window.advance(Direction::Forward));
}
