#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use tokio::sync::broadcast;
use vantage_core::{
    Collaborators, EngineConfig, EngineEvent, ViewerEngine,
    infra::{MemorySpatialClassifier, MemoryStore},
    testing::{FakeAssetService, fixtures},
};
use vantage_model::AssetRecord;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub service: FakeAssetService,
    pub store: Arc<MemoryStore>,
    pub classifier: Arc<MemorySpatialClassifier>,
    pub engine: ViewerEngine,
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        upgrade_settle_delay: Duration::from_millis(20),
        progress_interval: Duration::from_millis(10),
        prebuffer_bytes: 64 * 1024,
        ..EngineConfig::default()
    }
}

pub fn harness(config: EngineConfig) -> Harness {
    let service = FakeAssetService::new();
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(MemorySpatialClassifier::new());
    let engine = ViewerEngine::new(
        config,
        Collaborators {
            endpoints: service.endpoints.clone(),
            transport: service.transport.clone(),
            tokens: Arc::new(vantage_core::infra::StaticTokenProvider::new(
                FakeAssetService::TOKEN,
            )),
            store: store.clone(),
            classifier: classifier.clone(),
        },
    )
    .expect("engine builds");
    Harness {
        service,
        store,
        classifier,
        engine,
    }
}

/// `n` image records, each served with a small original.
pub fn images(service: &FakeAssetService, n: usize) -> Vec<AssetRecord> {
    (0..n)
        .map(|i| {
            let record = AssetRecord::image(format!("img-{i}.jpg"));
            service.serve_image(&record, fixtures::jpeg(16, 16, (i * 20) as u8));
            record
        })
        .collect()
}

pub async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !done() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn next_event(
    rx: &mut broadcast::Receiver<EngineEvent>,
    mut wanted: impl FnMut(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if wanted(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("event did not arrive in time")
}
