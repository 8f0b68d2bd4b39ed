//! # Vantage Core
//!
//! Asset loading engine for immersive media viewers: a cursor-windowed
//! decoded cache, progressive image quality, video pre-buffering and range
//! streaming, and offline downloads.
//!
//! ## Overview
//!
//! - **Window cache**: keeps decoded assets within a radius of the cursor
//!   and discards every result that arrives after the cursor moved on
//! - **Quality ladder**: offline copy, then preview, then original after a
//!   settle delay; stereo assets go straight to the original
//! - **Prefetch**: thumbnails and settled-quality neighbours, nearest and
//!   forward first
//! - **Pre-buffer**: the leading bytes of nearby videos, fetched ahead of
//!   playback
//! - **Streaming bridge**: answers a playback engine's byte-range requests
//!   from the pre-buffer spliced with ranged network reads
//! - **Offline queue**: durable full-quality downloads independent of
//!   navigation
//!
//! Collaborators (asset service transport, token source, durable store,
//! spatial classifier) are injected through the traits in [`ports`];
//! [`infra`] carries reqwest/cacache adapters and in-memory ones.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vantage_core::{
//!     Collaborators, Direction, EngineConfig, ViewerEngine,
//!     infra::{
//!         AssetCacheRoot, CacacheStore, MemorySpatialClassifier, ReqwestTransport,
//!         StaticTokenProvider,
//!     },
//!     remote::AssetEndpoints,
//! };
//! use vantage_model::AssetRecord;
//!
//! # async fn run() -> vantage_core::Result<()> {
//! let config = EngineConfig::default();
//! let engine = ViewerEngine::new(
//!     config.clone(),
//!     Collaborators {
//!         endpoints: AssetEndpoints::parse("photos.local:2283")?,
//!         transport: Arc::new(ReqwestTransport::new(config.http_timeout)?),
//!         tokens: Arc::new(StaticTokenProvider::new("api-key")),
//!         store: Arc::new(CacacheStore::new(AssetCacheRoot::new("cache".into()))),
//!         classifier: Arc::new(MemorySpatialClassifier::new()),
//!     },
//! )?;
//!
//! engine.window().configure(vec![AssetRecord::image("a.jpg")], 0);
//! engine.window().advance(Direction::Forward);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod events;
pub mod infra;
pub mod ladder;
pub mod offline;
pub mod ports;
pub mod prebuffer;
pub mod prefetch;
pub mod remote;
pub mod streaming;
pub mod telemetry;
pub mod testing;
pub mod window;

pub use config::EngineConfig;
pub use engine::{Collaborators, ViewerEngine};
pub use error::{EngineError, Result};
pub use events::{EngineEvent, EventBus};
pub use offline::{OfflineQueue, OfflineSaveOutcome};
pub use prefetch::PrefetchOutcome;
pub use streaming::StreamingBridge;
pub use window::{Direction, Peek, WindowCache};
