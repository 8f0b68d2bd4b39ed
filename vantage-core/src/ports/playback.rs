use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{EngineError, Result};

/// Identifier the playback engine assigns to each resource-loading request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Answer to a content-information request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub byte_range_access: bool,
}

/// Player request for bytes `[offset, offset + length)`; `None` length
/// reads to the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequest {
    pub id: RequestId,
    pub offset: u64,
    pub length: Option<u64>,
}

impl DataRequest {
    pub fn new(id: RequestId, offset: u64, length: Option<u64>) -> Self {
        Self { id, offset, length }
    }

    /// Exclusive end offset, when bounded
    pub fn end(&self) -> Option<u64> {
        self.length.map(|len| self.offset.saturating_add(len))
    }
}

/// Incremental response delivered to the player for one data request.
///
/// A cancelled request ends without `Finished` or `Failed`.
#[derive(Debug)]
pub enum LoadingEvent {
    Data(Bytes),
    Finished,
    Failed(EngineError),
}

pub type LoadingReceiver = mpsc::Receiver<LoadingEvent>;

/// Pluggable data source answering a playback engine's resource requests.
#[async_trait]
pub trait PlaybackDataSource: Send + Sync {
    async fn provide_content_info(&self, request: RequestId) -> Result<ContentInfo>;

    /// Start serving a byte range. Bytes arrive on the returned receiver as
    /// soon as they are available.
    fn provide_data_range(&self, request: DataRequest) -> LoadingReceiver;

    /// Abandon a request; its response ends silently.
    fn cancel(&self, request: RequestId);
}
