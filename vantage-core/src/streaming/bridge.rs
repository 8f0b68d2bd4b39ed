use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;
use vantage_model::{AssetId, ByteRange, QualityTier, RemoteVariant};

use super::{splice::plan_splice, virtual_url};
use crate::{
    error::{EngineError, Result},
    ports::{
        ContentInfo, DataRequest, DurableStore, LoadingEvent, LoadingReceiver,
        PlaybackDataSource, RequestId,
    },
    prebuffer::PreBufferCache,
    remote::RemoteAssets,
};

const CHANNEL_DEPTH: usize = 16;
const LOCAL_CHUNK: usize = 256 * 1024;

struct ActiveRequest {
    ticket: u64,
    token: CancellationToken,
}

struct BridgeInner {
    asset_id: AssetId,
    remote: RemoteAssets,
    prebuffer: Arc<PreBufferCache>,
    /// Durable offline copy; when present nothing goes to the network
    offline: Option<Bytes>,
    session: CancellationToken,
    requests: DashMap<RequestId, ActiveRequest>,
    next_ticket: AtomicU64,
    runtime: Handle,
}

/// Serves one video's bytes to a playback engine.
///
/// Requests are answered from the durable offline copy when one exists,
/// otherwise from the pre-buffered prefix spliced with a ranged network
/// read for the remainder. Dropping the bridge cancels every request.
pub struct StreamingBridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for StreamingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingBridge")
            .field("asset_id", &self.inner.asset_id)
            .field("offline", &self.inner.offline.is_some())
            .field("active_requests", &self.inner.requests.len())
            .finish_non_exhaustive()
    }
}

impl StreamingBridge {
    pub async fn open(
        asset_id: AssetId,
        remote: RemoteAssets,
        prebuffer: Arc<PreBufferCache>,
        store: &dyn DurableStore,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            EngineError::Config(format!("streaming bridge needs a Tokio runtime: {e}"))
        })?;
        let offline = match store.exists(asset_id, QualityTier::Offline).await {
            Ok(true) => store.get(asset_id, QualityTier::Offline).await?,
            Ok(false) => None,
            Err(e) => {
                warn!("offline lookup failed, streaming remotely; asset_id={asset_id}, err={e}");
                None
            }
        };
        debug!(
            "streaming bridge opened; asset_id={asset_id}, offline={}",
            offline.is_some()
        );

        Ok(Self {
            inner: Arc::new(BridgeInner {
                asset_id,
                remote,
                prebuffer,
                offline,
                session: CancellationToken::new(),
                requests: DashMap::new(),
                next_ticket: AtomicU64::new(0),
                runtime,
            }),
        })
    }

    pub fn asset_id(&self) -> AssetId {
        self.inner.asset_id
    }

    pub fn is_offline(&self) -> bool {
        self.inner.offline.is_some()
    }

    /// URL to hand to the playback engine so it routes reads through this
    /// bridge.
    pub fn virtual_url(&self) -> Result<Url> {
        let real = self
            .inner
            .remote
            .endpoints()
            .url_for(self.inner.asset_id, RemoteVariant::Original)?;
        virtual_url::encode(&real)
    }

    pub fn active_requests(&self) -> usize {
        self.inner.requests.len()
    }

    /// Cancel every outstanding request silently. Requests made after this
    /// fail immediately with a cancellation error.
    pub fn shutdown(&self) {
        self.inner.session.cancel();
        self.inner.requests.clear();
        debug!("streaming bridge shut down; asset_id={}", self.inner.asset_id);
    }
}

impl Drop for StreamingBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl PlaybackDataSource for StreamingBridge {
    async fn provide_content_info(&self, request: RequestId) -> Result<ContentInfo> {
        let inner = &self.inner;
        if inner.session.is_cancelled() {
            return Err(EngineError::Cancelled(format!("{request}: bridge shut down")));
        }
        if let Some(bytes) = &inner.offline {
            return Ok(ContentInfo {
                content_length: bytes.len() as u64,
                content_type: None,
                byte_range_access: true,
            });
        }
        if let Some(entry) = inner.prebuffer.get(inner.asset_id) {
            trace!("content info from pre-buffer; asset_id={}, {request}", inner.asset_id);
            return Ok(ContentInfo {
                content_length: entry.total_length,
                content_type: entry.content_type,
                byte_range_access: true,
            });
        }

        // Two-byte probe; the total comes back in Content-Range.
        let probe = ByteRange::with_len(0, 2)?;
        let response = inner
            .remote
            .open(inner.asset_id, RemoteVariant::Original, Some(probe))
            .await?;
        let content_length = response.total_length().ok_or_else(|| {
            EngineError::Network(format!(
                "no total length for {}",
                inner.asset_id
            ))
        })?;
        Ok(ContentInfo {
            content_length,
            content_type: response.content_type.clone(),
            byte_range_access: true,
        })
    }

    fn provide_data_range(&self, request: DataRequest) -> LoadingReceiver {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        if self.inner.session.is_cancelled() {
            let _ = tx.try_send(LoadingEvent::Failed(EngineError::Cancelled(format!(
                "{}: bridge shut down",
                request.id
            ))));
            return rx;
        }
        let inner = Arc::clone(&self.inner);
        let token = inner.session.child_token();
        let ticket = inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = inner.requests.insert(
            request.id,
            ActiveRequest {
                ticket,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        self.inner.runtime.spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => Err(EngineError::Cancelled(request.id.to_string())),
                result = inner.serve(request, &tx) => result,
            };
            inner
                .requests
                .remove_if(&request.id, |_, active| active.ticket == ticket);

            if token.is_cancelled() {
                debug!("data request cancelled; asset_id={}, {}", inner.asset_id, request.id);
                return;
            }
            match outcome {
                Ok(()) => {
                    let _ = tx.send(LoadingEvent::Finished).await;
                }
                Err(e) if e.is_cancelled() => {
                    debug!("data request abandoned; asset_id={}, {}", inner.asset_id, request.id);
                }
                Err(e) => {
                    warn!(
                        "data request failed; asset_id={}, {}, err={e}",
                        inner.asset_id, request.id
                    );
                    let _ = tx.send(LoadingEvent::Failed(e)).await;
                }
            }
        });
        rx
    }

    fn cancel(&self, request: RequestId) {
        if let Some((_, active)) = self.inner.requests.remove(&request) {
            active.token.cancel();
            trace!("cancelled data request; asset_id={}, {request}", self.inner.asset_id);
        }
    }
}

impl BridgeInner {
    async fn serve(
        &self,
        request: DataRequest,
        tx: &mpsc::Sender<LoadingEvent>,
    ) -> Result<()> {
        if let Some(bytes) = &self.offline {
            let total = bytes.len() as u64;
            let plan = plan_splice(request.offset, request.end(), total, Some(total))?;
            if let Some(range) = plan.buffered {
                send_chunked(tx, bytes.slice(range)).await?;
            }
            return Ok(());
        }

        let entry = self.prebuffer.get(self.asset_id);
        let (buffered_len, total) = entry
            .as_ref()
            .map_or((0, None), |e| (e.buffered_len(), Some(e.total_length)));
        let plan = plan_splice(request.offset, request.end(), buffered_len, total)?;

        if let (Some(range), Some(entry)) = (plan.buffered.clone(), entry.as_ref()) {
            trace!(
                "serving from pre-buffer; asset_id={}, {}, bytes={}",
                self.asset_id,
                request.id,
                range.len()
            );
            send_chunked(tx, entry.bytes.slice(range)).await?;
        }

        let Some(remote_range) = plan.remote else {
            return Ok(());
        };
        if entry.is_some() {
            self.prebuffer.consume(self.asset_id);
        }
        debug!(
            "opening network read; asset_id={}, {}, range={remote_range}",
            self.asset_id, request.id
        );
        let response = self
            .remote
            .open(self.asset_id, RemoteVariant::Original, Some(remote_range))
            .await?;

        // A 200 carries the whole resource from byte 0.
        let mut skip = if response.status == 200 {
            remote_range.start
        } else {
            0
        };
        let mut remaining = remote_range.len();
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let mut chunk = chunk?;
            if skip > 0 {
                let n = skip.min(chunk.len() as u64);
                chunk = chunk.slice(n as usize..);
                skip -= n;
            }
            if let Some(left) = remaining.as_mut() {
                if chunk.len() as u64 > *left {
                    chunk.truncate(*left as usize);
                }
                *left -= chunk.len() as u64;
            }
            if !chunk.is_empty() {
                send(tx, chunk).await?;
            }
            if remaining == Some(0) {
                break;
            }
        }
        Ok(())
    }
}

async fn send(tx: &mpsc::Sender<LoadingEvent>, bytes: Bytes) -> Result<()> {
    tx.send(LoadingEvent::Data(bytes))
        .await
        .map_err(|_| EngineError::Cancelled("player dropped the request".into()))
}

async fn send_chunked(tx: &mpsc::Sender<LoadingEvent>, bytes: Bytes) -> Result<()> {
    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + LOCAL_CHUNK).min(bytes.len());
        send(tx, bytes.slice(offset..end)).await?;
        offset = end;
    }
    Ok(())
}
