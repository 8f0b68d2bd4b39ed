use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{StreamExt, stream};
use parking_lot::Mutex;
use url::Url;
use vantage_model::{AssetId, AssetRecord, RemoteVariant};

use crate::{
    error::Result,
    infra::StaticTokenProvider,
    ports::{HttpTransport, TransportRequest, TransportResponse},
    remote::{AssetEndpoints, RemoteAssets},
};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct FakeResource {
    body: Bytes,
    content_type: Option<String>,
    delay: Duration,
    status: Option<u16>,
    ignore_range: bool,
    stall_after_first_chunk: bool,
}

impl FakeResource {
    fn new(body: Bytes, content_type: Option<String>) -> Self {
        Self {
            body,
            content_type,
            delay: Duration::ZERO,
            status: None,
            ignore_range: false,
            stall_after_first_chunk: false,
        }
    }
}

/// HTTP transport answering from an in-memory URL table.
///
/// Honours `Range` with `206` + `Content-Range`, logs every request, and
/// can inject per-URL latency, status codes, or a stalled body.
#[derive(Debug, Default)]
pub struct FakeTransport {
    resources: DashMap<String, FakeResource>,
    log: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &Url, body: impl Into<Bytes>, content_type: Option<&str>) {
        self.resources.insert(
            url.to_string(),
            FakeResource::new(body.into(), content_type.map(str::to_string)),
        );
    }

    fn update(&self, url: &Url, f: impl FnOnce(&mut FakeResource)) {
        let mut entry = self
            .resources
            .entry(url.to_string())
            .or_insert_with(|| FakeResource::new(Bytes::new(), None));
        f(entry.value_mut());
    }

    pub fn set_delay(&self, url: &Url, delay: Duration) {
        self.update(url, |r| r.delay = delay);
    }

    pub fn set_status(&self, url: &Url, status: u16) {
        self.update(url, |r| r.status = Some(status));
    }

    /// Answer ranged requests with `200` and the full body.
    pub fn ignore_range(&self, url: &Url) {
        self.update(url, |r| r.ignore_range = true);
    }

    /// Deliver one chunk, then never finish the body.
    pub fn stall_after_first_chunk(&self, url: &Url) {
        self.update(url, |r| r.stall_after_first_chunk = true);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.log.lock().clone()
    }

    pub fn requests_for(&self, url: &Url) -> Vec<TransportRequest> {
        self.log
            .lock()
            .iter()
            .filter(|r| &r.url == url)
            .cloned()
            .collect()
    }

    pub fn request_count(&self, url: &Url) -> usize {
        self.requests_for(url).len()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }
}

fn empty_response(status: u16) -> TransportResponse {
    TransportResponse {
        status,
        content_length: Some(0),
        content_range: None,
        content_type: None,
        body: stream::empty().boxed(),
    }
}

fn chunked(body: Bytes, stall: bool) -> crate::ports::BodyStream {
    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < body.len() {
        let end = (offset + CHUNK_SIZE).min(body.len());
        chunks.push(Ok(body.slice(offset..end)));
        offset = end;
    }
    if stall {
        chunks.truncate(1);
        stream::iter(chunks).chain(stream::pending()).boxed()
    } else {
        stream::iter(chunks).boxed()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.log.lock().push(request.clone());

        let Some(resource) = self
            .resources
            .get(request.url.as_str())
            .map(|r| r.value().clone())
        else {
            return Ok(empty_response(404));
        };

        if !resource.delay.is_zero() {
            tokio::time::sleep(resource.delay).await;
        }
        if let Some(status) = resource.status {
            return Ok(empty_response(status));
        }

        let total = resource.body.len() as u64;
        match request.range {
            Some(range) if !resource.ignore_range => {
                if range.start >= total {
                    return Ok(empty_response(416));
                }
                let end = range.end.unwrap_or(total - 1).min(total - 1);
                let slice =
                    resource.body.slice(range.start as usize..end as usize + 1);
                Ok(TransportResponse {
                    status: 206,
                    content_length: Some(slice.len() as u64),
                    content_range: Some(format!(
                        "bytes {}-{}/{}",
                        range.start, end, total
                    )),
                    content_type: resource.content_type.clone(),
                    body: chunked(slice, resource.stall_after_first_chunk),
                })
            }
            _ => Ok(TransportResponse {
                status: 200,
                content_length: Some(total),
                content_range: None,
                content_type: resource.content_type.clone(),
                body: chunked(resource.body, resource.stall_after_first_chunk),
            }),
        }
    }
}

/// A fake remote asset service: endpoints plus the transport serving them.
#[derive(Debug, Clone)]
pub struct FakeAssetService {
    pub endpoints: AssetEndpoints,
    pub transport: Arc<FakeTransport>,
}

impl Default for FakeAssetService {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAssetService {
    pub const TOKEN: &'static str = "test-token";

    pub fn new() -> Self {
        Self {
            endpoints: AssetEndpoints::new(
                Url::parse("https://assets.test/").expect("static URL"),
            ),
            transport: Arc::new(FakeTransport::new()),
        }
    }

    pub fn url(&self, id: AssetId, variant: RemoteVariant) -> Url {
        self.endpoints
            .url_for(id, variant)
            .expect("fake endpoints build valid URLs")
    }

    pub fn remote(&self) -> RemoteAssets {
        RemoteAssets::new(
            self.endpoints.clone(),
            self.transport.clone(),
            Arc::new(StaticTokenProvider::new(Self::TOKEN)),
        )
    }

    pub fn serve(
        &self,
        id: AssetId,
        variant: RemoteVariant,
        body: impl Into<Bytes>,
        content_type: Option<&str>,
    ) {
        self.transport
            .serve(&self.url(id, variant), body, content_type);
    }

    /// Serve thumbnail, preview and original for an image record.
    pub fn serve_image(&self, record: &AssetRecord, original: Vec<u8>) {
        let preview = super::fixtures::jpeg(4, 4, 90);
        self.serve(
            record.id,
            RemoteVariant::Thumbnail,
            super::fixtures::jpeg(2, 2, 60),
            Some("image/jpeg"),
        );
        self.serve(record.id, RemoteVariant::Preview, preview, Some("image/jpeg"));
        self.serve(record.id, RemoteVariant::Original, original, Some("image/jpeg"));
    }

    /// Serve a video's original bytes.
    pub fn serve_video(&self, record: &AssetRecord, bytes: Vec<u8>) {
        self.serve(record.id, RemoteVariant::Original, bytes, Some("video/mp4"));
        self.serve(
            record.id,
            RemoteVariant::Thumbnail,
            super::fixtures::jpeg(2, 2, 10),
            Some("image/jpeg"),
        );
    }

    pub fn count(&self, id: AssetId, variant: RemoteVariant) -> usize {
        self.transport.request_count(&self.url(id, variant))
    }

    pub fn set_delay(&self, id: AssetId, variant: RemoteVariant, delay: Duration) {
        self.transport.set_delay(&self.url(id, variant), delay);
    }

    pub fn set_status(&self, id: AssetId, variant: RemoteVariant, status: u16) {
        self.transport.set_status(&self.url(id, variant), status);
    }
}
