use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use url::Url;
use vantage_model::ByteRange;

use crate::error::{EngineError, Result};

/// Supplies the bearer token for each outbound request.
///
/// Implementations own refresh and expiry; callers ask again for every
/// request instead of holding on to a copy.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

/// Authenticated GET, optionally ranged.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: Url,
    pub bearer: String,
    pub range: Option<ByteRange>,
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("url", &self.url.as_str())
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// Response head plus an incrementally delivered body.
///
/// Dropping `body` aborts the underlying request.
pub struct TransportResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    /// Raw `Content-Range` header, e.g. `bytes 0-1023/5000`
    pub content_range: Option<String>,
    pub content_type: Option<String>,
    pub body: BodyStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    /// Total resource length: the `Content-Range` total for partial
    /// responses, the content length for full ones.
    pub fn total_length(&self) -> Option<u64> {
        match self.content_range.as_deref() {
            Some(header) => parse_content_range_total(header),
            None if self.status == 200 => self.content_length,
            None => None,
        }
    }

    /// Drain the body into one buffer.
    pub async fn collect(mut self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(
            self.content_length.unwrap_or(0).min(64 * 1024 * 1024) as usize,
        );
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }
}

/// Parse the total from `bytes start-end/total`; `*` totals yield `None`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let rest = header.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// Build a request, fetching a fresh token.
pub async fn authorized(
    tokens: &dyn TokenProvider,
    url: Url,
    range: Option<ByteRange>,
) -> Result<TransportRequest> {
    let bearer = tokens.bearer_token().await?;
    if bearer.is_empty() {
        return Err(EngineError::Unauthorized);
    }
    Ok(TransportRequest { url, bearer, range })
}
