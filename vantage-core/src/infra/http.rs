use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{
    Client,
    header::{CONTENT_RANGE, CONTENT_TYPE, HeaderMap, RANGE},
};
use tracing::{debug, info};

use crate::{
    error::{EngineError, Result},
    ports::{HttpTransport, TransportRequest, TransportResponse},
};

/// `reqwest`-backed transport.
///
/// No whole-request timeout is applied: streamed bodies for long videos
/// legitimately outlive any fixed deadline. Connect and per-read timeouts
/// catch dead peers instead.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(io_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(io_timeout)
            .read_timeout(io_timeout)
            .build()
            .map_err(|e| {
                EngineError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        info!(
            "http transport initialized; io_timeout_ms={}",
            io_timeout.as_millis()
        );
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .bearer_auth(&request.bearer);
        if let Some(range) = request.range {
            builder = builder.header(RANGE, range.header_value());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers();
        let content_range = header_string(headers, CONTENT_RANGE);
        let content_type = header_string(headers, CONTENT_TYPE);
        let content_length = response.content_length();

        debug!(
            "http response; url={}, status={}, content_range={:?}, content_length={:?}",
            request.url, status, content_range, content_length
        );

        let body = response.bytes_stream().map_err(EngineError::from).boxed();

        Ok(TransportResponse {
            status,
            content_length,
            content_range,
            content_type,
            body,
        })
    }
}
