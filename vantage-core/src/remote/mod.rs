//! Remote asset service access: endpoint layout plus authenticated fetches.

mod endpoints;

pub use endpoints::AssetEndpoints;

use std::{fmt, sync::Arc};

use bytes::Bytes;
use tracing::debug;
use vantage_model::{AssetId, ByteRange, RemoteVariant};

use crate::{
    error::{EngineError, Result},
    ports::{
        HttpTransport, TokenProvider, TransportResponse, transport::authorized,
    },
};

/// Authenticated reads against the remote asset service.
///
/// Cheap to clone; every component that talks to the network holds one.
#[derive(Clone)]
pub struct RemoteAssets {
    endpoints: AssetEndpoints,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for RemoteAssets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAssets")
            .field("endpoints", &self.endpoints)
            .field(
                "transport",
                &std::any::type_name_of_val(self.transport.as_ref()),
            )
            .finish_non_exhaustive()
    }
}

impl RemoteAssets {
    pub fn new(
        endpoints: AssetEndpoints,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            endpoints,
            transport,
            tokens,
        }
    }

    pub fn endpoints(&self) -> &AssetEndpoints {
        &self.endpoints
    }

    /// Open a (possibly ranged) read and validate its status.
    ///
    /// The body is left unread so callers can stream it.
    pub async fn open(
        &self,
        id: AssetId,
        variant: RemoteVariant,
        range: Option<ByteRange>,
    ) -> Result<TransportResponse> {
        let url = self.endpoints.url_for(id, variant)?;
        let request = authorized(self.tokens.as_ref(), url, range).await?;
        let response = self.transport.get(request).await?;
        EngineError::check_status(response.status)?;
        Ok(response)
    }

    /// Fetch a whole variant into memory.
    pub async fn fetch(&self, id: AssetId, variant: RemoteVariant) -> Result<Bytes> {
        let response = self.open(id, variant, None).await?;
        let bytes = response.collect().await?;
        debug!(
            "remote fetch complete; asset_id={id}, variant={variant}, bytes={}",
            bytes.len()
        );
        if bytes.is_empty() {
            return Err(EngineError::NotFound(format!(
                "empty {variant} payload for {id}"
            )));
        }
        Ok(bytes)
    }
}
