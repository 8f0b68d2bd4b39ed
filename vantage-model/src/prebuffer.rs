use bytes::Bytes;

use crate::ids::AssetId;

/// Leading slice of a video's source bytes fetched ahead of playback.
#[derive(Clone, PartialEq, Eq)]
pub struct PreBufferEntry {
    pub asset_id: AssetId,
    /// Bytes `[0, bytes.len())` of the original resource
    pub bytes: Bytes,
    /// Full length of the resource, from the range response
    pub total_length: u64,
    pub content_type: Option<String>,
}

impl PreBufferEntry {
    pub fn buffered_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether `offset` falls inside the buffered prefix
    pub fn covers(&self, offset: u64) -> bool {
        offset < self.buffered_len()
    }

    pub fn is_complete(&self) -> bool {
        self.buffered_len() >= self.total_length
    }
}

impl std::fmt::Debug for PreBufferEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreBufferEntry")
            .field("asset_id", &self.asset_id)
            .field("buffered", &self.bytes.len())
            .field("total_length", &self.total_length)
            .field("content_type", &self.content_type)
            .finish()
    }
}
