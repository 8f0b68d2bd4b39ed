use crate::ids::AssetId;

/// Lifecycle of an offline download.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "state", rename_all = "lowercase"))]
pub enum DownloadState {
    Queued,
    Downloading,
    Done,
    Failed { reason: String },
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Done
                | DownloadState::Failed { .. }
                | DownloadState::Cancelled
        )
    }
}

/// Snapshot of one offline download.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DownloadTask {
    pub asset_id: AssetId,
    pub state: DownloadState,
    pub downloaded_bytes: u64,
    /// Declared content length; `None` until the response headers arrive
    pub total_bytes: Option<u64>,
}

impl DownloadTask {
    pub fn queued(asset_id: AssetId) -> Self {
        Self {
            asset_id,
            state: DownloadState::Queued,
            downloaded_bytes: 0,
            total_bytes: None,
        }
    }

    /// Completed fraction in `[0, 1]` when the length is known
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => {
                Some((self.downloaded_bytes as f64 / total as f64).min(1.0))
            }
            None => None,
        }
    }
}
