use std::fmt::{Display, Formatter};

use crate::ids::AssetId;

/// Kind of media an asset carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MediaKind {
    /// Still image, possibly a stereo pair
    Image,
    /// Video, streamed rather than decoded
    Video,
}

impl MediaKind {
    pub const fn is_video(self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// One entry of the ordered asset list handed to the window cache.
///
/// Immutable for the lifetime of a session; its position in the list is
/// its navigation index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetRecord {
    pub id: AssetId,
    pub kind: MediaKind,
    pub filename: String,
    /// Whether the directory already knows this asset holds stereo content
    pub is_spatial: bool,
}

impl AssetRecord {
    pub fn new(id: AssetId, kind: MediaKind, filename: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            filename: filename.into(),
            is_spatial: false,
        }
    }

    pub fn image(filename: impl Into<String>) -> Self {
        Self::new(AssetId::new(), MediaKind::Image, filename)
    }

    pub fn video(filename: impl Into<String>) -> Self {
        Self::new(AssetId::new(), MediaKind::Video, filename)
    }

    pub fn with_spatial(mut self, is_spatial: bool) -> Self {
        self.is_spatial = is_spatial;
        self
    }

    pub fn is_video(&self) -> bool {
        self.kind.is_video()
    }
}
