use std::fmt::{Display, Formatter};

/// Storage and display tier of an asset payload.
///
/// Ordering is meaningful: a displayed asset only ever moves up the ladder
/// (`Preview < Original`). `Offline` marks bytes that came from durable
/// storage and is never replaced by a remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum QualityTier {
    Preview,
    Original,
    Offline,
}

impl QualityTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            QualityTier::Preview => "preview",
            QualityTier::Original => "original",
            QualityTier::Offline => "offline",
        }
    }

    /// Whether a payload at this tier is the untranscoded source
    pub const fn is_full_quality(self) -> bool {
        matches!(self, QualityTier::Original | QualityTier::Offline)
    }
}

impl Display for QualityTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical endpoint on the remote asset service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RemoteVariant {
    Thumbnail,
    /// Bounded long edge; drops the secondary stereo plane
    Preview,
    /// Untranscoded source bytes; honours `Range`
    Original,
}

impl RemoteVariant {
    /// Tier a decoded payload of this variant is published at
    pub const fn tier(self) -> Option<QualityTier> {
        match self {
            RemoteVariant::Thumbnail => None,
            RemoteVariant::Preview => Some(QualityTier::Preview),
            RemoteVariant::Original => Some(QualityTier::Original),
        }
    }
}

impl Display for RemoteVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteVariant::Thumbnail => write!(f, "thumbnail"),
            RemoteVariant::Preview => write!(f, "preview"),
            RemoteVariant::Original => write!(f, "original"),
        }
    }
}
