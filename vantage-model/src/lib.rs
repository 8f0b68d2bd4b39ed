//! Core data model definitions shared across Vantage crates.
#![allow(missing_docs)]

pub mod asset;
pub mod cached;
pub mod download;
pub mod error;
pub mod ids;
pub mod image;
pub mod prebuffer;
pub mod quality;
pub mod range;

// Intentionally curated re-exports for downstream consumers.
pub use asset::{AssetRecord, MediaKind};
pub use cached::CachedAsset;
pub use download::{DownloadState, DownloadTask};
pub use error::{ModelError, Result as ModelResult};
pub use ids::AssetId;
pub use image::{DecodedImage, ImagePlanes};
pub use prebuffer::PreBufferEntry;
pub use quality::{QualityTier, RemoteVariant};
pub use range::ByteRange;
