//! Adapters implementing [`crate::ports`] for production and embedding.

pub mod cacache_store;
pub mod http;
pub mod memory;

pub use cacache_store::{AssetCacheRoot, CacacheStore};
pub use http::ReqwestTransport;
pub use memory::{MemorySpatialClassifier, MemoryStore, StaticTokenProvider};
