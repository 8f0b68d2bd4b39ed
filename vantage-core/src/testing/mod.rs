//! In-memory collaborators for tests and local demos.
//!
//! Nothing here touches the network or disk.

pub mod fixtures;
pub mod transport;

pub use transport::{FakeAssetService, FakeTransport};
