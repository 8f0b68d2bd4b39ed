//! Collaborator contracts the engine depends on.
//!
//! Everything behind these traits (asset directory, remote service, disk
//! store, classifier, playback engine) lives outside the crate; adapters in
//! [`crate::infra`] provide production and in-memory implementations.

pub mod classifier;
pub mod playback;
pub mod store;
pub mod transport;

pub use classifier::SpatialClassifier;
pub use playback::{
    ContentInfo, DataRequest, LoadingEvent, LoadingReceiver, PlaybackDataSource,
    RequestId,
};
pub use store::DurableStore;
pub use transport::{
    BodyStream, HttpTransport, TokenProvider, TransportRequest,
    TransportResponse,
};
