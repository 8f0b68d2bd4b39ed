//! Range streaming for video playback.

mod bridge;
pub mod splice;
pub mod virtual_url;

pub use bridge::StreamingBridge;
pub use splice::{SplicePlan, plan_splice};
pub use virtual_url::VIRTUAL_SCHEME;
