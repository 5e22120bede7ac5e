//! Data models for ticklist

mod snapshot;
mod subscription;
mod task;

pub use snapshot::Snapshot;
pub use subscription::Subscription;
pub use task::{Task, STATUS_COMPLETED};
