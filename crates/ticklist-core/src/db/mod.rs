//! Database layer for ticklist

mod connection;
mod migrations;
mod settings_repository;
mod snapshot_store;
mod subscription_store;

pub use connection::Database;
pub use settings_repository::SettingsRepository;
pub use snapshot_store::{SnapshotStore, WriteOutcome};
pub use subscription_store::SubscriptionStore;
