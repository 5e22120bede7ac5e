//! ticklist-core - Core library for ticklist
//!
//! This crate contains the shared models, the versioned snapshot storage,
//! and the reminder windowing logic used by the ticklist server.

pub mod db;
pub mod error;
pub mod models;
pub mod reminder;

pub use error::{Error, Result};
pub use models::{Snapshot, Subscription, Task};
