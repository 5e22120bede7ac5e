//! Account snapshot model

use serde::{Deserialize, Serialize};

use super::Task;

/// The complete task collection for one account plus its version stamp.
///
/// Versions increase strictly on every accepted write; version 0 means the
/// account has never written a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ordered task collection, stored and replaced as a whole
    pub tasks: Vec<Task>,
    /// Monotonic revision stamp (unix ms, bumped past ties)
    pub version: i64,
}

impl Snapshot {
    /// The empty snapshot returned for accounts that never wrote one
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            tasks: Vec::new(),
            version: 0,
        }
    }
}
