//! State persistence manager.
//!
//! Stores the [`ControllerState`] record as a small JSON document:
//!
//! ```json
//! {
//!   "current_state": "Settling",
//!   "state_activated_at": "2024-06-01T08:00:00Z",
//!   "settle_end_time": "2024-06-01T20:00:00Z"
//! }
//! ```
//!
//! Deleting the document while the service is stopped is the reset
//! procedure: the next start finds nothing and begins in `Idle`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};

use crate::adapters::json_file;
use crate::app::ports::{StatePort, StorageError};
use crate::fsm::ControllerState;

/// [`StatePort`] backed by an atomically replaced JSON file.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatePort for JsonStateStore {
    fn load(&self) -> Result<Option<ControllerState>, StorageError> {
        json_file::read(&self.path)
    }

    fn save(&mut self, state: &ControllerState) -> Result<(), StorageError> {
        json_file::write_atomic(&self.path, state)
    }
}

/// Load the persisted record, falling back to the reset record.
///
/// A missing, unreadable or corrupted document yields `Idle` activated at
/// `now` with no settle deadline.  A record that breaks the settle-deadline
/// invariant is repaired rather than discarded, so an interrupted settle
/// keeps its original deadline.
pub fn load_or_default(
    store: &impl StatePort,
    now: DateTime<Utc>,
    settle: TimeDelta,
) -> ControllerState {
    match store.load() {
        Ok(Some(record)) => {
            info!(
                "Resuming {} (since {}, settle until {:?})",
                record.current_state, record.state_activated_at, record.settle_end_time
            );
            record.repaired(settle)
        }
        Ok(None) => {
            info!("No state document, starting in Idle");
            ControllerState::idle(now)
        }
        Err(e) => {
            warn!("State document unusable ({}), starting in Idle", e);
            ControllerState::idle(now)
        }
    }
}
