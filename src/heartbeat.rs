//! Liveness heartbeat.
//!
//! The control loop stamps `{ "last_cycle_at": ... }` after every completed
//! cycle.  A watchdog or the dashboard compares it against the configured
//! staleness threshold; a stale heartbeat means the loop has stalled or is
//! failing every cycle.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::adapters::json_file;
use crate::app::ports::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub last_cycle_at: DateTime<Utc>,
}

impl Heartbeat {
    /// `true` when more than `threshold` has passed since the last cycle.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        now - self.last_cycle_at > threshold
    }

    /// Read the heartbeat document.  `Ok(None)` if it was never written.
    pub fn read(path: &Path) -> Result<Option<Self>, StorageError> {
        json_file::read(path)
    }
}

pub struct HeartbeatMonitor {
    path: PathBuf,
    last: Option<Heartbeat>,
}

impl HeartbeatMonitor {
    /// Open the monitor, picking up the heartbeat left by a previous run.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last = Heartbeat::read(&path).unwrap_or_else(|e| {
            warn!("Heartbeat document unreadable ({}), ignoring it", e);
            None
        });
        Self { path, last }
    }

    /// Record a completed cycle.
    pub fn stamp(&mut self, now: DateTime<Utc>) -> Result<(), StorageError> {
        let beat = Heartbeat { last_cycle_at: now };
        json_file::write_atomic(&self.path, &beat)?;
        self.last = Some(beat);
        Ok(())
    }

    pub fn last(&self) -> Option<Heartbeat> {
        self.last
    }

    /// A monitor that never stamped counts as stale.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        self.last.is_none_or(|hb| hb.is_stale(now, threshold))
    }
}
