//! Status document for the dashboard.
//!
//! Rewritten after every cycle, fatal ones included, so the page always
//! shows the latest state, levels, pump status and any active fault.
//! Readers use [`read_status`], which retries because a read can race a
//! replace on some filesystems.

use core::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::actuator::PumpStatus;
use crate::adapters::json_file;
use crate::app::ports::StorageError;
use crate::config::{PlantConfig, TankThresholds};
use crate::fsm::StateId;
use crate::fsm::context::LevelSnapshot;

/// Pause between two [`read_status`] attempts.
const RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub updated_at: DateTime<Utc>,
    pub state: StateId,
    pub state_activated_at: DateTime<Utc>,
    pub settle_end_time: Option<DateTime<Utc>>,
    /// `None` until a first sample succeeded.
    pub levels: Option<LevelSnapshot>,
    pub well_pump: PumpStatus,
    pub transfer_pump: PumpStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// The last heartbeat is older than `timing.heartbeat_stale_secs`, or
    /// there is none yet.
    #[serde(default)]
    pub heartbeat_stale: bool,
    /// Description of the fault that failed the latest cycle, if any.
    pub fault: Option<String>,
}

impl StatusReport {
    pub fn write(&self, path: &Path) -> Result<(), StorageError> {
        json_file::write_atomic(path, self)
    }

    /// One-line summary for the cycle log.
    pub fn summary(&self, config: &PlantConfig) -> String {
        let levels = match self.levels {
            Some(l) => format!(
                "well={:.0}% ({}) large={:.0}% ({}) small={:.0}% ({})",
                l.well,
                LevelClass::of_well(l.well, config.well.min_safe_level),
                l.large_tank,
                LevelClass::classify(l.large_tank, config.large_tank.thresholds()),
                l.small_tank,
                LevelClass::classify(l.small_tank, config.small_tank),
            ),
            None => "levels unknown".to_string(),
        };
        let mut line = format!(
            "{} | {} | well_pump={:?} transfer_pump={:?}",
            self.state, levels, self.well_pump, self.transfer_pump
        );
        if let Some(end) = self.settle_end_time {
            line.push_str(&format!(" | settle until {}", end.format("%Y-%m-%d %H:%M:%S")));
        }
        if self.heartbeat_stale {
            line.push_str(" | heartbeat stale");
        }
        if let Some(fault) = &self.fault {
            line.push_str(&format!(" | FAULT: {fault}"));
        }
        line
    }
}

/// Read the status document, retrying transient failures.
///
/// A missing document is reported immediately; read and parse errors are
/// retried up to `attempts` times in total.
pub fn read_status(path: &Path, attempts: u32) -> Result<StatusReport, StorageError> {
    let attempts = attempts.max(1);
    let mut last_err = StorageError::Corrupted;
    for attempt in 1..=attempts {
        match json_file::read::<StatusReport>(path) {
            Ok(Some(report)) => return Ok(report),
            Ok(None) => return Err(StorageError::Io(std::io::ErrorKind::NotFound)),
            Err(e) => {
                debug!("Status read attempt {}/{} failed: {}", attempt, attempts, e);
                last_err = e;
            }
        }
        if attempt < attempts {
            thread::sleep(RETRY_DELAY);
        }
    }
    Err(last_err)
}

/// Coarse position of a level relative to its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelClass {
    Low,
    Normal,
    High,
}

impl LevelClass {
    pub fn classify(level: f32, thresholds: TankThresholds) -> Self {
        if level < thresholds.low {
            Self::Low
        } else if level >= thresholds.high {
            Self::High
        } else {
            Self::Normal
        }
    }

    /// The well has no upper threshold; it is either dry or not.
    pub fn of_well(level: f32, min_safe: f32) -> Self {
        if level <= min_safe { Self::Low } else { Self::Normal }
    }
}

impl fmt::Display for LevelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "ok"),
            Self::High => write!(f, "high"),
        }
    }
}
