//! Level history recorder.
//!
//! One [`LevelSample`] per completed cycle, kept in memory as a bounded
//! queue and mirrored to a JSON array for the dashboard.  The state machine
//! never reads it back.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::adapters::json_file;
use crate::app::ports::StorageError;
use crate::config::{self, HistoryConfig};
use crate::fsm::StateId;
use crate::fsm::context::{LevelSnapshot, PumpOutputs};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSample {
    pub timestamp: DateTime<Utc>,
    pub well: f32,
    pub large_tank: f32,
    pub small_tank: f32,
    pub well_pump: bool,
    pub transfer_pump: bool,
    pub state: StateId,
}

impl LevelSample {
    pub fn new(
        timestamp: DateTime<Utc>,
        levels: LevelSnapshot,
        pumps: PumpOutputs,
        state: StateId,
    ) -> Self {
        Self {
            timestamp,
            well: levels.well,
            large_tank: levels.large_tank,
            small_tank: levels.small_tank,
            well_pump: pumps.well_pump,
            transfer_pump: pumps.transfer_pump,
            state,
        }
    }

    /// Same readings, pumps and state, ignoring the timestamp.
    #[allow(clippy::float_cmp)]
    fn same_reading(&self, other: &Self) -> bool {
        self.well == other.well
            && self.large_tank == other.large_tank
            && self.small_tank == other.small_tank
            && self.well_pump == other.well_pump
            && self.transfer_pump == other.transfer_pump
            && self.state == other.state
    }
}

pub struct HistoryRecorder {
    path: PathBuf,
    config: HistoryConfig,
    samples: VecDeque<LevelSample>,
}

impl HistoryRecorder {
    /// Restore the history document at `path`.  A missing or unreadable
    /// document starts an empty history.
    pub fn load(path: impl Into<PathBuf>, config: HistoryConfig) -> Self {
        let path = path.into();
        let samples: VecDeque<LevelSample> = match json_file::read::<Vec<LevelSample>>(&path) {
            Ok(Some(v)) => v.into(),
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!("History document {} unusable ({}), starting empty", path.display(), e);
                VecDeque::new()
            }
        };
        let mut rec = Self { path, config, samples };
        if let Some(newest) = rec.samples.back().map(|s| s.timestamp) {
            rec.enforce_bounds(newest);
        }
        debug!("History restored with {} samples", rec.samples.len());
        rec
    }

    /// Append one sample and apply the retention policy.
    pub fn record(&mut self, sample: LevelSample) {
        let collapse = self.config.collapse_unchanged
            && self.samples.back().is_some_and(|last| last.same_reading(&sample));
        if collapse {
            self.samples.pop_back();
        }
        self.samples.push_back(sample);
        self.enforce_bounds(sample.timestamp);
    }

    /// Samples, oldest first.
    pub fn samples(&self) -> &VecDeque<LevelSample> {
        &self.samples
    }

    pub fn latest(&self) -> Option<&LevelSample> {
        self.samples.back()
    }

    /// Write the whole history atomically.
    pub fn flush(&self) -> Result<(), StorageError> {
        json_file::write_atomic(&self.path, &self.samples)
    }

    fn enforce_bounds(&mut self, now: DateTime<Utc>) {
        // A window reaching before chrono's earliest date keeps everything.
        let cutoff = self
            .config
            .retention_secs
            .and_then(|secs| now.checked_sub_signed(config::seconds(secs)));
        if let Some(cutoff) = cutoff {
            while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
                self.samples.pop_front();
            }
        }
        while self.samples.len() > self.config.max_samples {
            self.samples.pop_front();
        }
    }
}
