//! Shared context threaded through every FSM handler.
//!
//! `FsmContext` holds what the state handlers read each cycle: the latest
//! level snapshot, the cycle's wall-clock time and the configuration.  It
//! is rebuilt by the control service before every evaluation; handlers
//! never mutate it.

use core::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PlantConfig;

// ---------------------------------------------------------------------------
// Level snapshot (written by the level reader)
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of the three level sensors, in percent of full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub well: f32,
    pub large_tank: f32,
    pub small_tank: f32,
}

// ---------------------------------------------------------------------------
// Pumps
// ---------------------------------------------------------------------------

/// The two transfer pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpId {
    /// Well → large (settling) tank.
    WellToLarge,
    /// Large tank → small (service) tank.
    LargeToSmall,
}

impl PumpId {
    pub const ALL: [Self; 2] = [Self::WellToLarge, Self::LargeToSmall];

    pub fn name(self) -> &'static str {
        match self {
            Self::WellToLarge => "well_pump",
            Self::LargeToSmall => "transfer_pump",
        }
    }
}

impl fmt::Display for PumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One ephemeral pump command.  Computed each cycle, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpCommand {
    pub pump: PumpId,
    pub on: bool,
}

/// Desired pump outputs for a state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpOutputs {
    pub well_pump: bool,
    pub transfer_pump: bool,
}

impl PumpOutputs {
    /// Both pumps off.
    pub const ALL_OFF: Self = Self {
        well_pump: false,
        transfer_pump: false,
    };

    pub fn get(&self, pump: PumpId) -> bool {
        match pump {
            PumpId::WellToLarge => self.well_pump,
            PumpId::LargeToSmall => self.transfer_pump,
        }
    }

    pub fn set(&mut self, pump: PumpId, on: bool) {
        match pump {
            PumpId::WellToLarge => self.well_pump = on,
            PumpId::LargeToSmall => self.transfer_pump = on,
        }
    }

    pub fn any_on(&self) -> bool {
        self.well_pump || self.transfer_pump
    }

    pub fn commands(&self) -> [PumpCommand; 2] {
        PumpId::ALL.map(|pump| PumpCommand {
            pump,
            on: self.get(pump),
        })
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The read-only context passed to every state handler function.
#[derive(Debug, Clone)]
pub struct FsmContext {
    /// Wall-clock time of the current cycle.
    pub now: DateTime<Utc>,
    /// Latest levels.  Updated before each evaluation.
    pub levels: LevelSnapshot,
    /// Plant configuration.
    pub config: PlantConfig,
}

impl FsmContext {
    pub fn new(config: PlantConfig, now: DateTime<Utc>) -> Self {
        Self {
            now,
            levels: LevelSnapshot::default(),
            config,
        }
    }

    /// Time elapsed since `since`, clamped at zero if the clock stepped back.
    pub fn elapsed_since(&self, since: DateTime<Utc>) -> TimeDelta {
        (self.now - since).max(TimeDelta::zero())
    }

    /// At or below the well's dry-run guard.
    pub fn well_dry(&self) -> bool {
        self.levels.well <= self.config.well.min_safe_level
    }

    pub fn large_below_low(&self) -> bool {
        self.levels.large_tank < self.config.large_tank.low
    }

    pub fn large_at_high(&self) -> bool {
        self.levels.large_tank >= self.config.large_tank.high
    }

    pub fn large_usable(&self) -> bool {
        self.levels.large_tank >= self.config.large_tank.usable_min
    }

    pub fn small_below_low(&self) -> bool {
        self.levels.small_tank < self.config.small_tank.low
    }

    pub fn small_below_high(&self) -> bool {
        self.levels.small_tank < self.config.small_tank.high
    }

    pub fn small_at_high(&self) -> bool {
        !self.small_below_high()
    }
}
