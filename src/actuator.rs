//! Pump actuator with safety interlocks.
//!
//! The actuator sits between the state machine's desired outputs and the
//! [`ActuatorPort`].  It does not trust the state machine: every cycle it
//! re-checks the interlocks below against the same level snapshot the
//! machine saw, and refuses to energise a pump that would violate them.
//!
//! ## Interlocks
//!
//! 1. **Source level**: the well pump stays off while the well is at or
//!    below its minimum safe level; the transfer pump stays off while the
//!    large tank is below its low threshold.
//! 2. **Shared capacity**: with `mutually_exclusive`, a request for both
//!    pumps at once switches both off.
//!
//! Off commands are always issued before on commands (break-before-make),
//! so two pumps are never energised together, not even between two port
//! calls.

use core::fmt;

use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::ActuatorPort;
use crate::config::PlantConfig;
use crate::error::ActuatorError;
use crate::fsm::context::{LevelSnapshot, PumpCommand, PumpId, PumpOutputs};

/// Why an interlock overrode a requested "on".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interlock {
    /// The pump's source is at or below its minimum level.
    SourceLow,
    /// Both pumps were requested while they are mutually exclusive.
    MutualExclusion,
}

impl fmt::Display for Interlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceLow => write!(f, "source level too low"),
            Self::MutualExclusion => write!(f, "pumps are mutually exclusive"),
        }
    }
}

/// Last confirmed output of one pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpStatus {
    On,
    Off,
    /// Never confirmed, or the last command failed.
    #[default]
    Unknown,
}

impl PumpStatus {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Outcome of one [`PumpActuator::apply`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// What was actually sent after interlocks.
    pub commanded: PumpOutputs,
    /// Requested "on" commands that an interlock turned off.
    pub blocked: Vec<(PumpId, Interlock)>,
    /// Commands the port did not confirm.  Retried next cycle.
    pub failures: Vec<(PumpId, ActuatorError)>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.blocked.is_empty() && self.failures.is_empty()
    }
}

/// Applies pump outputs through an [`ActuatorPort`].
pub struct PumpActuator {
    well_min_safe: f32,
    large_low: f32,
    mutually_exclusive: bool,
    status: [PumpStatus; 2],
}

impl PumpActuator {
    pub fn new(config: &PlantConfig) -> Self {
        Self {
            well_min_safe: config.well.min_safe_level,
            large_low: config.large_tank.low,
            mutually_exclusive: config.pumps.mutually_exclusive,
            status: [PumpStatus::Unknown; 2],
        }
    }

    /// Gate `desired` through the interlocks and command both pumps.
    pub fn apply(
        &mut self,
        port: &mut impl ActuatorPort,
        desired: PumpOutputs,
        levels: &LevelSnapshot,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let gated = self.gate(desired, levels, &mut report.blocked);
        report.commanded = gated;

        // Break before make.
        let mut commands = gated.commands();
        commands.sort_by_key(|c| c.on);
        for cmd in commands {
            if let Err(e) = self.command(port, cmd) {
                report.failures.push((cmd.pump, e));
            }
        }
        report
    }

    /// Switch both pumps off.  Used at startup and on fail-safe cycles.
    pub fn all_off(&mut self, port: &mut impl ActuatorPort) -> Vec<(PumpId, ActuatorError)> {
        PumpOutputs::ALL_OFF
            .commands()
            .into_iter()
            .filter_map(|cmd| self.command(port, cmd).err().map(|e| (cmd.pump, e)))
            .collect()
    }

    /// Last confirmed status of one pump.
    pub fn status(&self, pump: PumpId) -> PumpStatus {
        self.status[pump as usize]
    }

    // ── Internal ──────────────────────────────────────────────────

    fn gate(
        &self,
        desired: PumpOutputs,
        levels: &LevelSnapshot,
        blocked: &mut Vec<(PumpId, Interlock)>,
    ) -> PumpOutputs {
        let mut out = desired;

        if out.well_pump && levels.well <= self.well_min_safe {
            warn!(
                "INTERLOCK: well pump blocked, well at {:.0}% <= {:.0}%",
                levels.well, self.well_min_safe
            );
            out.well_pump = false;
            blocked.push((PumpId::WellToLarge, Interlock::SourceLow));
        }
        if out.transfer_pump && levels.large_tank < self.large_low {
            warn!(
                "INTERLOCK: transfer pump blocked, large tank at {:.0}% < {:.0}%",
                levels.large_tank, self.large_low
            );
            out.transfer_pump = false;
            blocked.push((PumpId::LargeToSmall, Interlock::SourceLow));
        }
        if self.mutually_exclusive && out.well_pump && out.transfer_pump {
            error!("INTERLOCK: both pumps requested while mutually exclusive; stopping both");
            for pump in PumpId::ALL {
                blocked.push((pump, Interlock::MutualExclusion));
            }
            out = PumpOutputs::ALL_OFF;
        }
        out
    }

    fn command(
        &mut self,
        port: &mut impl ActuatorPort,
        cmd: PumpCommand,
    ) -> Result<(), ActuatorError> {
        match port.set_pump(cmd.pump, cmd.on) {
            Ok(()) => {
                self.status[cmd.pump as usize] = if cmd.on {
                    PumpStatus::On
                } else {
                    PumpStatus::Off
                };
                Ok(())
            }
            Err(e) => {
                warn!(
                    "{} {} not confirmed: {} (retrying next cycle)",
                    cmd.pump,
                    if cmd.on { "ON" } else { "OFF" },
                    e
                );
                self.status[cmd.pump as usize] = PumpStatus::Unknown;
                Err(e)
            }
        }
    }
}
