//! Simulated plant.
//!
//! Implements [`SensorPort`] and [`ActuatorPort`] over a simple water
//! balance so the controller can run on a bench with no hardware attached:
//!
//! - the well recharges at `1 / well_fill_secs` while its pump is off and
//!   drains at `1 / well_empty_secs` while it runs;
//! - the well pump fills the large tank at `1 / large_fill_secs` as long as
//!   the well has water;
//! - the transfer pump fills the small tank at `1 / small_fill_secs`, taking
//!   a proportional volume out of the large tank;
//! - household draw empties the small tank at `1 / small_drain_secs`.
//!
//! Time either follows the host clock (every port call integrates the real
//! elapsed time) or is advanced by hand with [`SimulatedPlant::advance`].

use std::time::{Duration, Instant};

use log::debug;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::HardwareConfig;
use crate::error::{ActuatorError, SensorError};
use crate::fsm::context::{LevelSnapshot, PumpId, PumpOutputs};
use crate::sensors::Sensor;

/// Small tank volume as a fraction of the large tank.
const SMALL_TANK_SHARE: f64 = 0.25;

enum SimTime {
    Wall(Instant),
    Manual,
}

pub struct SimulatedPlant {
    rates: HardwareConfig,
    /// Levels as fractions of full (0.0 – 1.0).
    well: f64,
    large: f64,
    small: f64,
    pumps: PumpOutputs,
    time: SimTime,
}

impl SimulatedPlant {
    /// A plant that follows the host clock.
    pub fn new(rates: HardwareConfig, initial: LevelSnapshot) -> Self {
        Self::build(rates, initial, SimTime::Wall(Instant::now()))
    }

    /// A plant whose time only moves through [`advance`](Self::advance).
    pub fn manual(rates: HardwareConfig, initial: LevelSnapshot) -> Self {
        Self::build(rates, initial, SimTime::Manual)
    }

    fn build(rates: HardwareConfig, initial: LevelSnapshot, time: SimTime) -> Self {
        Self {
            rates,
            well: fraction(initial.well),
            large: fraction(initial.large_tank),
            small: fraction(initial.small_tank),
            pumps: PumpOutputs::ALL_OFF,
            time,
        }
    }

    /// Integrate the model over `dt` with the current pump outputs.
    pub fn advance(&mut self, dt: Duration) {
        let secs = dt.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let r = &self.rates;

        if self.pumps.well_pump {
            let drawn = (secs / r.well_empty_secs as f64).min(self.well);
            self.well -= drawn;
            if drawn > 0.0 {
                self.large += secs / r.large_fill_secs as f64;
            }
        } else {
            self.well += secs / r.well_fill_secs as f64;
        }

        if self.pumps.transfer_pump && self.large > 0.0 {
            let moved = (secs / r.small_fill_secs as f64).min(self.large / SMALL_TANK_SHARE);
            self.small += moved;
            self.large -= moved * SMALL_TANK_SHARE;
        }
        self.small -= secs / r.small_drain_secs as f64;

        self.well = self.well.clamp(0.0, 1.0);
        self.large = self.large.clamp(0.0, 1.0);
        self.small = self.small.clamp(0.0, 1.0);
    }

    /// Current levels in percent.
    pub fn levels(&self) -> LevelSnapshot {
        LevelSnapshot {
            well: percent(self.well),
            large_tank: percent(self.large),
            small_tank: percent(self.small),
        }
    }

    pub fn pumps(&self) -> PumpOutputs {
        self.pumps
    }

    fn catch_up(&mut self) {
        if let SimTime::Wall(last) = self.time {
            let now = Instant::now();
            self.time = SimTime::Wall(now);
            self.advance(now.duration_since(last));
        }
    }
}

fn fraction(pct: f32) -> f64 {
    (f64::from(pct) / 100.0).clamp(0.0, 1.0)
}

fn percent(frac: f64) -> f32 {
    (frac * 100.0) as f32
}

impl SensorPort for SimulatedPlant {
    fn read_level(&mut self, sensor: Sensor, _timeout: Duration) -> Result<f32, SensorError> {
        self.catch_up();
        let levels = self.levels();
        Ok(match sensor {
            Sensor::Well => levels.well,
            Sensor::LargeTank => levels.large_tank,
            Sensor::SmallTank => levels.small_tank,
        })
    }
}

impl ActuatorPort for SimulatedPlant {
    fn set_pump(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError> {
        self.catch_up();
        if self.pumps.get(pump) != on {
            debug!("SIM: {} {}", pump, if on { "on" } else { "off" });
        }
        self.pumps.set(pump, on);
        Ok(())
    }
}
