//! GPIO binding over `embedded-hal` digital pins.
//!
//! Each tank carries two float switches.  With the usual pull-up wiring a
//! closed switch pulls its pin low:
//!
//! | low switch | high switch | reading |
//! |------------|-------------|---------|
//! | open       | open        |   0 %   |
//! | closed     | open        |  50 %   |
//! | closed     | closed      | 100 %   |
//! | open       | closed      | [`SensorError::Inconsistent`] |
//!
//! The well uses the same pair; its low switch sits at the dry-run mark, so
//! an open low switch reads 0 % and trips the dry-run guard.
//!
//! Pumps are driven through active-high relays.  A command counts as
//! confirmed when the pin reads back the requested level.

use std::time::Duration;

use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
use log::error;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::error::{ActuatorError, SensorError};
use crate::fsm::context::PumpId;
use crate::sensors::Sensor;

/// Percentage reported for the three valid switch combinations.
pub const LEVEL_EMPTY: f32 = 0.0;
pub const LEVEL_MEDIUM: f32 = 50.0;
pub const LEVEL_FULL: f32 = 100.0;

// ── Channels ──────────────────────────────────────────────────

/// One level input, type-erased so the plant can mix pin types.
pub trait LevelChannel {
    fn read(&mut self) -> Result<f32, SensorError>;
}

/// One pump output.
pub trait RelayChannel {
    fn set(&mut self, on: bool) -> Result<(), ActuatorError>;
}

/// A pair of float switches on two input pins.
pub struct FloatSwitchPair<L, H> {
    low: L,
    high: H,
}

impl<L: InputPin, H: InputPin> FloatSwitchPair<L, H> {
    pub fn new(low: L, high: H) -> Self {
        Self { low, high }
    }
}

impl<L: InputPin, H: InputPin> LevelChannel for FloatSwitchPair<L, H> {
    fn read(&mut self) -> Result<f32, SensorError> {
        let low_closed = self.low.is_low().map_err(|_| SensorError::GpioReadFailed)?;
        let high_closed = self.high.is_low().map_err(|_| SensorError::GpioReadFailed)?;
        match (low_closed, high_closed) {
            (false, false) => Ok(LEVEL_EMPTY),
            (true, false) => Ok(LEVEL_MEDIUM),
            (true, true) => Ok(LEVEL_FULL),
            (false, true) => Err(SensorError::Inconsistent),
        }
    }
}

/// An active-high pump relay.
pub struct PumpRelay<P> {
    pin: P,
}

impl<P: StatefulOutputPin> PumpRelay<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: StatefulOutputPin> RelayChannel for PumpRelay<P> {
    fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        let written = if on { self.pin.set_high() } else { self.pin.set_low() };
        written.map_err(|_| ActuatorError::GpioWriteFailed)?;
        let is_high = self
            .pin
            .is_set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        if is_high == on {
            Ok(())
        } else {
            Err(ActuatorError::NotConfirmed)
        }
    }
}

// ── Plant ─────────────────────────────────────────────────────

/// The whole plant on GPIO: three sensor pairs and two relays.
pub struct GpioPlant {
    well: Box<dyn LevelChannel>,
    large_tank: Box<dyn LevelChannel>,
    small_tank: Box<dyn LevelChannel>,
    well_pump: Box<dyn RelayChannel>,
    transfer_pump: Box<dyn RelayChannel>,
}

impl GpioPlant {
    pub fn new(
        well: Box<dyn LevelChannel>,
        large_tank: Box<dyn LevelChannel>,
        small_tank: Box<dyn LevelChannel>,
        well_pump: Box<dyn RelayChannel>,
        transfer_pump: Box<dyn RelayChannel>,
    ) -> Self {
        Self {
            well,
            large_tank,
            small_tank,
            well_pump,
            transfer_pump,
        }
    }
}

impl SensorPort for GpioPlant {
    /// GPIO reads complete immediately, so the timeout never applies.
    fn read_level(&mut self, sensor: Sensor, _timeout: Duration) -> Result<f32, SensorError> {
        match sensor {
            Sensor::Well => self.well.read(),
            Sensor::LargeTank => self.large_tank.read(),
            Sensor::SmallTank => self.small_tank.read(),
        }
    }
}

impl ActuatorPort for GpioPlant {
    fn set_pump(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError> {
        let relay = match pump {
            PumpId::WellToLarge => &mut self.well_pump,
            PumpId::LargeToSmall => &mut self.transfer_pump,
        };
        relay.set(on).inspect_err(|e| error!("GPIO: {} relay: {}", pump, e))
    }
}
