//! Level sensor subsystem: sensor identities and the [`LevelReader`].
//!
//! The reader polls every sensor through the [`SensorPort`] once per cycle
//! and produces a [`LevelSnapshot`] for the state machine.
//!
//! Individual read failures are logged and the previous good value is
//! reused; a single flaky float switch must not stop the plant.  A sensor
//! that keeps failing beyond the configured count (or that has never
//! produced a good value) fails the whole sample; the caller then forces
//! every pump off.

use core::fmt;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::SensorPort;
use crate::config::PlantConfig;
use crate::error::{SensorError, SensorFault};
use crate::fsm::context::LevelSnapshot;

/// The three level sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    Well,
    LargeTank,
    SmallTank,
}

impl Sensor {
    pub const ALL: [Self; 3] = [Self::Well, Self::LargeTank, Self::SmallTank];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Well => "well",
            Self::LargeTank => "large_tank",
            Self::SmallTank => "small_tank",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A read failure that was absorbed by reusing the last good value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleratedFault {
    pub sensor: Sensor,
    pub consecutive: u32,
    pub error: SensorError,
}

/// Result of one successful sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub levels: LevelSnapshot,
    /// Sensors whose value was carried over from a previous cycle.
    pub tolerated: Vec<ToleratedFault>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Channel {
    last_good: Option<f32>,
    consecutive_failures: u32,
}

/// Polls the level sensors with last-known-good fallback.
pub struct LevelReader {
    channels: [Channel; 3],
    max_consecutive_failures: u32,
    timeout: Duration,
}

impl LevelReader {
    pub fn new(config: &PlantConfig) -> Self {
        Self {
            channels: [Channel::default(); 3],
            max_consecutive_failures: config.sensors.max_consecutive_failures,
            timeout: config.timing.sensor_timeout(),
        }
    }

    /// Read all three sensors.
    ///
    /// Every sensor is polled even when an earlier one fails, so the
    /// counters stay accurate.  The first persistent fault is returned.
    pub fn sample(&mut self, port: &mut impl SensorPort) -> Result<Sample, SensorFault> {
        let mut sample = Sample::default();
        let mut fatal: Option<SensorFault> = None;

        for sensor in Sensor::ALL {
            let result = port
                .read_level(sensor, self.timeout)
                .and_then(check_range);
            match self.absorb(sensor, result) {
                Ok((value, tolerated)) => {
                    set_level(&mut sample.levels, sensor, value);
                    sample.tolerated.extend(tolerated);
                }
                Err(fault) => {
                    fatal.get_or_insert(fault);
                }
            }
        }

        match fatal {
            Some(fault) => Err(fault),
            None => Ok(sample),
        }
    }

    /// Consecutive failure count for one sensor.
    pub fn failures(&self, sensor: Sensor) -> u32 {
        self.channels[sensor.index()].consecutive_failures
    }

    /// Last good value for one sensor, if any was ever read.
    pub fn last_good(&self, sensor: Sensor) -> Option<f32> {
        self.channels[sensor.index()].last_good
    }

    // ── Internal ──────────────────────────────────────────────────

    fn absorb(
        &mut self,
        sensor: Sensor,
        result: Result<f32, SensorError>,
    ) -> Result<(f32, Option<ToleratedFault>), SensorFault> {
        let limit = self.max_consecutive_failures;
        let ch = &mut self.channels[sensor.index()];

        match result {
            Ok(value) => {
                if ch.consecutive_failures > 0 {
                    info!(
                        "{} sensor recovered after {} failed reads",
                        sensor, ch.consecutive_failures
                    );
                }
                ch.consecutive_failures = 0;
                ch.last_good = Some(value);
                Ok((value, None))
            }
            Err(err) => {
                ch.consecutive_failures = ch.consecutive_failures.saturating_add(1);
                let fault = SensorFault {
                    sensor,
                    consecutive: ch.consecutive_failures,
                    last_error: err,
                };
                match ch.last_good {
                    Some(value) if ch.consecutive_failures <= limit => {
                        warn!(
                            "{} sensor read failed ({}), reusing {:.0}% [{}/{}]",
                            sensor, err, value, ch.consecutive_failures, limit
                        );
                        Ok((
                            value,
                            Some(ToleratedFault {
                                sensor,
                                consecutive: ch.consecutive_failures,
                                error: err,
                            }),
                        ))
                    }
                    Some(_) => {
                        error!("SENSOR FAULT: {}", fault);
                        Err(fault)
                    }
                    None => {
                        error!("SENSOR FAULT: {} (no good reading yet)", fault);
                        Err(fault)
                    }
                }
            }
        }
    }
}

fn check_range(value: f32) -> Result<f32, SensorError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(SensorError::OutOfRange)
    }
}

fn set_level(levels: &mut LevelSnapshot, sensor: Sensor, value: f32) {
    match sensor {
        Sensor::Well => levels.well = value,
        Sensor::LargeTank => levels.large_tank = value,
        Sensor::SmallTank => levels.small_tank = value,
    }
}
