//! Unified error types for the plant controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  Sensor and actuator errors are
//! `Copy` so they can be carried in events and reports without allocation.

use core::fmt;

use crate::app::ports::StorageError;
use crate::sensors::Sensor;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible control-cycle operation funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A sensor kept failing past the tolerated count.
    Sensor(SensorFault),
    /// The controller state could not be persisted.
    Persistence(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Persistence(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// A single failed level read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The hardware layer returned an error.
    ReadFailed,
    /// GPIO read returned an error.
    GpioReadFailed,
    /// The read did not complete within the configured timeout.
    Timeout,
    /// Reading is outside 0–100 %.
    OutOfRange,
    /// Float switches disagree (high closed while low open).
    Inconsistent,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::Timeout => write!(f, "read timed out"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Inconsistent => write!(f, "float switches inconsistent"),
        }
    }
}

/// A sensor fault that can no longer be papered over with the last good
/// value.  Fatal for the cycle in which it is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFault {
    pub sensor: Sensor,
    /// Consecutive failed reads, including this one.
    pub consecutive: u32,
    pub last_error: SensorError,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed {} consecutive reads (last: {})",
            self.sensor, self.consecutive, self.last_error
        )
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// The driver did not confirm the new output.
    NotConfirmed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::NotConfirmed => write!(f, "command not confirmed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
