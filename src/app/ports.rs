//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Driven adapters (level sensors, pump relays, event sinks, the state
//! document, the clock) implement these traits.  The
//! [`ControlService`](super::service::ControlService) consumes them via
//! generics, so the domain core never touches hardware or files directly.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{ActuatorError, SensorError};
use crate::fsm::ControllerState;
use crate::fsm::context::PumpId;
use crate::sensors::Sensor;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain level readings.
pub trait SensorPort {
    /// Read one level sensor as a percentage of full.
    ///
    /// Implementations must give up after `timeout` and report
    /// [`SensorError::Timeout`] rather than stall the control cycle.
    fn read_level(&mut self, sensor: Sensor, timeout: Duration) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command pumps.
///
/// Commands are idempotent; reasserting the current output is safe and
/// happens every cycle.
pub trait ActuatorPort {
    /// Switch a pump on or off.  `Ok` means the output was confirmed.
    fn set_pump(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// State port (driven adapter: domain ↔ state document)
// ───────────────────────────────────────────────────────────────

/// Durable storage for the [`ControllerState`] record.
///
/// # Contract
///
/// - `save` MUST be atomic with respect to a crash: the canonical document
///   is either the previous record or the new one, never a partial write.
/// - `load` returns `Ok(None)` when no record exists.  Defaulting and
///   repair are the caller's business (see
///   [`persistence::load_or_default`](crate::persistence::load_or_default)).
pub trait StatePort {
    fn load(&self) -> Result<Option<ControllerState>, StorageError>;

    fn save(&mut self, state: &ControllerState) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source.  Timestamps are persisted, so this is UTC wall time,
/// not a monotonic uptime counter.
pub trait ClockPort {
    fn now(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from loading the configuration document.  All are fatal at
/// startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No config document at the given path.
    NotFound,
    /// The document could not be read.
    IoError,
    /// The document is not valid JSON or misses required fields.
    Malformed(String),
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

/// Errors from reading or writing the shared documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Generic I/O error.
    Io(std::io::ErrorKind),
    /// Stored document failed to deserialize.
    Corrupted,
    /// Value could not be serialized.
    Encode,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::IoError => write!(f, "I/O error"),
            Self::Malformed(msg) => write!(f, "malformed config: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "I/O error ({})", kind),
            Self::Corrupted => write!(f, "document corrupted"),
            Self::Encode => write!(f, "encode error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}
