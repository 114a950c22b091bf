//! Outbound application events.
//!
//! The [`ControlService`](super::service::ControlService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: write to the log, feed a
//! watchdog, forward to a dashboard.

use chrono::{DateTime, Utc};

use crate::actuator::Interlock;
use crate::app::ports::StorageError;
use crate::error::{ActuatorError, SensorFault};
use crate::fsm::StateId;
use crate::fsm::context::{LevelSnapshot, PumpId, PumpOutputs};
use crate::sensors::ToleratedFault;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (carries the resumed state).
    Started { state: StateId, since: DateTime<Utc> },

    /// A transition was persisted and committed.
    StateChanged {
        from: StateId,
        to: StateId,
        at: DateTime<Utc>,
    },

    /// A sensor read failed and the last good value was reused.
    SensorTolerated(ToleratedFault),

    /// A sensor failed beyond tolerance; the cycle was aborted.
    SensorFault(SensorFault),

    /// An interlock overrode a requested pump output.
    InterlockBlocked { pump: PumpId, interlock: Interlock },

    /// A pump command was not confirmed.
    ActuatorFault { pump: PumpId, error: ActuatorError },

    /// The state document could not be written; the cycle was aborted.
    PersistenceFault(StorageError),

    /// End-of-cycle snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time snapshot suitable for logging or transmission.
#[derive(Debug, Clone)]
pub struct TelemetryData {
    pub at: DateTime<Utc>,
    pub state: StateId,
    pub levels: LevelSnapshot,
    /// Outputs commanded this cycle, after interlocks.
    pub pumps: PumpOutputs,
    /// Sensors running on a carried-over value.
    pub tolerated: usize,
}
