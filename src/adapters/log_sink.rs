//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events
//! through the `log` facade (stderr via `env_logger` in the service
//! binary).  A watchdog or dashboard forwarder would implement the same
//! trait.

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                debug!(
                    "TELEM | state={} | well={:.0}% large={:.0}% small={:.0}% | \
                     well_pump={} transfer_pump={} | tolerated={}",
                    t.state,
                    t.levels.well,
                    t.levels.large_tank,
                    t.levels.small_tank,
                    if t.pumps.well_pump { "ON" } else { "off" },
                    if t.pumps.transfer_pump { "ON" } else { "off" },
                    t.tolerated,
                );
            }
            AppEvent::StateChanged { from, to, at } => {
                info!("STATE | {} -> {} at {}", from, to, at.format("%Y-%m-%d %H:%M:%S"));
            }
            AppEvent::Started { state, since } => {
                info!("START | state={} since {}", state, since.format("%Y-%m-%d %H:%M:%S"));
            }
            AppEvent::SensorTolerated(t) => {
                warn!(
                    "SENSOR | {} read failed ({}), carried over [{} in a row]",
                    t.sensor, t.error, t.consecutive
                );
            }
            AppEvent::SensorFault(fault) => {
                error!("FAULT | sensor: {}", fault);
            }
            AppEvent::InterlockBlocked { pump, interlock } => {
                warn!("INTERLOCK | {} held off: {}", pump, interlock);
            }
            AppEvent::ActuatorFault { pump, error } => {
                warn!("FAULT | {}: {}", pump, error);
            }
            AppEvent::PersistenceFault(e) => {
                error!("FAULT | state document: {}", e);
            }
        }
    }
}
