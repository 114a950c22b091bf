//! Mock plant and fixtures for integration tests.
//!
//! The mock records every pump call so tests can assert on the full
//! command history, and lets a test break individual sensors, pumps or the
//! state document on demand.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tempfile::TempDir;

use potable::adapters::clock::ManualClock;
use potable::app::events::AppEvent;
use potable::app::ports::{ActuatorPort, EventSink, SensorPort, StatePort, StorageError};
use potable::app::service::ControlService;
use potable::config::PlantConfig;
use potable::error::{ActuatorError, SensorError};
use potable::fsm::context::{LevelSnapshot, PumpId, PumpOutputs};
use potable::fsm::{ControllerState, StateId};
use potable::persistence::JsonStateStore;
use potable::sensors::Sensor;

// ── MockPlant ─────────────────────────────────────────────────

pub struct MockPlant {
    pub levels: LevelSnapshot,
    pub outputs: PumpOutputs,
    /// Every `set_pump` call, in order.
    pub calls: Vec<(PumpId, bool)>,
    /// Sensors that fail every read while set.
    pub broken_sensors: Vec<Sensor>,
    /// Pump whose commands are never confirmed.
    pub stuck_pump: Option<PumpId>,
}

#[allow(dead_code)]
impl MockPlant {
    pub fn new(well: f32, large: f32, small: f32) -> Self {
        Self {
            levels: LevelSnapshot {
                well,
                large_tank: large,
                small_tank: small,
            },
            // Unknown outputs at power-up; the service must force them off.
            outputs: PumpOutputs {
                well_pump: true,
                transfer_pump: true,
            },
            calls: Vec::new(),
            broken_sensors: Vec::new(),
            stuck_pump: None,
        }
    }

    pub fn set_levels(&mut self, well: f32, large: f32, small: f32) {
        self.levels = LevelSnapshot {
            well,
            large_tank: large,
            small_tank: small,
        };
    }

    pub fn well_pump_on(&self) -> bool {
        self.outputs.well_pump
    }

    pub fn transfer_pump_on(&self) -> bool {
        self.outputs.transfer_pump
    }
}

impl SensorPort for MockPlant {
    fn read_level(&mut self, sensor: Sensor, _timeout: Duration) -> Result<f32, SensorError> {
        if self.broken_sensors.contains(&sensor) {
            return Err(SensorError::Timeout);
        }
        Ok(match sensor {
            Sensor::Well => self.levels.well,
            Sensor::LargeTank => self.levels.large_tank,
            Sensor::SmallTank => self.levels.small_tank,
        })
    }
}

impl ActuatorPort for MockPlant {
    fn set_pump(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError> {
        self.calls.push((pump, on));
        if self.stuck_pump == Some(pump) {
            return Err(ActuatorError::NotConfirmed);
        }
        self.outputs.set(pump, on);
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn transitions(&self) -> Vec<(StateId, StateId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── FlakyStore ────────────────────────────────────────────────

/// The real JSON store with a switch that makes `save` fail.
pub struct FlakyStore {
    inner: JsonStateStore,
    pub failing: Rc<Cell<bool>>,
}

impl StatePort for FlakyStore {
    fn load(&self) -> Result<Option<ControllerState>, StorageError> {
        self.inner.load()
    }

    fn save(&mut self, state: &ControllerState) -> Result<(), StorageError> {
        if self.failing.get() {
            return Err(StorageError::Io(std::io::ErrorKind::StorageFull));
        }
        self.inner.save(state)
    }
}

// ── Fixture ───────────────────────────────────────────────────

pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Thresholds: well min 10, large 40/85 (usable 50), small 50/85,
/// settle one hour, 30 s cycles.
pub fn config_json(dir: &Path) -> String {
    format!(
        r#"{{
            "pins": {{
                "well": {{ "low_pin": 5, "high_pin": 6 }},
                "large_tank": {{ "low_pin": 13, "high_pin": 19 }},
                "small_tank": {{ "low_pin": 26, "high_pin": 21 }},
                "well_pump": 17,
                "transfer_pump": 27
            }},
            "well": {{ "min_safe_level": 10 }},
            "large_tank": {{ "low": 40, "high": 85, "usable_min": 50 }},
            "small_tank": {{ "low": 50, "high": 85 }},
            "timing": {{ "settle_secs": 3600, "cycle_secs": 30 }},
            "paths": {{
                "state_file": "{d}/state.json",
                "history_file": "{d}/history.json",
                "heartbeat_file": "{d}/heartbeat.json",
                "status_file": "{d}/status.json"
            }}
        }}"#,
        d = dir.display()
    )
}

/// A temp directory, a parsed config pointing into it and a shared clock.
pub struct Fixture {
    pub dir: TempDir,
    pub config: PlantConfig,
    pub clock: ManualClock,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = PlantConfig::from_json(&config_json(dir.path())).unwrap();
        Self {
            dir,
            config,
            clock: ManualClock::new(t0()),
        }
    }

    pub fn store(&self) -> JsonStateStore {
        JsonStateStore::new(&self.config.paths.state_file)
    }

    /// A fresh service instance, as after a process (re)start.
    pub fn service(&self) -> ControlService<JsonStateStore, ManualClock> {
        ControlService::new(self.config.clone(), self.store(), self.clock.clone())
    }

    pub fn flaky_service(&self) -> (ControlService<FlakyStore, ManualClock>, Rc<Cell<bool>>) {
        let failing = Rc::new(Cell::new(false));
        let store = FlakyStore {
            inner: self.store(),
            failing: Rc::clone(&failing),
        };
        (
            ControlService::new(self.config.clone(), store, self.clock.clone()),
            failing,
        )
    }

    /// Write a state record as if a previous run had left it behind.
    pub fn seed_state(&self, record: ControllerState) {
        self.store().save(&record).unwrap();
    }

    pub fn advance(&self, secs: i64) {
        self.clock.advance(TimeDelta::seconds(secs));
    }
}
