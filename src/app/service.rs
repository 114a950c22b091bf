//! Control service — the hexagonal core.
//!
//! [`ControlService`] owns the state machine, the level reader, the pump
//! actuator and the three documents it maintains (history, heartbeat,
//! status).  All hardware I/O flows through port traits passed in at call
//! sites, so the whole cycle is testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │      ControlService      │
//! ActuatorPort ◀──│  Reader · FSM · Actuator │ ──▶ StatePort
//!                 └──────────────────────────┘
//! ```
//!
//! One cycle, in order:
//!
//! 1. sample the three levels (fatal sensor fault → fail-safe);
//! 2. evaluate the state machine;
//! 3. on a transition, persist the new record, then commit it
//!    (persistence fault → fail-safe, nothing committed);
//! 4. apply the state's pump outputs through the interlocks;
//! 5. record a history sample;
//! 6. stamp the heartbeat;
//! 7. write the status document, flagging a stale heartbeat.
//!
//! A fail-safe cycle switches both pumps off, writes the status document
//! with the fault and returns the error.  It records no history and does
//! not stamp the heartbeat.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::actuator::{ApplyReport, PumpActuator, PumpStatus};
use crate::config::PlantConfig;
use crate::error::{Error, Result};
use crate::fsm::context::{FsmContext, LevelSnapshot, PumpId};
use crate::fsm::states::build_state_table;
use crate::fsm::{ControllerState, Fsm, StateId};
use crate::heartbeat::HeartbeatMonitor;
use crate::history::{HistoryRecorder, LevelSample};
use crate::persistence::load_or_default;
use crate::sensors::{LevelReader, ToleratedFault};
use crate::status::StatusReport;

use super::events::{AppEvent, TelemetryData};
use super::ports::{ActuatorPort, ClockPort, EventSink, SensorPort, StatePort};

// ───────────────────────────────────────────────────────────────
// Cycle report
// ───────────────────────────────────────────────────────────────

/// What one completed cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub at: DateTime<Utc>,
    /// State after the cycle.
    pub state: StateId,
    /// `(from, to)` when the cycle transitioned.
    pub transition: Option<(StateId, StateId)>,
    pub levels: LevelSnapshot,
    pub apply: ApplyReport,
    pub tolerated: Vec<ToleratedFault>,
}

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService<P: StatePort, C: ClockPort> {
    fsm: Fsm,
    ctx: FsmContext,
    reader: LevelReader,
    actuator: PumpActuator,
    store: P,
    clock: C,
    history: HistoryRecorder,
    heartbeat: HeartbeatMonitor,
    status_path: PathBuf,
    /// Levels from the last successful sample, for the status document.
    last_levels: Option<LevelSnapshot>,
    cycles: u64,
}

impl<P: StatePort, C: ClockPort> ControlService<P, C> {
    /// Build the service and resume from the persisted record.
    ///
    /// Does **not** touch the pumps; call [`start`](Self::start) next.
    pub fn new(config: PlantConfig, store: P, clock: C) -> Self {
        let now = clock.now();
        let record = load_or_default(&store, now, config.timing.settle_duration());
        let fsm = Fsm::new(build_state_table(), record);

        let history = HistoryRecorder::load(&config.paths.history_file, config.history.clone());
        let heartbeat = HeartbeatMonitor::new(&config.paths.heartbeat_file);
        let status_path = config.paths.status_file.clone();
        let reader = LevelReader::new(&config);
        let actuator = PumpActuator::new(&config);

        Self {
            fsm,
            ctx: FsmContext::new(config, now),
            reader,
            actuator,
            store,
            clock,
            history,
            heartbeat,
            status_path,
            last_levels: None,
            cycles: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Force both pumps off and announce the resumed state.
    ///
    /// Whatever the outputs were before the restart, nothing runs until
    /// the first cycle has sampled fresh levels.
    pub fn start(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        self.force_all_off(hw, sink);
        let record = *self.fsm.record();
        sink.emit(&AppEvent::Started {
            state: record.current_state,
            since: record.state_activated_at,
        });
        info!("ControlService started in {}", record.current_state);
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], avoiding a double mutable borrow while keeping the
    /// port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> Result<CycleReport> {
        self.cycles += 1;
        let now = self.clock.now();
        self.ctx.now = now;

        // 1. Sample levels
        let sample = match self.reader.sample(hw) {
            Ok(s) => s,
            Err(fault) => {
                sink.emit(&AppEvent::SensorFault(fault));
                self.fail_safe(hw, sink, now, &fault.to_string());
                return Err(Error::Sensor(fault));
            }
        };
        for t in &sample.tolerated {
            sink.emit(&AppEvent::SensorTolerated(*t));
        }
        self.ctx.levels = sample.levels;
        self.last_levels = Some(sample.levels);

        // 2–3. Evaluate; persist before commit
        let prev = self.fsm.current_state();
        let mut transition = None;
        if let Some(next) = self.fsm.evaluate(&self.ctx) {
            let record = self.fsm.record().transition_to(
                next,
                now,
                self.ctx.config.timing.settle_duration(),
            );
            if let Err(e) = self.store.save(&record) {
                sink.emit(&AppEvent::PersistenceFault(e.clone()));
                let fault = format!("state document not saved ({} -> {}): {}", prev, next, e);
                self.fail_safe(hw, sink, now, &fault);
                return Err(Error::Persistence(e));
            }
            self.fsm.commit(record);
            sink.emit(&AppEvent::StateChanged {
                from: prev,
                to: next,
                at: now,
            });
            transition = Some((prev, next));
        }
        let state = self.fsm.current_state();

        // 4. Apply outputs through the interlocks
        let apply = self.actuator.apply(hw, self.fsm.outputs(), &sample.levels);
        for &(pump, interlock) in &apply.blocked {
            sink.emit(&AppEvent::InterlockBlocked { pump, interlock });
        }
        for &(pump, error) in &apply.failures {
            sink.emit(&AppEvent::ActuatorFault { pump, error });
        }

        // 5. History
        self.history
            .record(LevelSample::new(now, sample.levels, apply.commanded, state));
        if let Err(e) = self.history.flush() {
            warn!("History document not written: {}", e);
        }

        // 6. Heartbeat
        if let Err(e) = self.heartbeat.stamp(now) {
            warn!("Heartbeat not written: {}", e);
        }

        // 7. Status
        self.publish_status(now, None);

        sink.emit(&AppEvent::Telemetry(TelemetryData {
            at: now,
            state,
            levels: sample.levels,
            pumps: apply.commanded,
            tolerated: sample.tolerated.len(),
        }));

        Ok(CycleReport {
            at: now,
            state,
            transition,
            levels: sample.levels,
            apply,
            tolerated: sample.tolerated,
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn record(&self) -> &ControllerState {
        self.fsm.record()
    }

    pub fn config(&self) -> &PlantConfig {
        &self.ctx.config
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    pub fn pump_status(&self, pump: PumpId) -> PumpStatus {
        self.actuator.status(pump)
    }

    /// Cycles attempted since construction, failed ones included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    // ── Internal ──────────────────────────────────────────────

    fn fail_safe(
        &mut self,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
        now: DateTime<Utc>,
        fault: &str,
    ) {
        error!("FAIL-SAFE: {} - all pumps off", fault);
        self.force_all_off(hw, sink);
        self.publish_status(now, Some(fault.to_string()));
    }

    fn force_all_off(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        for (pump, error) in self.actuator.all_off(hw) {
            sink.emit(&AppEvent::ActuatorFault { pump, error });
        }
    }

    fn publish_status(&self, now: DateTime<Utc>, fault: Option<String>) {
        let record = self.fsm.record();
        let report = StatusReport {
            updated_at: now,
            state: record.current_state,
            state_activated_at: record.state_activated_at,
            settle_end_time: record.settle_end_time,
            levels: self.last_levels,
            well_pump: self.actuator.status(PumpId::WellToLarge),
            transfer_pump: self.actuator.status(PumpId::LargeToSmall),
            last_heartbeat: self.heartbeat.last().map(|hb| hb.last_cycle_at),
            heartbeat_stale: self
                .heartbeat
                .is_stale(now, self.ctx.config.timing.heartbeat_stale_after()),
            fault,
        };
        info!("{}", report.summary(&self.ctx.config));
        if let Err(e) = report.write(&self.status_path) {
            warn!("Status document not written: {}", e);
        }
    }
}
