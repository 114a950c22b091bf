//! Full control cycles: sensors → FSM → state document → pumps → documents.

use chrono::TimeDelta;

use potable::app::ports::{ConfigError, StatePort};
use potable::config::{MAX_DURATION_SECS, PlantConfig};
use potable::fsm::context::PumpId;
use potable::fsm::{ControllerState, StateId};
use potable::heartbeat::Heartbeat;
use potable::status::read_status;

use super::mock_plant::{Fixture, MockPlant, RecordingSink, config_json, t0};

// ── End-to-end scenarios ──────────────────────────────────────

#[test]
fn idle_with_low_large_tank_starts_well_pump() {
    let fx = Fixture::new();
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 30.0, 90.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);

    let report = svc.tick(&mut plant, &mut sink).unwrap();

    assert_eq!(report.transition, Some((StateId::Idle, StateId::FillingLarge)));
    assert!(plant.well_pump_on());
    assert!(!plant.transfer_pump_on());
    let stored = fx.store().load().unwrap().unwrap();
    assert_eq!(stored.current_state, StateId::FillingLarge);
    assert_eq!(stored.state_activated_at, t0());
    assert!(stored.settle_end_time.is_none());
}

#[test]
fn full_large_tank_starts_settling() {
    let fx = Fixture::new();
    fx.seed_state(ControllerState::entering(
        StateId::FillingLarge,
        t0(),
        TimeDelta::zero(),
    ));
    fx.advance(1200);
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 85.0, 90.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);

    svc.tick(&mut plant, &mut sink).unwrap();

    let now = t0() + TimeDelta::seconds(1200);
    assert_eq!(svc.state(), StateId::Settling);
    assert_eq!(svc.record().settle_end_time, Some(now + TimeDelta::seconds(3600)));
    assert!(!plant.well_pump_on());
    assert!(!plant.transfer_pump_on());
    assert_eq!(fx.store().load().unwrap(), Some(*svc.record()));
}

#[test]
fn expired_settle_transfers_to_small_tank() {
    let fx = Fixture::new();
    fx.seed_state(ControllerState {
        current_state: StateId::Settling,
        state_activated_at: t0() - TimeDelta::minutes(65),
        settle_end_time: Some(t0() - TimeDelta::minutes(5)),
        ..ControllerState::idle(t0())
    });
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 85.0, 40.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);

    svc.tick(&mut plant, &mut sink).unwrap();

    assert_eq!(svc.state(), StateId::FillingSmall);
    assert!(plant.transfer_pump_on());
    assert!(!plant.well_pump_on());
}

// ── Whole fill cycle ──────────────────────────────────────────

#[test]
fn walks_through_a_complete_fill_cycle() {
    let fx = Fixture::new();
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 20.0, 60.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);

    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);

    fx.advance(30);
    plant.set_levels(70.0, 60.0, 55.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);

    fx.advance(30);
    plant.set_levels(60.0, 86.0, 50.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Settling);

    // Half-way through the settle nothing moves, even with the small tank low.
    fx.advance(1800);
    plant.set_levels(65.0, 86.0, 30.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Settling);
    assert!(!plant.transfer_pump_on());

    fx.advance(1800);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingSmall);

    fx.advance(30);
    plant.set_levels(65.0, 70.0, 90.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(!plant.well_pump_on() && !plant.transfer_pump_on());

    assert_eq!(
        sink.transitions(),
        vec![
            (StateId::Idle, StateId::FillingLarge),
            (StateId::FillingLarge, StateId::Settling),
            (StateId::Settling, StateId::FillingSmall),
            (StateId::FillingSmall, StateId::Idle),
        ]
    );
    assert_eq!(svc.history().samples().len(), 6);
}

#[test]
fn off_commands_precede_on_commands() {
    let fx = Fixture::new();
    fx.seed_state(ControllerState {
        current_state: StateId::Settling,
        state_activated_at: t0() - TimeDelta::hours(2),
        settle_end_time: Some(t0() - TimeDelta::hours(1)),
        ..ControllerState::idle(t0())
    });
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 85.0, 40.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    plant.calls.clear();

    svc.tick(&mut plant, &mut sink).unwrap();

    assert_eq!(
        plant.calls,
        vec![(PumpId::WellToLarge, false), (PumpId::LargeToSmall, true)]
    );
}

// ── Hysteresis ────────────────────────────────────────────────

#[test]
fn no_chattering_between_thresholds() {
    let fx = Fixture::new();
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 39.0, 90.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);

    // Hovering around the low threshold must not stop the fill.
    for large in [40.0, 39.5, 41.0, 40.0, 55.0, 84.0] {
        fx.advance(30);
        plant.set_levels(80.0, large, 90.0);
        svc.tick(&mut plant, &mut sink).unwrap();
        assert_eq!(svc.state(), StateId::FillingLarge, "stopped at {large}");
    }
    assert_eq!(sink.transitions().len(), 1);
}

#[test]
fn dry_well_stops_the_pump_within_one_cycle() {
    let fx = Fixture::new();
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 20.0, 90.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert!(plant.well_pump_on());

    fx.advance(30);
    plant.set_levels(10.0, 25.0, 90.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert!(!plant.well_pump_on());
    assert_eq!(svc.state(), StateId::Idle);

    // And it stays off while the well is dry.
    fx.advance(30);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(!plant.well_pump_on());
}

// ── Documents ─────────────────────────────────────────────────

#[test]
fn completed_cycles_refresh_heartbeat_and_status() {
    let fx = Fixture::new();
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 60.0, 60.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);

    svc.tick(&mut plant, &mut sink).unwrap();
    fx.advance(30);
    svc.tick(&mut plant, &mut sink).unwrap();

    let now = t0() + TimeDelta::seconds(30);
    let hb = Heartbeat::read(&fx.config.paths.heartbeat_file).unwrap().unwrap();
    assert_eq!(hb.last_cycle_at, now);
    assert!(!hb.is_stale(now, fx.config.timing.heartbeat_stale_after()));
    assert!(hb.is_stale(now + TimeDelta::seconds(181), fx.config.timing.heartbeat_stale_after()));

    let status = read_status(&fx.config.paths.status_file, 3).unwrap();
    assert_eq!(status.state, StateId::Idle);
    assert_eq!(status.updated_at, now);
    assert!(status.fault.is_none());
    assert_eq!(status.levels.unwrap().large_tank, 60.0);
    assert_eq!(status.last_heartbeat, Some(now));
    assert!(!status.heartbeat_stale);
}

// ── Interrupted fills ─────────────────────────────────────────

#[test]
fn fill_cut_short_by_dry_well_is_settled_before_transfer() {
    let fx = Fixture::new();
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 20.0, 90.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);

    fx.advance(30);
    plant.set_levels(5.0, 70.0, 90.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(!plant.well_pump_on());

    // Small tank drops while the large tank holds freshly drawn water.
    fx.advance(30);
    plant.set_levels(5.0, 70.0, 40.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert!(!plant.transfer_pump_on());
    assert_eq!(svc.state(), StateId::Settling);

    fx.advance(3600);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingSmall);
    assert!(plant.transfer_pump_on());
}

#[test]
fn fill_cut_short_resumes_after_restart_once_the_well_recovers() {
    let fx = Fixture::new();
    let mut plant = MockPlant::new(80.0, 20.0, 90.0);
    let mut sink = RecordingSink::default();
    let mut svc = fx.service();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();

    fx.advance(30);
    plant.set_levels(5.0, 45.0, 40.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(fx.store().load().unwrap().unwrap().fill_interrupted);
    drop(svc);

    let mut svc = fx.service();
    svc.start(&mut plant, &mut sink);
    fx.advance(30);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(!plant.transfer_pump_on());

    fx.advance(30);
    plant.set_levels(60.0, 45.0, 40.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);
    assert!(plant.well_pump_on());
    assert!(!plant.transfer_pump_on());
}

#[test]
fn fill_stopped_by_max_run_does_not_feed_the_small_tank() {
    let mut fx = Fixture::new();
    fx.config.pumps.well_pump_max_run_secs = Some(600);
    fx.config.pumps.cooldown_secs = 300;
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 20.0, 90.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();

    fx.advance(600);
    plant.set_levels(80.0, 70.0, 40.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(!plant.well_pump_on());

    // Resting after the stop: neither pump runs.
    fx.advance(30);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(!plant.transfer_pump_on() && !plant.well_pump_on());

    fx.advance(270);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);
    assert!(!plant.transfer_pump_on());
}

// ── Duration limits ───────────────────────────────────────────

#[test]
fn year_long_durations_run_without_overflow() {
    let mut fx = Fixture::new();
    fx.config.history.retention_secs = Some(MAX_DURATION_SECS);
    fx.config.pumps.cooldown_secs = MAX_DURATION_SECS;
    fx.config.timing.heartbeat_stale_secs = MAX_DURATION_SECS;
    fx.config.validate().unwrap();

    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 20.0, 90.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);

    fx.advance(30);
    plant.set_levels(80.0, 85.0, 90.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Settling);

    // Supply lost, but the well pump is still cooling down.
    fx.advance(30);
    plant.set_levels(80.0, 20.0, 90.0);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Settling);
    assert!(!plant.well_pump_on());
    assert_eq!(svc.history().samples().len(), 3);
    assert!(!read_status(&fx.config.paths.status_file, 3).unwrap().heartbeat_stale);
}

#[test]
fn retention_beyond_the_calendar_is_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let text = config_json(dir.path()).replacen(
        "\"paths\"",
        "\"history\": { \"retention_secs\": 10000000000000 }, \"paths\"",
        1,
    );
    assert!(matches!(
        PlantConfig::from_json(&text),
        Err(ConfigError::ValidationFailed(_))
    ));
}
