//! Restart and reset behaviour: the state document is the only memory.

use chrono::TimeDelta;

use potable::actuator::PumpStatus;
use potable::fsm::context::PumpId;
use potable::fsm::{ControllerState, StateId};

use super::mock_plant::{Fixture, MockPlant, RecordingSink, t0};

#[test]
fn restart_mid_settle_keeps_the_original_deadline() {
    let fx = Fixture::new();
    let entered = ControllerState::entering(StateId::Settling, t0(), TimeDelta::hours(1));
    fx.seed_state(entered);
    let mut plant = MockPlant::new(80.0, 85.0, 40.0);
    let mut sink = RecordingSink::default();

    // First run: 30 minutes in, still settling.
    fx.advance(1800);
    let mut svc = fx.service();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Settling);
    assert_eq!(svc.record(), &entered);
    drop(svc);

    // Second run just before the deadline: still settling.
    fx.advance(1799);
    let mut svc = fx.service();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Settling);

    // Deadline reached.
    fx.advance(1);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingSmall);
}

#[test]
fn longer_configured_settle_does_not_stretch_a_running_one() {
    let mut fx = Fixture::new();
    fx.seed_state(ControllerState::entering(
        StateId::Settling,
        t0(),
        TimeDelta::hours(1),
    ));
    fx.config.timing.settle_secs = 4 * 3600;
    fx.advance(3600);

    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 85.0, 40.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingSmall);
}

#[test]
fn start_forces_pumps_off_before_first_cycle() {
    let fx = Fixture::new();
    fx.seed_state(ControllerState::entering(
        StateId::FillingLarge,
        t0(),
        TimeDelta::zero(),
    ));
    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 60.0, 90.0);
    let mut sink = RecordingSink::default();
    assert_eq!(svc.pump_status(PumpId::WellToLarge), PumpStatus::Unknown);

    svc.start(&mut plant, &mut sink);
    assert!(!plant.well_pump_on());
    assert!(!plant.transfer_pump_on());

    // The first cycle resumes the fill.
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::FillingLarge);
    assert!(plant.well_pump_on());
    assert_eq!(svc.pump_status(PumpId::WellToLarge), PumpStatus::On);
}

#[test]
fn deleting_the_state_document_resets_to_idle() {
    let fx = Fixture::new();
    fx.seed_state(ControllerState::entering(
        StateId::Settling,
        t0(),
        TimeDelta::hours(1),
    ));
    std::fs::remove_file(&fx.config.paths.state_file).unwrap();

    for _ in 0..2 {
        let svc = fx.service();
        assert_eq!(svc.record(), &ControllerState::idle(t0()));
    }

    let mut svc = fx.service();
    let mut plant = MockPlant::new(80.0, 60.0, 60.0);
    let mut sink = RecordingSink::default();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert!(svc.record().settle_end_time.is_none());
}

#[test]
fn corrupted_state_document_resets_to_idle() {
    let fx = Fixture::new();
    std::fs::write(&fx.config.paths.state_file, b"{\"current_state\":").unwrap();
    let svc = fx.service();
    assert_eq!(svc.state(), StateId::Idle);
}

#[test]
fn history_and_heartbeat_survive_restart() {
    let fx = Fixture::new();
    let mut plant = MockPlant::new(80.0, 60.0, 60.0);
    let mut sink = RecordingSink::default();

    let mut svc = fx.service();
    svc.start(&mut plant, &mut sink);
    svc.tick(&mut plant, &mut sink).unwrap();
    fx.advance(30);
    svc.tick(&mut plant, &mut sink).unwrap();
    drop(svc);

    let svc = fx.service();
    assert_eq!(svc.history().samples().len(), 2);
    assert_eq!(
        svc.heartbeat().last().unwrap().last_cycle_at,
        t0() + TimeDelta::seconds(30)
    );
}
