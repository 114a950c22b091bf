//! Potable — plant controller service entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  SimulatedPlant    LogEventSink  JsonStateStore  SystemClock │
//! │  (Sensor+Actuator) (EventSink)   (StatePort)     (Clock)     │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │            ControlService (pure logic)                 │  │
//! │  │  LevelReader · FSM · PumpActuator · History · Status   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Runs as a supervised service: one control cycle every `cycle_secs`,
//! sleeping for the remainder of the period.  Stop it by terminating the
//! process; the next start resumes from the state document.

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use potable::adapters::clock::SystemClock;
use potable::adapters::log_sink::LogEventSink;
use potable::adapters::sim::SimulatedPlant;
use potable::app::service::ControlService;
use potable::config::{HardwareDriver, PlantConfig};
use potable::fsm::context::LevelSnapshot;
use potable::persistence::JsonStateStore;

#[derive(Parser)]
#[command(name = "potable")]
#[command(version, about = "Water-potabilization plant controller")]
struct Cli {
    /// Plant configuration document (JSON)
    #[arg(long, env = "POTABLE_CONFIG", default_value = "/etc/potable/config.json")]
    config: PathBuf,

    /// Run a single cycle and exit (commissioning check)
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Configuration faults are fatal before anything is actuated.
    let config = PlantConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    info!(
        "Starting potable {} (cycle {}s, settle {}s)",
        env!("CARGO_PKG_VERSION"),
        config.timing.cycle_secs,
        config.timing.settle_secs
    );

    let mut plant = match config.hardware.driver {
        HardwareDriver::Simulated => {
            info!("Hardware driver: simulated plant");
            SimulatedPlant::new(
                config.hardware.clone(),
                LevelSnapshot {
                    well: 100.0,
                    large_tank: 0.0,
                    small_tank: 0.0,
                },
            )
        }
    };

    let period = config.timing.cycle_period();
    let store = JsonStateStore::new(&config.paths.state_file);
    let mut service = ControlService::new(config, store, SystemClock);
    let mut sink = LogEventSink::new();

    service.start(&mut plant, &mut sink);

    if cli.once {
        service
            .tick(&mut plant, &mut sink)
            .context("control cycle failed")?;
        return Ok(());
    }

    // ── Control loop ──────────────────────────────────────────
    loop {
        let started = Instant::now();

        if let Err(e) = service.tick(&mut plant, &mut sink) {
            warn!("Cycle {} failed: {}", service.cycles(), e);
        }

        let spent = started.elapsed();
        match period.checked_sub(spent) {
            Some(rest) => thread::sleep(rest),
            None => warn!("Cycle overran its period by {:?}", spent - period),
        }
    }
}
