//! Concrete state handler functions and table builder.
//!
//! Each state is a plain `fn` pointer plus a fixed pump output pair, with no
//! closures or dynamic dispatch.
//!
//! ```text
//!  IDLE ──[large < low]──▶ FILLING_LARGE ──[large ≥ high]──▶ SETTLING
//!   │ ▲                        │  ▲                            │
//!   │ └──[well dry / timeout]──┘  └───────[large < low]────────┤
//!   │                                                  [deadline passed]
//!   └──[small < low]──▶ FILLING_SMALL ◀──────────────────────────┘
//!                          │
//!        [small ≥ high] ──▶ IDLE
//!        [large < low]  ──▶ FILLING_LARGE (IDLE if the well is dry)
//! ```
//!
//! Priority inside every handler: dry-well guard, then supply preemption,
//! then the state's own exit condition.
//!
//! A fill cut short leaves `fill_interrupted` set on the record.  While it
//! is set `IDLE` never transfers: it resumes the fill once the well allows,
//! or settles what is in the tank if the well stays dry.  Every well pump
//! start waits out `cooldown_secs` from the last well pump stop.

use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};

use super::context::{FsmContext, PumpOutputs};
use crate::config;
use super::{ControllerState, StateDescriptor, StateId};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_update: idle_update,
            outputs: PumpOutputs::ALL_OFF,
        },
        // Index 1: FillingLarge
        StateDescriptor {
            id: StateId::FillingLarge,
            name: "FillingLarge",
            on_update: filling_large_update,
            outputs: PumpOutputs {
                well_pump: true,
                transfer_pump: false,
            },
        },
        // Index 2: Settling
        StateDescriptor {
            id: StateId::Settling,
            name: "Settling",
            on_update: settling_update,
            outputs: PumpOutputs::ALL_OFF,
        },
        // Index 3: FillingSmall
        StateDescriptor {
            id: StateId::FillingSmall,
            name: "FillingSmall",
            on_update: filling_small_update,
            outputs: PumpOutputs {
                well_pump: false,
                transfer_pump: true,
            },
        },
    ]
}

/// Whether a pump run that started at `rec.state_activated_at` has used up
/// its optional maximum.
fn run_exceeded(ctx: &FsmContext, rec: &ControllerState, max_secs: Option<u64>) -> bool {
    max_secs.is_some_and(|max| ctx.elapsed_since(rec.state_activated_at) >= secs(max))
}

fn secs(s: u64) -> TimeDelta {
    config::seconds(s)
}

/// Whether the well pump has rested `cooldown_secs` since it last stopped.
fn well_pump_rested(ctx: &FsmContext, rec: &ControllerState) -> bool {
    let cooldown = secs(ctx.config.pumps.cooldown_secs);
    rec.well_pump_stopped_at
        .is_none_or(|stopped| ctx.elapsed_since(stopped) >= cooldown)
}

/// The well pump may start now.
fn can_start_well_pump(ctx: &FsmContext, rec: &ControllerState) -> bool {
    !ctx.well_dry() && well_pump_rested(ctx, rec)
}

/// Where to go when the large tank has run out: refill it if the well
/// allows, otherwise rest.
fn refill_or_idle(ctx: &FsmContext, rec: &ControllerState) -> StateId {
    if can_start_well_pump(ctx, rec) {
        StateId::FillingLarge
    } else {
        StateId::Idle
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: both pumps off, waiting for a tank to need water
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(ctx: &FsmContext, rec: &ControllerState) -> Option<StateId> {
    if ctx.large_below_low() && can_start_well_pump(ctx, rec) {
        info!(
            "IDLE: large tank at {:.0}% < {:.0}% → filling from well",
            ctx.levels.large_tank, ctx.config.large_tank.low
        );
        return Some(StateId::FillingLarge);
    }

    if rec.fill_interrupted {
        return finish_interrupted_fill(ctx, rec);
    }

    if ctx.small_below_low() && ctx.large_usable() {
        info!(
            "IDLE: small tank at {:.0}% < {:.0}% → transferring",
            ctx.levels.small_tank, ctx.config.small_tank.low
        );
        return Some(StateId::FillingSmall);
    }

    None
}

/// The large tank holds unsettled water from a fill that stopped early.
fn finish_interrupted_fill(ctx: &FsmContext, rec: &ControllerState) -> Option<StateId> {
    if ctx.large_at_high() {
        info!("IDLE: large tank full after an interrupted fill → settling");
        return Some(StateId::Settling);
    }
    if can_start_well_pump(ctx, rec) {
        info!(
            "IDLE: resuming interrupted fill at {:.0}%",
            ctx.levels.large_tank
        );
        return Some(StateId::FillingLarge);
    }
    if ctx.well_dry() && ctx.large_usable() {
        info!(
            "IDLE: well dry, settling the partial fill at {:.0}%",
            ctx.levels.large_tank
        );
        return Some(StateId::Settling);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FILLING_LARGE: well pump on
// ═══════════════════════════════════════════════════════════════════════════

fn filling_large_update(ctx: &FsmContext, rec: &ControllerState) -> Option<StateId> {
    // Guard: never dry-run the well pump.  Overrides everything else.
    if ctx.well_dry() {
        warn!(
            "FILLING_LARGE: well at {:.0}% <= {:.0}% → stopping",
            ctx.levels.well, ctx.config.well.min_safe_level
        );
        return Some(StateId::Idle);
    }

    if ctx.large_at_high() {
        info!(
            "FILLING_LARGE: large tank at {:.0}% → settling for {}s",
            ctx.levels.large_tank, ctx.config.timing.settle_secs
        );
        return Some(StateId::Settling);
    }

    if run_exceeded(ctx, rec, ctx.config.pumps.well_pump_max_run_secs) {
        warn!("FILLING_LARGE: well pump exceeded its maximum run time → stopping");
        return Some(StateId::Idle);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SETTLING: both pumps off while sediment settles in the large tank
// ═══════════════════════════════════════════════════════════════════════════

fn settling_update(ctx: &FsmContext, rec: &ControllerState) -> Option<StateId> {
    // Supply lost while settling (leak or manual draw): start over.
    if ctx.large_below_low() && can_start_well_pump(ctx, rec) {
        warn!(
            "SETTLING: large tank dropped to {:.0}% → refilling",
            ctx.levels.large_tank
        );
        return Some(StateId::FillingLarge);
    }

    // The deadline is taken from the record, never recomputed, so a restart
    // or a config change cannot stretch the wait.
    let deadline = rec
        .settle_end_time
        .or_else(|| {
            rec.state_activated_at
                .checked_add_signed(ctx.config.timing.settle_duration())
        })
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    if ctx.now < deadline {
        return None;
    }

    if ctx.small_below_high() && !ctx.large_below_low() {
        info!(
            "SETTLING: done, small tank at {:.0}% → transferring",
            ctx.levels.small_tank
        );
        Some(StateId::FillingSmall)
    } else {
        info!("SETTLING: done, nothing to transfer");
        Some(StateId::Idle)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  FILLING_SMALL: transfer pump on
// ═══════════════════════════════════════════════════════════════════════════

fn filling_small_update(ctx: &FsmContext, rec: &ControllerState) -> Option<StateId> {
    // Preemption: never drive the transfer pump against an empty source.
    if ctx.large_below_low() {
        let next = refill_or_idle(ctx, rec);
        warn!(
            "FILLING_SMALL: large tank exhausted at {:.0}% → {}",
            ctx.levels.large_tank, next
        );
        return Some(next);
    }

    if ctx.small_at_high() {
        info!("FILLING_SMALL: small tank at {:.0}% → idle", ctx.levels.small_tank);
        return Some(StateId::Idle);
    }

    if run_exceeded(ctx, rec, ctx.config.pumps.transfer_pump_max_run_secs) {
        warn!("FILLING_SMALL: transfer pump exceeded its maximum run time → stopping");
        return Some(StateId::Idle);
    }

    None
}
