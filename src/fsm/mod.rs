//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌──────────────┬──────────────────────────┬────────────┐  │
//! │  │ StateId      │ on_update                │ outputs    │  │
//! │  ├──────────────┼──────────────────────────┼────────────┤  │
//! │  │ Idle         │ fn(ctx, rec) -> Option<> │ off / off  │  │
//! │  │ FillingLarge │ fn(ctx, rec) -> Option<> │ on  / off  │  │
//! │  │ Settling     │ fn(ctx, rec) -> Option<> │ off / off  │  │
//! │  │ FillingSmall │ fn(ctx, rec) -> Option<> │ off / on   │  │
//! │  └──────────────┴──────────────────────────┴────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike an in-memory tick counter, the machine's timing lives in the
//! persisted [`ControllerState`] record, so a restart resumes with the same
//! deadlines.  A transition is split in two steps: [`Fsm::evaluate`] is pure
//! and proposes the next state; the caller persists the new record and only
//! then calls [`Fsm::commit`].  Nothing observable changes until the record
//! is durable.

pub mod context;
pub mod states;

use core::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use context::{FsmContext, PumpOutputs};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all operating states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    FillingLarge = 1,
    Settling = 2,
    FillingSmall = 3,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 4;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Idle,
        Self::FillingLarge,
        Self::Settling,
        Self::FillingSmall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::FillingLarge => "FillingLarge",
            Self::Settling => "Settling",
            Self::FillingSmall => "FillingSmall",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// The persisted, mutable core record.  Sole source of truth on restart.
///
/// Invariant: `settle_end_time.is_some()` iff `current_state == Settling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub current_state: StateId,
    pub state_activated_at: DateTime<Utc>,
    #[serde(default)]
    pub settle_end_time: Option<DateTime<Utc>>,
    /// When the well pump last stopped; the cooldown runs from here.
    #[serde(default)]
    pub well_pump_stopped_at: Option<DateTime<Utc>>,
    /// A large-tank fill ended before reaching `high`, so the tank holds
    /// water that has not settled.  Cleared on entering `Settling`.
    #[serde(default)]
    pub fill_interrupted: bool,
}

impl ControllerState {
    /// The reset record: `Idle`, no settle deadline.
    pub fn idle(now: DateTime<Utc>) -> Self {
        Self::entering(StateId::Idle, now, TimeDelta::zero())
    }

    /// A record for `state` entered at `now`, with no pump history.
    pub fn entering(state: StateId, now: DateTime<Utc>, settle: TimeDelta) -> Self {
        Self {
            current_state: state,
            state_activated_at: now,
            settle_end_time: (state == StateId::Settling).then(|| now + settle),
            well_pump_stopped_at: None,
            fill_interrupted: false,
        }
    }

    /// The record written when moving from this one to `next` at `now`.
    ///
    /// Leaving `FillingLarge` stamps the well pump stop; leaving it for
    /// anything but `Settling` marks the fill as interrupted.
    pub fn transition_to(&self, next: StateId, now: DateTime<Utc>, settle: TimeDelta) -> Self {
        let mut rec = Self::entering(next, now, settle);
        let leaving_fill =
            self.current_state == StateId::FillingLarge && next != StateId::FillingLarge;
        rec.well_pump_stopped_at = if leaving_fill {
            Some(now)
        } else {
            self.well_pump_stopped_at
        };
        rec.fill_interrupted = match next {
            StateId::Settling => false,
            _ if leaving_fill => true,
            _ => self.fill_interrupted,
        };
        rec
    }

    pub fn is_consistent(&self) -> bool {
        self.settle_end_time.is_some() == (self.current_state == StateId::Settling)
    }

    /// Restore the settle-deadline invariant on a record read from disk.
    ///
    /// A `Settling` record without a deadline gets
    /// `state_activated_at + settle`; a deadline on any other state is
    /// dropped.
    pub fn repaired(mut self, settle: TimeDelta) -> Self {
        if self.is_consistent() {
            return self;
        }
        if self.current_state == StateId::Settling {
            warn!("State record in Settling without deadline; deriving it from activation time");
            self.settle_end_time = Some(
                self.state_activated_at
                    .checked_add_signed(settle)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
        } else {
            warn!(
                "State record in {} carries a settle deadline; clearing it",
                self.current_state
            );
            self.settle_end_time = None;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for the per-cycle update handler.
/// Returns `Some(next)` to request a transition, or `None` to stay.
pub type StateUpdateFn = fn(&FsmContext, &ControllerState) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_update: StateUpdateFn,
    /// Pump outputs held for the whole time the state is active.
    pub outputs: PumpOutputs,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and the live [`ControllerState`].  Only
/// [`commit`](Self::commit) mutates the record.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    record: ControllerState,
}

impl Fsm {
    /// Construct a new FSM resuming from `record`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], record: ControllerState) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, row)| row.id as usize == i),
            "state table out of order"
        );
        info!(
            "FSM resuming in state: {} (since {})",
            table[record.current_state as usize].name, record.state_activated_at
        );
        Self { table, record }
    }

    /// Ask the current state's handler whether to move.
    ///
    /// Pure: returns the proposed next state without changing anything.
    /// A handler returning the current state counts as "stay".
    pub fn evaluate(&self, ctx: &FsmContext) -> Option<StateId> {
        let row = &self.table[self.record.current_state as usize];
        (row.on_update)(ctx, &self.record).filter(|next| *next != row.id)
    }

    /// Install a record that has already been persisted.
    pub fn commit(&mut self, record: ControllerState) {
        if record.current_state != self.record.current_state {
            info!(
                "FSM transition: {} -> {}",
                self.table[self.record.current_state as usize].name,
                self.table[record.current_state as usize].name
            );
        }
        self.record = record;
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        self.record.current_state
    }

    /// The live record.
    pub fn record(&self) -> &ControllerState {
        &self.record
    }

    /// Outputs the current state asks for.
    pub fn outputs(&self) -> PumpOutputs {
        self.table[self.record.current_state as usize].outputs
    }

    /// Outputs any state asks for.
    pub fn outputs_of(&self, state: StateId) -> PumpOutputs {
        self.table[state as usize].outputs
    }
}
