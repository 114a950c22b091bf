//! Application core — cycle orchestration, zero direct I/O.
//!
//! The [`service::ControlService`] runs the control cycle: level reader,
//! state machine, persistence, pump actuator, history, status and
//! heartbeat.  Hardware, files and time are reached through the **port
//! traits** in [`ports`], keeping this layer testable without real
//! peripherals.

pub mod events;
pub mod ports;
pub mod service;
