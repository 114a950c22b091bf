//! Potable: controller for a small water-potabilization plant.
//!
//! A well feeds a large settling tank; after a decantation delay the
//! settled water is transferred to a small service tank.  The library holds
//! the whole control core behind port traits so it can be driven by the
//! simulated plant, a GPIO binding or the integration test mocks.

#![deny(unused_must_use)]

pub mod actuator;
pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod heartbeat;
pub mod history;
pub mod persistence;
pub mod sensors;
pub mod status;
