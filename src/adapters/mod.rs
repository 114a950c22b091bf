//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                     |
//! |-------------|-------------------|---------------------------------|
//! | `sim`       | SensorPort        | In-process plant model          |
//! |             | ActuatorPort      |                                 |
//! | `gpio`      | SensorPort        | embedded-hal float switches     |
//! |             | ActuatorPort      | embedded-hal relay outputs      |
//! | `log_sink`  | EventSink         | `log` facade                    |
//! | `clock`     | ClockPort         | Host UTC clock / manual clock   |
//! | `json_file` | (helper)          | Atomic JSON documents on disk   |
//!
//! The [`StatePort`](crate::app::ports::StatePort) implementation lives in
//! [`persistence`](crate::persistence) next to its load policy.

pub mod clock;
pub mod gpio;
pub mod json_file;
pub mod log_sink;
pub mod sim;
