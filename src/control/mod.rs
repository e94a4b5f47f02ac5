//! The tester's state machine: command parsing, per-characteristic state,
//! the controller that applies writes to the pixel, and connection tracking.

pub mod command;
pub mod connection;
pub mod controller;
pub mod state;

pub use command::{interpret, Interpretation, LedCommand};
pub use connection::{ConnectionEvent, ConnectionTracker};
pub use controller::{GattController, Notification, NotifyPolicy, WriteOutcome};
pub use state::{CharacteristicIdentity, CharacteristicState};
