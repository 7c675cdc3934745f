//! Session control
//!
//! [`SessionController`] composes the reconnect scheduler, presence monitor,
//! activity monitor and voice coordinator into one state machine.
//! [`SessionRunner`] ticks it at a fixed rate on a tokio task.

pub mod controller;
pub mod runner;

pub use controller::SessionController;
pub use runner::{SessionRunner, ShutdownHandle};
