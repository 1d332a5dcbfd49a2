//! thrashguard daemon
//!
//! Runs the thrashing control loop against the live system and makes sure every
//! frozen process is resumed when the daemon stops.

pub mod config;
pub mod guard;

pub use config::Config;
pub use guard::{build_controller, supervise, GuardExit, SystemController};
