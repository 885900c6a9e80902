//! Tilt-to-drive controller for a single Bluetooth rolling robot.
//!
//! - [`domain`] - motion mapping, collision interlock, session state machine, settings
//! - [`infrastructure`] - radio and sensor collaborators, runtime loop, logging
//! - [`presentation`] - console front-end observing the session

pub mod domain;
pub mod infrastructure;
pub mod presentation;
