//! Robot Radio Module
//!
//! The boundary to the Bluetooth/SDK layer that talks to the robot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   commands    ┌──────────────────────┐
//! │  SessionController   │ ────────────▶ │   impl RobotRadio    │
//! │  (sole command path) │               │ (SDK / simulation)   │
//! └──────────▲───────────┘               └──────────┬───────────┘
//!            │          SessionEvent channel         │
//!            └───────────────────────────────────────┘
//!      Discovered / NoRobotsFound / Connected / CollisionDetected
//! ```
//!
//! Every command is fire-and-forget. Completion and asynchronous
//! notifications come back as [`SessionEvent`](crate::domain::models::SessionEvent)s
//! on the channel handed to the implementation at construction.
//!
//! ## Modules
//!
//! - [`simulated`] - In-process robot used by the console front-end and tests

pub mod simulated;

use crate::domain::models::RobotId;
use thiserror::Error;

pub use simulated::SimulatedRadio;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("Robot {0} is not connected")]
    NotConnected(RobotId),

    #[error("Unknown robot {0}")]
    Unknown(RobotId),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Commands understood by the radio collaborator
pub trait RobotRadio: Send {
    /// Start looking for robots; results arrive as events
    fn discover(&mut self) -> Result<(), RadioError>;

    /// Stop delivering discovery results
    fn cancel_discovery(&mut self);

    /// Begin connecting; `Connected` or `ConnectFailed` follows later
    fn connect(&mut self, id: &RobotId) -> Result<(), RadioError>;

    fn disconnect(&mut self, id: &RobotId) -> Result<(), RadioError>;

    fn sleep(&mut self, id: &RobotId) -> Result<(), RadioError>;

    fn stop_all_sensors(&mut self, id: &RobotId) -> Result<(), RadioError>;

    fn start_collision_detection(&mut self, id: &RobotId) -> Result<(), RadioError>;

    fn stop_collision_detection(&mut self, id: &RobotId) -> Result<(), RadioError>;

    /// Roll towards `heading` degrees at `speed` in `0.0..=1.0`
    fn roll(&mut self, id: &RobotId, heading: u16, speed: f32) -> Result<(), RadioError>;

    fn set_heading(&mut self, id: &RobotId, heading: u16) -> Result<(), RadioError>;

    fn set_back_light(&mut self, id: &RobotId, intensity: f32) -> Result<(), RadioError>;

    fn set_color(&mut self, id: &RobotId, r: u8, g: u8, b: u8) -> Result<(), RadioError>;
}
