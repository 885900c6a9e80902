//! Sensor Feed Module
//!
//! Accelerometer boundary. Implementations push
//! [`SessionEvent::Sample`](crate::domain::models::SessionEvent::Sample)
//! into the session channel at the platform's native rate while subscribed.

pub mod simulated;

use thiserror::Error;

pub use simulated::SimulatedAccelerometer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("Accelerometer unavailable")]
    Unavailable,

    #[error("Already subscribed to accelerometer")]
    AlreadySubscribed,
}

pub trait SensorFeed: Send {
    fn subscribe(&mut self) -> Result<(), SensorError>;

    /// Stop sample delivery. Safe to call when not subscribed.
    fn unsubscribe(&mut self);

    fn is_subscribed(&self) -> bool;
}
