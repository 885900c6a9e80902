//! Collision Interlock
//!
//! Any collision, whatever its magnitude or axis, is a full stop.

use crate::domain::models::{LightState, MotionCommand};

#[derive(Debug, Default, Clone, Copy)]
pub struct CollisionInterlock;

impl CollisionInterlock {
    pub fn new() -> Self {
        Self
    }

    /// Stop command to send and the visual state to show
    pub fn on_collision(&self) -> (MotionCommand, LightState) {
        (MotionCommand::STOP, LightState::Alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_always_stops() {
        let interlock = CollisionInterlock::new();
        for _ in 0..3 {
            let (command, light) = interlock.on_collision();
            assert_eq!(command.heading, 0);
            assert_eq!(command.speed, 0.0);
            assert_eq!(command, MotionCommand::STOP);
            assert_eq!(light, LightState::Alert);
        }
    }
}
