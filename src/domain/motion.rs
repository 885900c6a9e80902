//! Motion Mapper
//!
//! Turns accelerometer tilt into roll commands for the robot.

use crate::domain::models::{AccelerationSample, MotionCommand, ReferencePoint};
use crate::domain::settings::MotionSettings;

/// Minimum interval between two roll commands (milliseconds)
pub const RATE_GATE_MS: i64 = 1000;

/// Speed used when a single-axis spike would exceed full speed
pub const CREEP_SPEED: f32 = 0.01;

/// Maps acceleration samples to (heading, speed) commands with a rate gate
#[derive(Debug, Clone, Copy)]
pub struct MotionMapper {
    rate_gate_ms: i64,
    creep_speed: f32,
}

impl Default for MotionMapper {
    fn default() -> Self {
        Self {
            rate_gate_ms: RATE_GATE_MS,
            creep_speed: CREEP_SPEED,
        }
    }
}

impl MotionMapper {
    pub fn new(settings: &MotionSettings) -> Self {
        Self {
            rate_gate_ms: settings.rate_gate_ms as i64,
            creep_speed: settings.creep_speed,
        }
    }

    /// Map a sample against the last accepted reference point.
    ///
    /// Returns `None` while the rate gate is closed. The reference point is
    /// only replaced when a command is emitted, so the next eligible sample
    /// is compared with the last accepted position.
    pub fn map(
        &self,
        sample: &AccelerationSample,
        reference: &ReferencePoint,
        now_ms: i64,
    ) -> Option<(MotionCommand, ReferencePoint)> {
        if now_ms - reference.last_command_time_ms <= self.rate_gate_ms {
            return None;
        }

        let command = MotionCommand {
            heading: heading_between(reference.x, reference.y, sample.x, sample.y),
            speed: self.speed_from_z(sample.z),
        };
        let next = ReferencePoint {
            x: sample.x,
            y: sample.y,
            last_command_time_ms: now_ms,
        };

        Some((command, next))
    }

    fn speed_from_z(&self, z: f64) -> f32 {
        let magnitude = z.abs();
        if magnitude == 0.0 {
            return 0.0;
        }

        let speed = magnitude.sqrt() as f32;
        // Never go full speed from a single axis spike
        if speed.is_nan() || speed > 1.0 {
            self.creep_speed
        } else {
            speed
        }
    }
}

/// Compass heading in whole degrees from `(from_x, from_y)` towards `(to_x, to_y)`.
///
/// 0 is forward (+y), 90 is +x. A zero displacement yields 0.
pub fn heading_between(from_x: f64, from_y: f64, to_x: f64, to_y: f64) -> u16 {
    let dx = to_x - from_x;
    let dy = to_y - from_y;
    if dx == 0.0 && dy == 0.0 {
        return 0;
    }

    let degrees = (std::f64::consts::FRAC_PI_2 - dy.atan2(dx)).to_degrees();
    (degrees.round() as i64).rem_euclid(360) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64, z: f64, t: i64) -> AccelerationSample {
        AccelerationSample::new(x, y, z, t)
    }

    fn origin_at(t: i64) -> ReferencePoint {
        ReferencePoint {
            x: 0.0,
            y: 0.0,
            last_command_time_ms: t,
        }
    }

    #[test]
    fn test_rate_gate_requires_strictly_more_than_interval() {
        let mapper = MotionMapper::default();
        let reference = origin_at(0);

        assert!(mapper.map(&sample(0.2, 0.1, 0.5, 1000), &reference, 1000).is_none());
        assert!(mapper.map(&sample(0.2, 0.1, 0.5, 1001), &reference, 1001).is_some());
    }

    #[test]
    fn test_rest_sample_yields_zero_speed() {
        let mapper = MotionMapper::default();
        let (command, _) = mapper
            .map(&sample(0.0, 0.0, 0.0, 5000), &origin_at(0), 5000)
            .unwrap();

        assert_eq!(command.speed, 0.0);
        assert_eq!(command.heading, 0);
    }

    #[test]
    fn test_speed_is_sqrt_of_abs_z() {
        let mapper = MotionMapper::default();
        let (command, _) = mapper
            .map(&sample(0.0, 0.0, -0.25, 5000), &origin_at(0), 5000)
            .unwrap();

        assert!((command.speed - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_spike_is_clamped_to_creep_speed() {
        let mapper = MotionMapper::default();
        for z in [1.01, -1.5, 4.0, -9.81] {
            let (command, _) = mapper
                .map(&sample(0.0, 0.0, z, 5000), &origin_at(0), 5000)
                .unwrap();
            assert_eq!(command.speed, CREEP_SPEED);
        }

        // Exactly 1.0 is still a valid full speed
        let (command, _) = mapper
            .map(&sample(0.0, 0.0, 1.0, 5000), &origin_at(0), 5000)
            .unwrap();
        assert_eq!(command.speed, 1.0);
    }

    #[test]
    fn test_non_finite_z_falls_back_to_creep_speed() {
        let mapper = MotionMapper::default();
        for z in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let (command, _) = mapper
                .map(&sample(0.0, 0.0, z, 5000), &origin_at(0), 5000)
                .unwrap();
            assert_eq!(command.speed, CREEP_SPEED);
        }
    }

    #[test]
    fn test_heading_convention() {
        assert_eq!(heading_between(0.0, 0.0, 1.0, 0.0), 90);
        assert_eq!(heading_between(0.0, 0.0, 0.0, 1.0), 0);
        assert_eq!(heading_between(0.0, 0.0, -1.0, 0.0), 270);
        assert_eq!(heading_between(0.0, 0.0, 0.0, -1.0), 180);
        assert_eq!(heading_between(0.0, 0.0, 1.0, 1.0), 45);
        assert_eq!(heading_between(0.5, 0.5, 0.5, 0.5), 0);
    }

    #[test]
    fn test_heading_is_relative_to_reference() {
        let mapper = MotionMapper::default();
        let reference = ReferencePoint {
            x: 0.3,
            y: -0.2,
            last_command_time_ms: 0,
        };
        let (command, _) = mapper
            .map(&sample(1.3, -0.2, 0.0, 2000), &reference, 2000)
            .unwrap();

        assert_eq!(command.heading, 90);
    }

    #[test]
    fn test_accepted_sample_becomes_reference() {
        let mapper = MotionMapper::default();
        let (_, next) = mapper
            .map(&sample(0.4, -0.1, 0.3, 2500), &origin_at(0), 2500)
            .unwrap();

        assert_eq!(
            next,
            ReferencePoint {
                x: 0.4,
                y: -0.1,
                last_command_time_ms: 2500
            }
        );
    }

    #[test]
    fn test_emitted_commands_are_spaced_by_rate_gate() {
        let mapper = MotionMapper::default();
        let mut reference = origin_at(0);
        let mut emitted = Vec::new();

        // 10 seconds at 60 Hz with a wobbling tilt
        for i in 0..600i64 {
            let t = i * 1000 / 60;
            let s = sample((i as f64 * 0.1).sin(), (i as f64 * 0.1).cos(), 0.2, t);
            if let Some((_, next)) = mapper.map(&s, &reference, t) {
                emitted.push(t);
                reference = next;
            }
        }

        assert!(!emitted.is_empty());
        for pair in emitted.windows(2) {
            assert!(pair[1] - pair[0] > RATE_GATE_MS);
        }
    }

    #[test]
    fn test_custom_settings() {
        let mapper = MotionMapper::new(&MotionSettings {
            rate_gate_ms: 200,
            creep_speed: 0.05,
        });
        let (command, _) = mapper
            .map(&sample(0.0, 0.0, 2.0, 201), &origin_at(0), 201)
            .unwrap();

        assert_eq!(command.speed, 0.05);
    }
}
