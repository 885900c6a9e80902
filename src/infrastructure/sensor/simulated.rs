//! Simulated accelerometer producing a slow circular tilt.

use crate::domain::models::{AccelerationSample, SessionEvent};
use crate::infrastructure::clock::now_millis;
use crate::infrastructure::sensor::{SensorError, SensorFeed};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Tilt circle radius (g)
const TILT: f64 = 0.5;
/// Rotation of the tilt direction (rad/s)
const TURN_RATE: f64 = 0.4;

pub struct SimulatedAccelerometer {
    sample_rate_hz: u32,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedAccelerometer {
    pub fn new(sample_rate_hz: u32, event_sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            sample_rate_hz,
            event_sender,
            task: None,
        }
    }
}

/// Reading `elapsed_s` seconds into a subscription
pub fn tilt_at(elapsed_s: f64, timestamp_ms: i64) -> AccelerationSample {
    let angle = elapsed_s * TURN_RATE;
    AccelerationSample::new(
        TILT * angle.cos(),
        TILT * angle.sin(),
        0.25 + 0.2 * (angle * 0.7).sin(),
        timestamp_ms,
    )
}

impl SensorFeed for SimulatedAccelerometer {
    fn subscribe(&mut self) -> Result<(), SensorError> {
        if self.sample_rate_hz == 0 {
            return Err(SensorError::Unavailable);
        }
        if self.task.is_some() {
            return Err(SensorError::AlreadySubscribed);
        }

        let period = Duration::from_secs_f64(1.0 / self.sample_rate_hz as f64);
        let sender = self.event_sender.clone();
        info!("[sim] accelerometer on at {} Hz", self.sample_rate_hz);

        self.task = Some(tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let elapsed = started.elapsed().as_secs_f64();
                if sender
                    .send(SessionEvent::Sample(tilt_at(elapsed, now_millis())))
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("[sim] accelerometer off");
        }
    }

    fn is_subscribed(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for SimulatedAccelerometer {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
