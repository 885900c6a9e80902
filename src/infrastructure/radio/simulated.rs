//! Simulated Robot Radio
//!
//! Stands in for the Bluetooth SDK: discovery, connect confirmations and
//! collisions are delivered later on the session channel from tokio tasks.

use crate::domain::models::{RobotId, SessionEvent};
use crate::domain::settings::SimulationSettings;
use crate::infrastructure::radio::{RadioError, RobotRadio};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct SimulatedRadio {
    settings: SimulationSettings,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    connected: Arc<Mutex<HashSet<RobotId>>>,
    collision_detection: bool,
    discovery_task: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
    collision_task: Option<JoinHandle<()>>,
}

impl SimulatedRadio {
    pub fn new(
        settings: SimulationSettings,
        event_sender: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            settings,
            event_sender,
            connected: Arc::new(Mutex::new(HashSet::new())),
            collision_detection: false,
            discovery_task: None,
            connect_task: None,
            collision_task: None,
        }
    }

    /// Robots this radio pretends to see, as `(id, name)`
    pub fn robots(&self) -> Vec<(RobotId, String)> {
        let count = self.settings.robot_count;
        (0..count)
            .map(|i| {
                let name = if count == 1 {
                    self.settings.robot_name.clone()
                } else {
                    format!("{}-{}", self.settings.robot_name, i + 1)
                };
                (RobotId(format!("sim-{}", i + 1)), name)
            })
            .collect()
    }

    pub fn is_connected(&self, id: &RobotId) -> bool {
        self.connected
            .lock()
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    /// Drop the link as if the robot went out of range
    pub fn drop_link(&mut self, id: &RobotId) {
        if self.remove_connection(id) {
            info!("[sim] link to {} lost", id);
            let _ = self.event_sender.send(SessionEvent::Disconnected(id.clone()));
        }
    }

    fn remove_connection(&mut self, id: &RobotId) -> bool {
        abort(&mut self.collision_task);
        self.collision_detection = false;
        self.connected
            .lock()
            .map(|mut set| set.remove(id))
            .unwrap_or(false)
    }

    fn require_connected(&self, id: &RobotId) -> Result<(), RadioError> {
        if self.is_connected(id) {
            Ok(())
        } else {
            Err(RadioError::NotConnected(id.clone()))
        }
    }

    fn arm_collision(&mut self, id: &RobotId) {
        let Some(after_ms) = self.settings.collision_after_ms else {
            return;
        };
        if !self.collision_detection || self.collision_task.is_some() {
            return;
        }

        let sender = self.event_sender.clone();
        let id = id.clone();
        self.collision_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            info!("[sim] {} bumped into something", id);
            let _ = sender.send(SessionEvent::CollisionDetected(id));
        }));
    }
}

impl RobotRadio for SimulatedRadio {
    fn discover(&mut self) -> Result<(), RadioError> {
        abort(&mut self.discovery_task);

        let robots = self.robots();
        let delay = Duration::from_millis(self.settings.discovery_delay_ms);
        let sender = self.event_sender.clone();
        info!("[sim] scanning for robots...");

        self.discovery_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if robots.is_empty() {
                let _ = sender.send(SessionEvent::NoRobotsFound);
                return;
            }
            for (id, name) in robots {
                let _ = sender.send(SessionEvent::Discovered { id, name });
            }
        }));
        Ok(())
    }

    fn cancel_discovery(&mut self) {
        abort(&mut self.discovery_task);
    }

    fn connect(&mut self, id: &RobotId) -> Result<(), RadioError> {
        if !self.robots().iter().any(|(known, _)| known == id) {
            return Err(RadioError::Unknown(id.clone()));
        }
        abort(&mut self.connect_task);

        let delay = Duration::from_millis(self.settings.connect_delay_ms);
        let sender = self.event_sender.clone();
        let connected = self.connected.clone();
        let id = id.clone();
        info!("[sim] connecting to {}", id);

        self.connect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut set) = connected.lock() {
                set.insert(id.clone());
            }
            let _ = sender.send(SessionEvent::Connected(id));
        }));
        Ok(())
    }

    fn disconnect(&mut self, id: &RobotId) -> Result<(), RadioError> {
        abort(&mut self.connect_task);
        if self.remove_connection(id) {
            info!("[sim] disconnected from {}", id);
            Ok(())
        } else {
            Err(RadioError::NotConnected(id.clone()))
        }
    }

    fn sleep(&mut self, id: &RobotId) -> Result<(), RadioError> {
        self.require_connected(id)?;
        info!("[sim] {} going to sleep", id);
        Ok(())
    }

    fn stop_all_sensors(&mut self, id: &RobotId) -> Result<(), RadioError> {
        self.require_connected(id)?;
        debug!("[sim] {} sensors stopped", id);
        Ok(())
    }

    fn start_collision_detection(&mut self, id: &RobotId) -> Result<(), RadioError> {
        self.require_connected(id)?;
        self.collision_detection = true;
        debug!("[sim] {} collision detection on", id);
        Ok(())
    }

    fn stop_collision_detection(&mut self, id: &RobotId) -> Result<(), RadioError> {
        self.require_connected(id)?;
        self.collision_detection = false;
        abort(&mut self.collision_task);
        debug!("[sim] {} collision detection off", id);
        Ok(())
    }

    fn roll(&mut self, id: &RobotId, heading: u16, speed: f32) -> Result<(), RadioError> {
        self.require_connected(id)?;
        info!("[sim] {} roll heading={} speed={:.2}", id, heading, speed);

        if speed > 0.0 {
            self.arm_collision(id);
        } else {
            abort(&mut self.collision_task);
        }
        Ok(())
    }

    fn set_heading(&mut self, id: &RobotId, heading: u16) -> Result<(), RadioError> {
        self.require_connected(id)?;
        debug!("[sim] {} heading set to {}", id, heading);
        Ok(())
    }

    fn set_back_light(&mut self, id: &RobotId, intensity: f32) -> Result<(), RadioError> {
        self.require_connected(id)?;
        debug!("[sim] {} back light {:.2}", id, intensity);
        Ok(())
    }

    fn set_color(&mut self, id: &RobotId, r: u8, g: u8, b: u8) -> Result<(), RadioError> {
        self.require_connected(id)?;
        debug!("[sim] {} color #{:02X}{:02X}{:02X}", id, r, g, b);
        Ok(())
    }
}

impl Drop for SimulatedRadio {
    fn drop(&mut self) {
        abort(&mut self.discovery_task);
        abort(&mut self.connect_task);
        abort(&mut self.collision_task);
    }
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings() -> SimulationSettings {
        SimulationSettings {
            discovery_delay_ms: 1,
            connect_delay_ms: 1,
            ..SimulationSettings::default()
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_discover_then_connect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut radio = SimulatedRadio::new(fast_settings(), tx);

        radio.discover().unwrap();
        let (id, name) = match next(&mut rx).await {
            SessionEvent::Discovered { id, name } => (id, name),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(name, "Sphero-RGB");
        assert!(radio.roll(&id, 0, 0.0).is_err());

        radio.connect(&id).unwrap();
        match next(&mut rx).await {
            SessionEvent::Connected(connected) => assert_eq!(connected, id),
            other => panic!("unexpected {:?}", other),
        }
        assert!(radio.is_connected(&id));
        assert!(radio.roll(&id, 90, 0.5).is_ok());

        radio.disconnect(&id).unwrap();
        assert_eq!(radio.roll(&id, 0, 0.0), Err(RadioError::NotConnected(id)));
    }

    #[tokio::test]
    async fn test_no_robots() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut radio = SimulatedRadio::new(
            SimulationSettings {
                robot_count: 0,
                ..fast_settings()
            },
            tx,
        );

        radio.discover().unwrap();
        assert!(matches!(next(&mut rx).await, SessionEvent::NoRobotsFound));
        assert!(radio.connect(&RobotId("sim-1".to_string())).is_err());
    }

    #[tokio::test]
    async fn test_collision_after_rolling() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut radio = SimulatedRadio::new(
            SimulationSettings {
                collision_after_ms: Some(5),
                ..fast_settings()
            },
            tx,
        );
        let id = RobotId("sim-1".to_string());
        radio.connect(&id).unwrap();
        next(&mut rx).await;

        // Rolling without detection never collides
        radio.roll(&id, 0, 0.5).unwrap();
        radio.start_collision_detection(&id).unwrap();
        radio.roll(&id, 0, 0.5).unwrap();
        match next(&mut rx).await {
            SessionEvent::CollisionDetected(hit) => assert_eq!(hit, id),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drop_link_reports_disconnect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut radio = SimulatedRadio::new(fast_settings(), tx);
        let id = RobotId("sim-1".to_string());
        radio.connect(&id).unwrap();
        next(&mut rx).await;

        radio.drop_link(&id);
        assert!(matches!(next(&mut rx).await, SessionEvent::Disconnected(lost) if lost == id));
        assert!(!radio.is_connected(&id));
    }

    #[test]
    fn test_multiple_robot_names() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let radio = SimulatedRadio::new(
            SimulationSettings {
                robot_count: 2,
                ..SimulationSettings::default()
            },
            tx,
        );
        let names: Vec<String> = radio.robots().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["Sphero-RGB-1", "Sphero-RGB-2"]);
    }
}
