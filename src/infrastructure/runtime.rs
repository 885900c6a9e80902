//! Session Runtime
//!
//! Single-consumer event loop around [`SessionController`]. Radio callbacks,
//! sensor samples, user actions and the connect timer are all funneled into
//! one channel and applied one at a time.

use crate::domain::models::{RobotId, SessionEvent, UserAction};
use crate::domain::session::SessionController;
use crate::infrastructure::clock::now_millis;
use crate::infrastructure::radio::RobotRadio;
use crate::infrastructure::sensor::SensorFeed;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Session runtime has stopped")]
pub struct SessionClosed;

/// Cloneable front door to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    exit_sender: mpsc::UnboundedSender<()>,
}

/// Receiving side of the session channels, consumed by [`SessionRuntime::new`]
pub struct SessionInbox {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    exit: mpsc::UnboundedReceiver<()>,
}

pub fn session_channel() -> (SessionHandle, SessionInbox) {
    let (event_sender, events) = mpsc::unbounded_channel();
    let (exit_sender, exit) = mpsc::unbounded_channel();
    (
        SessionHandle {
            event_sender,
            exit_sender,
        },
        SessionInbox { events, exit },
    )
}

impl SessionHandle {
    /// Sender for collaborators that report asynchronous events
    pub fn event_sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.event_sender.clone()
    }

    pub fn connect(&self) -> Result<(), SessionClosed> {
        self.user(UserAction::Connect)
    }

    pub fn start(&self) -> Result<(), SessionClosed> {
        self.user(UserAction::StartRun)
    }

    pub fn stop(&self) -> Result<(), SessionClosed> {
        self.user(UserAction::StopRun)
    }

    pub fn toggle(&self, on: bool) -> Result<(), SessionClosed> {
        self.user(UserAction::Toggle(on))
    }

    pub fn shutdown(&self) -> Result<(), SessionClosed> {
        self.user(UserAction::Shutdown)
    }

    /// Shut the session down and stop the runtime loop
    pub fn close(&self) -> Result<(), SessionClosed> {
        self.exit_sender.send(()).map_err(|_| SessionClosed)
    }

    fn user(&self, action: UserAction) -> Result<(), SessionClosed> {
        self.event_sender
            .send(SessionEvent::User(action))
            .map_err(|_| SessionClosed)
    }
}

pub struct SessionRuntime<R: RobotRadio, S: SensorFeed> {
    controller: SessionController<R, S>,
    inbox: SessionInbox,
}

impl<R: RobotRadio, S: SensorFeed> SessionRuntime<R, S> {
    pub fn new(controller: SessionController<R, S>, inbox: SessionInbox) -> Self {
        Self { controller, inbox }
    }

    /// Run until [`SessionHandle::close`] is called or every handle is gone.
    /// The session is always shut down before returning.
    pub async fn run(mut self) -> SessionController<R, S> {
        info!("Session runtime started");

        loop {
            let timer = self.controller.connect_deadline();
            let event = tokio::select! {
                biased;
                _ = self.inbox.exit.recv() => break,
                event = self.inbox.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                id = wait_for_deadline(timer) => SessionEvent::ConnectTimeout(id),
            };

            self.controller.handle(event, now_millis());
        }

        debug!("Session runtime closing");
        self.controller.shutdown();
        info!("Session runtime stopped");
        self.controller
    }
}

async fn wait_for_deadline(timer: Option<(RobotId, i64)>) -> RobotId {
    match timer {
        Some((id, deadline_ms)) => {
            let wait_ms = (deadline_ms - now_millis()).max(0) as u64 + 1;
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            id
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AppEvent, SessionPhase, SessionSnapshot};
    use crate::domain::motion::MotionMapper;
    use crate::domain::settings::{SessionSettings, SimulationSettings};
    use crate::infrastructure::radio::SimulatedRadio;
    use crate::infrastructure::sensor::SimulatedAccelerometer;

    async fn wait_for_phase(
        rx: &mut mpsc::UnboundedReceiver<AppEvent>,
        phase: SessionPhase,
    ) -> SessionSnapshot {
        let deadline = Duration::from_secs(3);
        tokio::time::timeout(deadline, async {
            while let Some(event) = rx.recv().await {
                if let AppEvent::Snapshot(snapshot) = event {
                    if snapshot.phase == phase {
                        return snapshot;
                    }
                }
            }
            panic!("observer channel closed");
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", phase))
    }

    fn spawn_session(
        simulation: SimulationSettings,
        session: SessionSettings,
    ) -> (
        SessionHandle,
        mpsc::UnboundedReceiver<AppEvent>,
        tokio::task::JoinHandle<SessionController<SimulatedRadio, SimulatedAccelerometer>>,
    ) {
        let (handle, inbox) = session_channel();
        let (app_tx, app_rx) = mpsc::unbounded_channel();
        let sensor = SimulatedAccelerometer::new(simulation.sample_rate_hz, handle.event_sender());
        let radio = SimulatedRadio::new(simulation, handle.event_sender());
        let controller =
            SessionController::new(radio, sensor, MotionMapper::default(), session, app_tx);
        let task = tokio::spawn(SessionRuntime::new(controller, inbox).run());
        (handle, app_rx, task)
    }

    #[tokio::test]
    async fn test_full_session_with_collision() {
        let simulation = SimulationSettings {
            discovery_delay_ms: 5,
            connect_delay_ms: 5,
            sample_rate_hz: 100,
            collision_after_ms: Some(50),
            ..SimulationSettings::default()
        };
        let (handle, mut rx, task) = spawn_session(simulation, SessionSettings::default());

        handle.connect().unwrap();
        let ready = wait_for_phase(&mut rx, SessionPhase::Ready).await;
        assert_eq!(ready.status, "Connected to Sphero-RGB");

        handle.start().unwrap();
        wait_for_phase(&mut rx, SessionPhase::Running).await;

        // First tilt roll arrives after the rate gate, then the robot hits the wall
        let alerted = wait_for_phase(&mut rx, SessionPhase::Alerted).await;
        assert!(alerted.can_start);

        handle.close().unwrap();
        let controller = task.await.unwrap();
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(controller.subscriptions().is_empty());
        assert!(!controller.sensor().is_subscribed());
    }

    #[tokio::test]
    async fn test_connect_timeout_returns_to_idle() {
        let simulation = SimulationSettings {
            discovery_delay_ms: 5,
            connect_delay_ms: 10_000,
            ..SimulationSettings::default()
        };
        let session = SessionSettings {
            connect_timeout_ms: 50,
            ..SessionSettings::default()
        };
        let (handle, mut rx, task) = spawn_session(simulation, session);

        handle.toggle(true).unwrap();
        wait_for_phase(&mut rx, SessionPhase::Connecting).await;
        let idle = wait_for_phase(&mut rx, SessionPhase::Idle).await;
        assert_eq!(idle.toggle_label, "Disconnected");

        handle.close().unwrap();
        task.await.unwrap();
        assert_eq!(handle.connect(), Err(SessionClosed));
    }
}
