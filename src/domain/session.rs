//! Session State Machine
//!
//! Owns the single robot connection and is the only component that sends
//! commands to it. Every input (user actions, radio callbacks, sensor
//! samples, timers) arrives through [`SessionController::handle`] on one
//! ordered stream, so transitions never interleave.
//!
//! ```text
//! Idle ─connect─▶ Discovering ─found─▶ Connecting ─confirmed─▶ Ready
//!  ▲                  │ no robots           │ timeout            │ ▲ start/stop
//!  └──────────────────┴─────────────────────┘                   ▼ │
//!  ◀──────────── shutdown / link lost (any phase) ────────── Running ◀─▶ Alerted
//!                                                                 collision / start
//! ```

use crate::domain::collision::CollisionInterlock;
use crate::domain::models::{
    AccelerationSample, AppEvent, ConnectionState, LightState, MessageSeverity, MotionCommand,
    ReferencePoint, RobotHandle, RobotId, SessionEvent, SessionPhase, SessionSnapshot,
    StatusMessage, UserAction,
};
use crate::domain::motion::MotionMapper;
use crate::domain::settings::SessionSettings;
use crate::infrastructure::radio::{RadioError, RobotRadio};
use crate::infrastructure::sensor::SensorFeed;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

const NO_ROBOT_CONNECTED: &str = "No robot connected";

/// External event sources the session is currently subscribed to
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Subscriptions {
    pub discovery: bool,
    pub collisions: bool,
    pub sensor: bool,
}

impl Subscriptions {
    pub fn is_empty(&self) -> bool {
        !(self.discovery || self.collisions || self.sensor)
    }
}

/// All mutable session state, owned by one controller
#[derive(Debug)]
pub struct Session {
    phase: SessionPhase,
    robot: Option<RobotHandle>,
    reference: ReferencePoint,
    subscriptions: Subscriptions,
    status: String,
    light: LightState,
    connect_deadline_ms: Option<i64>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            robot: None,
            reference: ReferencePoint::default(),
            subscriptions: Subscriptions::default(),
            status: NO_ROBOT_CONNECTED.to_string(),
            light: LightState::Off,
            connect_deadline_ms: None,
        }
    }
}

pub struct SessionController<R: RobotRadio, S: SensorFeed> {
    session: Session,
    radio: R,
    sensor: S,
    mapper: MotionMapper,
    interlock: CollisionInterlock,
    settings: SessionSettings,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    last_snapshot: Option<SessionSnapshot>,
}

impl<R: RobotRadio, S: SensorFeed> SessionController<R, S> {
    pub fn new(
        radio: R,
        sensor: S,
        mapper: MotionMapper,
        settings: SessionSettings,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            session: Session::default(),
            radio,
            sensor,
            mapper,
            interlock: CollisionInterlock::new(),
            settings,
            event_sender,
            last_snapshot: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    pub fn robot(&self) -> Option<&RobotHandle> {
        self.session.robot.as_ref()
    }

    pub fn subscriptions(&self) -> Subscriptions {
        self.session.subscriptions
    }

    pub fn reference(&self) -> ReferencePoint {
        self.session.reference
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// Pending connect deadline, if a connection attempt is outstanding
    pub fn connect_deadline(&self) -> Option<(RobotId, i64)> {
        let deadline = self.session.connect_deadline_ms?;
        let robot = self.session.robot.as_ref()?;
        Some((robot.id.clone(), deadline))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let phase = self.session.phase;
        let toggle_label = match phase {
            SessionPhase::Idle | SessionPhase::ShuttingDown => "Disconnected",
            SessionPhase::Discovering | SessionPhase::Connecting => "Connecting...",
            SessionPhase::Ready | SessionPhase::Running | SessionPhase::Alerted => "Connected",
        };

        SessionSnapshot {
            phase,
            status: self.session.status.clone(),
            light: self.session.light,
            toggle_on: phase != SessionPhase::Idle,
            toggle_label,
            can_start: matches!(phase, SessionPhase::Ready | SessionPhase::Alerted),
            can_stop: phase.is_driving(),
        }
    }

    /// Apply one event. `now_ms` is the time the event was taken off the queue;
    /// samples carry their own timestamp.
    pub fn handle(&mut self, event: SessionEvent, now_ms: i64) {
        match event {
            SessionEvent::User(action) => self.on_user_action(action, now_ms),
            SessionEvent::Discovered { id, name } => self.on_discovered(id, name, now_ms),
            SessionEvent::NoRobotsFound => self.on_no_robots(),
            SessionEvent::Connected(id) => self.on_connected(&id),
            SessionEvent::ConnectFailed { id, reason } => self.on_connect_failed(&id, &reason),
            SessionEvent::Disconnected(id) => self.on_link_lost(&id),
            SessionEvent::CollisionDetected(id) => self.on_collision(&id),
            SessionEvent::Sample(sample) => self.on_sample(&sample),
            SessionEvent::ConnectTimeout(id) => self.on_connect_timeout(&id, now_ms),
        }

        debug_assert!(
            !self.session.phase.is_driving()
                || self.session.robot.as_ref().is_some_and(RobotHandle::is_connected),
            "driving phase without a connected robot"
        );
        self.publish_snapshot();
    }

    fn on_user_action(&mut self, action: UserAction, now_ms: i64) {
        match action {
            UserAction::Connect | UserAction::Toggle(true) => {
                if self.session.phase == SessionPhase::Idle {
                    self.begin_discovery();
                } else {
                    debug!("Connect ignored in phase {}", self.session.phase);
                }
            }
            UserAction::Toggle(false) | UserAction::Shutdown => self.shutdown(),
            UserAction::StartRun => match self.session.phase {
                SessionPhase::Ready | SessionPhase::Alerted => self.start_run(now_ms),
                phase => debug!("Start ignored in phase {}", phase),
            },
            UserAction::StopRun => match self.session.phase {
                SessionPhase::Running | SessionPhase::Alerted => self.stop_run(),
                phase => debug!("Stop ignored in phase {}", phase),
            },
        }
    }

    fn begin_discovery(&mut self) {
        if let Err(e) = self.radio.discover() {
            warn!("Discovery request failed: {}", e);
            self.notify(format!("Could not search for robots: {}", e), MessageSeverity::Error);
            return;
        }

        self.session.subscriptions.discovery = true;
        self.session.status = NO_ROBOT_CONNECTED.to_string();
        self.set_phase(SessionPhase::Discovering);
        self.notify("Searching for robots...", MessageSeverity::Info);
    }

    fn on_discovered(&mut self, id: RobotId, name: String, now_ms: i64) {
        if let Some(held) = &self.session.robot {
            debug!("Ignoring discovery of {} while holding {}", id, held.id);
            return;
        }
        if self.session.phase != SessionPhase::Discovering {
            debug!("Ignoring stale discovery of {} in phase {}", id, self.session.phase);
            return;
        }

        info!("Discovered robot {} ({})", name, id);
        if let Err(e) = self.radio.connect(&id) {
            warn!("Connect request to {} failed: {}", id, e);
            self.notify(format!("Could not connect to {}: {}", name, e), MessageSeverity::Error);
            self.teardown();
            return;
        }

        self.session.status = format!("Connecting to {}", name);
        self.session.robot = Some(RobotHandle::new(id, name));
        self.session.connect_deadline_ms = match self.settings.connect_timeout_ms {
            0 => None,
            timeout => Some(now_ms + timeout as i64),
        };
        self.set_phase(SessionPhase::Connecting);
    }

    fn on_no_robots(&mut self) {
        if self.session.phase != SessionPhase::Discovering || self.session.robot.is_some() {
            debug!("Ignoring no-robots signal in phase {}", self.session.phase);
            return;
        }

        self.notify(NO_ROBOT_CONNECTED, MessageSeverity::Warning);
        self.teardown();
    }

    fn on_connected(&mut self, id: &RobotId) {
        if !self.holds(id) || self.session.phase != SessionPhase::Connecting {
            debug!("Discarding stale connect confirmation for {}", id);
            return;
        }

        let name = match self.session.robot.as_mut() {
            Some(robot) => {
                robot.state = ConnectionState::Connected;
                robot.name.clone()
            }
            None => return,
        };
        self.session.connect_deadline_ms = None;
        self.cancel_discovery();

        match self.radio.start_collision_detection(id) {
            Ok(()) => self.session.subscriptions.collisions = true,
            Err(e) => warn!("Could not start collision detection: {}", e),
        }

        self.session.reference = ReferencePoint::default();
        self.session.status = format!("Connected to {}", name);
        self.set_phase(SessionPhase::Ready);
        self.set_light(LightState::Stopped);
        self.notify(format!("Connected to {}", name), MessageSeverity::Success);
    }

    fn on_connect_failed(&mut self, id: &RobotId, reason: &str) {
        if !self.holds(id) || self.session.phase != SessionPhase::Connecting {
            debug!("Discarding stale connect failure for {}", id);
            return;
        }

        // Stay in Connecting, the connect deadline decides when to give up
        warn!("Connection to {} failed: {}", id, reason);
        self.notify(
            format!("Connection failed: {}, waiting", reason),
            MessageSeverity::Warning,
        );
    }

    fn on_connect_timeout(&mut self, id: &RobotId, now_ms: i64) {
        let expired = self
            .session
            .connect_deadline_ms
            .is_some_and(|deadline| now_ms >= deadline);
        if !self.holds(id) || self.session.phase != SessionPhase::Connecting || !expired {
            debug!("Ignoring connect timeout for {}", id);
            return;
        }

        let name = self
            .session
            .robot
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_default();
        warn!("Connection to {} timed out", name);
        self.notify(format!("Connection to {} timed out", name), MessageSeverity::Warning);
        self.teardown();
    }

    fn on_link_lost(&mut self, id: &RobotId) {
        if !self.holds(id) {
            debug!("Discarding disconnect of stale robot {}", id);
            return;
        }

        warn!("Lost connection to {} in phase {}", id, self.session.phase);
        if let Some(robot) = self.session.robot.as_mut() {
            robot.state = ConnectionState::Disconnected;
        }
        // The link is gone; nothing can be sent to the robot any more
        self.session.subscriptions.collisions = false;
        self.notify("Robot disconnected", MessageSeverity::Warning);
        self.teardown();
    }

    fn on_collision(&mut self, id: &RobotId) {
        if !self.holds(id) {
            debug!("Discarding collision from stale robot {}", id);
            return;
        }

        match self.session.phase {
            SessionPhase::Running => {
                let (stop, light) = self.interlock.on_collision();
                self.set_phase(SessionPhase::Alerted);
                self.send_motion(stop);
                self.set_light(light);
                self.notify("Collision detected, robot stopped", MessageSeverity::Warning);
            }
            phase => debug!("Collision ignored in phase {}", phase),
        }
    }

    fn on_sample(&mut self, sample: &AccelerationSample) {
        if self.session.phase != SessionPhase::Running {
            trace!("Sample dropped in phase {}", self.session.phase);
            return;
        }

        if let Some((command, next)) =
            self.mapper
                .map(sample, &self.session.reference, sample.timestamp_ms)
        {
            self.send_motion(command);
            self.session.reference = next;
        }
    }

    fn start_run(&mut self, now_ms: i64) {
        if !self.session.subscriptions.sensor {
            if let Err(e) = self.sensor.subscribe() {
                warn!("Could not subscribe to accelerometer: {}", e);
                self.notify(format!("Accelerometer: {}", e), MessageSeverity::Error);
                return;
            }
            self.session.subscriptions.sensor = true;
        }

        self.set_phase(SessionPhase::Running);
        self.set_light(LightState::Running);
        self.send_motion(MotionCommand::STOP);
        // The start roll counts as the last command for the rate gate
        self.session.reference.last_command_time_ms = now_ms;
    }

    fn stop_run(&mut self) {
        self.unsubscribe_sensor();
        self.send_motion(MotionCommand::STOP);
        self.set_phase(SessionPhase::Ready);
        self.set_light(LightState::Stopped);
    }

    /// Stop, sleep and disconnect the robot, then drop every subscription.
    /// Safe from any phase and idempotent.
    pub fn shutdown(&mut self) {
        if self.session.phase == SessionPhase::Idle
            && self.session.robot.is_none()
            && self.session.subscriptions.is_empty()
        {
            debug!("Shutdown requested while already idle");
            return;
        }

        self.set_phase(SessionPhase::ShuttingDown);
        self.unsubscribe_sensor();

        let connected = self
            .session
            .robot
            .as_ref()
            .filter(|r| r.is_connected())
            .map(|r| r.id.clone());
        if let Some(id) = connected {
            info!("Putting robot {} to sleep and disconnecting", id);
            self.best_effort("roll", |radio| radio.roll(&id, 0, 0.0));
            self.best_effort("stop sensors", |radio| radio.stop_all_sensors(&id));
            self.best_effort("stop collision detection", |radio| {
                radio.stop_collision_detection(&id)
            });
            self.best_effort("sleep", |radio| radio.sleep(&id));
            self.best_effort("disconnect", |radio| radio.disconnect(&id));
            self.session.subscriptions.collisions = false;
        }

        self.teardown();
    }

    /// Return to Idle without sending anything to the robot
    fn teardown(&mut self) {
        self.unsubscribe_sensor();
        self.cancel_discovery();
        self.session.subscriptions.collisions = false;

        self.session.robot = None;
        self.session.connect_deadline_ms = None;
        self.session.status = NO_ROBOT_CONNECTED.to_string();
        self.session.light = LightState::Off;
        self.set_phase(SessionPhase::Idle);
    }

    fn unsubscribe_sensor(&mut self) {
        if self.session.subscriptions.sensor {
            self.sensor.unsubscribe();
            self.session.subscriptions.sensor = false;
        }
    }

    fn cancel_discovery(&mut self) {
        if self.session.subscriptions.discovery {
            self.radio.cancel_discovery();
            self.session.subscriptions.discovery = false;
        }
    }

    fn send_motion(&mut self, command: MotionCommand) {
        debug_assert!(
            self.session.phase.is_driving(),
            "motion command outside Running/Alerted"
        );
        let Some(id) = self.connected_id() else {
            return;
        };

        debug!("Roll heading={} speed={:.3}", command.heading, command.speed);
        self.best_effort("roll", |radio| {
            radio.roll(&id, command.heading, command.speed)
        });
    }

    fn set_light(&mut self, light: LightState) {
        self.session.light = light;
        let Some(id) = self.connected_id() else {
            return;
        };

        let (r, g, b) = light.rgb();
        let back_light = self.settings.back_light;
        self.best_effort("set heading", |radio| radio.set_heading(&id, 0));
        self.best_effort("set back light", |radio| radio.set_back_light(&id, back_light));
        self.best_effort("set color", |radio| radio.set_color(&id, r, g, b));
    }

    fn best_effort<F>(&mut self, what: &str, command: F)
    where
        F: FnOnce(&mut R) -> Result<(), RadioError>,
    {
        if let Err(e) = command(&mut self.radio) {
            warn!("Robot command '{}' failed: {}", what, e);
        }
    }

    fn connected_id(&self) -> Option<RobotId> {
        self.session
            .robot
            .as_ref()
            .filter(|r| r.is_connected())
            .map(|r| r.id.clone())
    }

    fn holds(&self, id: &RobotId) -> bool {
        self.session.robot.as_ref().is_some_and(|r| &r.id == id)
    }

    fn set_phase(&mut self, to: SessionPhase) {
        if self.session.phase != to {
            info!("Session phase {} -> {}", self.session.phase, to);
            self.session.phase = to;
        }
    }

    fn notify(&self, message: impl Into<String>, severity: MessageSeverity) {
        let _ = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }

    fn publish_snapshot(&mut self) {
        let snapshot = self.snapshot();
        if self.last_snapshot.as_ref() != Some(&snapshot) {
            let _ = self.event_sender.send(AppEvent::Snapshot(snapshot.clone()));
            self.last_snapshot = Some(snapshot);
        }
    }
}
