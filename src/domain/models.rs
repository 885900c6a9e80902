use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a robot as reported by the radio layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RobotId(pub String);

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The one robot the session is paired with
#[derive(Debug, Clone)]
pub struct RobotHandle {
    pub id: RobotId,
    pub name: String,
    pub state: ConnectionState,
}

impl RobotHandle {
    pub fn new(id: RobotId, name: String) -> Self {
        Self {
            id,
            name,
            state: ConnectionState::Connecting,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// One accelerometer reading in device-local axes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccelerationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,

    // Logical time of the reading (milliseconds)
    pub timestamp_ms: i64,
}

impl AccelerationSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms,
        }
    }
}

/// Last accepted position and the time the last command went out
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReferencePoint {
    pub x: f64,
    pub y: f64,
    pub last_command_time_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCommand {
    /// Compass degrees, 0 = forward, always in `0..360`
    pub heading: u16,
    /// Normalized speed in `0.0..=1.0`
    pub speed: f32,
}

impl MotionCommand {
    pub const STOP: MotionCommand = MotionCommand {
        heading: 0,
        speed: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Discovering,
    Connecting,
    Ready,
    Running,
    Alerted,
    ShuttingDown,
}

impl SessionPhase {
    /// Phases in which motion commands may reach the robot
    pub fn is_driving(&self) -> bool {
        matches!(self, Self::Running | Self::Alerted)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Discovering => "Discovering",
            Self::Connecting => "Connecting",
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Alerted => "Alerted",
            Self::ShuttingDown => "ShuttingDown",
        };
        f.write_str(name)
    }
}

/// Visual state shown on the robot and mirrored to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightState {
    Off,
    Stopped,
    Running,
    Alert,
}

impl LightState {
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Self::Off => (0, 0, 0),
            Self::Stopped | Self::Alert => (255, 0, 0),
            Self::Running => (0, 255, 0),
        }
    }
}

/// Inputs available to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Connect,
    StartRun,
    StopRun,
    /// Connection toggle switched on (`true`) or off (`false`)
    Toggle(bool),
    Shutdown,
}

/// Everything the session reacts to, normalized into one ordered stream
#[derive(Debug, Clone)]
pub enum SessionEvent {
    User(UserAction),
    Discovered { id: RobotId, name: String },
    NoRobotsFound,
    Connected(RobotId),
    ConnectFailed { id: RobotId, reason: String },
    Disconnected(RobotId),
    CollisionDetected(RobotId),
    Sample(AccelerationSample),
    ConnectTimeout(RobotId),
}

/// What observers see after each handled event
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub status: String,
    pub light: LightState,
    pub toggle_on: bool,
    pub toggle_label: &'static str,
    pub can_start: bool,
    pub can_stop: bool,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Snapshot(SessionSnapshot),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
