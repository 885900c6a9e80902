//! Console front-end
//!
//! A thin observer of the session: reads one command per line from stdin,
//! forwards it as a user action and prints snapshots and notices.

use crate::domain::models::{AppEvent, LightState, MessageSeverity, SessionSnapshot, StatusMessage};
use crate::infrastructure::runtime::SessionHandle;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Start,
    Stop,
    Toggle,
    Disconnect,
    Status,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let command = match line.trim().to_lowercase().as_str() {
        "c" | "connect" => ConsoleCommand::Connect,
        "s" | "start" => ConsoleCommand::Start,
        "x" | "stop" => ConsoleCommand::Stop,
        "t" | "toggle" => ConsoleCommand::Toggle,
        "d" | "disconnect" => ConsoleCommand::Disconnect,
        "?" | "status" => ConsoleCommand::Status,
        "h" | "help" => ConsoleCommand::Help,
        "q" | "quit" | "exit" => ConsoleCommand::Quit,
        _ => return None,
    };
    Some(command)
}

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let light = match snapshot.light {
        LightState::Off => "off",
        LightState::Stopped => "red",
        LightState::Running => "green",
        LightState::Alert => "red (alert)",
    };
    let mut buttons = Vec::new();
    if snapshot.can_start {
        buttons.push("start");
    }
    if snapshot.can_stop {
        buttons.push("stop");
    }

    format!(
        "[{}] {} | light: {} | toggle: {} ({}) | {}",
        snapshot.phase,
        snapshot.status,
        light,
        if snapshot.toggle_on { "on" } else { "off" },
        snapshot.toggle_label,
        if buttons.is_empty() {
            "no run controls".to_string()
        } else {
            buttons.join("/")
        }
    )
}

fn render_message(message: &StatusMessage) -> String {
    let tag = match message.severity {
        MessageSeverity::Info => "info",
        MessageSeverity::Success => "ok",
        MessageSeverity::Warning => "warn",
        MessageSeverity::Error => "error",
    };
    format!("  ({}) {}", tag, message.message)
}

const HELP: &str = "commands: connect | start | stop | toggle | disconnect | status | quit";

pub struct ConsoleApp {
    session: SessionHandle,
    app_event_rx: mpsc::UnboundedReceiver<AppEvent>,
    latest_snapshot: Option<SessionSnapshot>,
}

impl ConsoleApp {
    pub fn new(session: SessionHandle, app_event_rx: mpsc::UnboundedReceiver<AppEvent>) -> Self {
        Self {
            session,
            app_event_rx,
            latest_snapshot: None,
        }
    }

    /// Runs until `quit`, end of input or Ctrl-C
    pub async fn run(mut self) -> Result<()> {
        println!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Some(ConsoleCommand::Quit) => break,
                        Some(command) => self.execute(command)?,
                        None => println!("unknown command '{}'. {}", line.trim(), HELP),
                    }
                }
                Some(event) = self.app_event_rx.recv() => self.on_app_event(event),
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down session");
                    break;
                }
            }
        }

        self.session.shutdown()?;
        Ok(())
    }

    fn execute(&mut self, command: ConsoleCommand) -> Result<()> {
        match command {
            ConsoleCommand::Connect => self.session.connect()?,
            ConsoleCommand::Start => self.session.start()?,
            ConsoleCommand::Stop => self.session.stop()?,
            ConsoleCommand::Toggle => {
                let on = self.latest_snapshot.as_ref().is_some_and(|s| s.toggle_on);
                self.session.toggle(!on)?
            }
            ConsoleCommand::Disconnect => self.session.shutdown()?,
            ConsoleCommand::Status => match &self.latest_snapshot {
                Some(snapshot) => println!("{}", render_snapshot(snapshot)),
                None => println!("[Idle] No robot connected"),
            },
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }

    fn on_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Snapshot(snapshot) => {
                println!("{}", render_snapshot(&snapshot));
                self.latest_snapshot = Some(snapshot);
            }
            AppEvent::LogMessage(message) => println!("{}", render_message(&message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SessionPhase;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("connect"), Some(ConsoleCommand::Connect));
        assert_eq!(parse_command("  S \n"), Some(ConsoleCommand::Start));
        assert_eq!(parse_command("stop"), Some(ConsoleCommand::Stop));
        assert_eq!(parse_command("exit"), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("fly"), None);
    }

    #[test]
    fn test_render_snapshot() {
        let snapshot = SessionSnapshot {
            phase: SessionPhase::Alerted,
            status: "Connected to Sphero-RGB".to_string(),
            light: LightState::Alert,
            toggle_on: true,
            toggle_label: "Connected",
            can_start: true,
            can_stop: true,
        };
        assert_eq!(
            render_snapshot(&snapshot),
            "[Alerted] Connected to Sphero-RGB | light: red (alert) | toggle: on (Connected) | start/stop"
        );
    }
}
