use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "tilt_drive".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Minimum milliseconds between roll commands
    #[serde(default = "default_rate_gate_ms")]
    pub rate_gate_ms: u64,
    /// Speed substituted when tilt would exceed full speed
    #[serde(default = "default_creep_speed")]
    pub creep_speed: f32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            rate_gate_ms: default_rate_gate_ms(),
            creep_speed: default_creep_speed(),
        }
    }
}

fn default_rate_gate_ms() -> u64 {
    1000
}
fn default_creep_speed() -> f32 {
    0.01
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Give up on a pending connect after this long. 0 waits forever.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_back_light")]
    pub back_light: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            back_light: default_back_light(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_back_light() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_robot_name")]
    pub robot_name: String,
    /// Robots answering a discovery; 0 reports "no robots"
    #[serde(default = "default_robot_count")]
    pub robot_count: u32,
    #[serde(default = "default_discovery_delay_ms")]
    pub discovery_delay_ms: u64,
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    /// Report a collision after this much rolling
    #[serde(default)]
    pub collision_after_ms: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            robot_name: default_robot_name(),
            robot_count: default_robot_count(),
            discovery_delay_ms: default_discovery_delay_ms(),
            connect_delay_ms: default_connect_delay_ms(),
            sample_rate_hz: default_sample_rate_hz(),
            collision_after_ms: None,
        }
    }
}

fn default_robot_name() -> String {
    "Sphero-RGB".to_string()
}
fn default_robot_count() -> u32 {
    1
}
fn default_discovery_delay_ms() -> u64 {
    300
}
fn default_connect_delay_ms() -> u64 {
    500
}
fn default_sample_rate_hz() -> u32 {
    60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,
    #[serde(default)]
    pub motion: MotionSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("TiltDrive");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "motion": { "creep_speed": 0.02 } }"#).unwrap();

        assert_eq!(settings.motion.creep_speed, 0.02);
        assert_eq!(settings.motion.rate_gate_ms, 1000);
        assert_eq!(settings.session.connect_timeout_ms, 10_000);
        assert_eq!(settings.simulation.sample_rate_hz, 60);
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn test_missing_file_uses_defaults_and_save_round_trips() {
        let dir = std::env::temp_dir().join(format!("tilt_drive_settings_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);

        let service = SettingsService::from_path(path.clone());
        assert_eq!(service.get().simulation.robot_count, 1);
        service.save().unwrap();
        assert!(path.exists());

        let reloaded = SettingsService::from_path(path.clone());
        assert_eq!(reloaded.get().simulation.robot_count, 1);

        fs::write(&path, r#"{"simulation":{"robot_name":"Ollie"}}"#).unwrap();
        let edited = SettingsService::from_path(path);
        assert_eq!(edited.get().simulation.robot_name, "Ollie");
        let _ = fs::remove_dir_all(&dir);
    }
}
