// Serial settings, robot limits, buffer sizes
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Serial port of the USB dongle
pub const DEFAULT_PORT: &str = "/dev/tty.usbmodem14201";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

// Bounded wait of a single read
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

// Wait after open in case toggling the control lines reset the dongle
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

// Robot limits
pub const MAX_VELOCITY: f32 = 0.5; // m/s
pub const MAX_ANGULAR_RATE: f32 = 1.0; // rad/s

// Buffer sizes
pub const TX_BUFFER_SIZE: usize = 64;
pub const READ_CHUNK_SIZE: usize = 256;
pub const RX_BUFFER_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobotConfig {
    pub max_velocity: f32,
    pub max_angular_rate: f32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            max_velocity: MAX_VELOCITY,
            max_angular_rate: MAX_ANGULAR_RATE,
        }
    }
}

/// Top-level configuration file
///
/// ```json
/// {
///   "serial": { "port": "/dev/ttyACM0", "baud_rate": 115200 },
///   "robot": { "max_velocity": 0.3 }
/// }
/// ```
///
/// Missing sections and fields fall back to the constants above.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub serial: SerialConfig,
    pub robot: RobotConfig,
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.port.is_empty() {
            return Err(ConfigError::Invalid("serial.port is empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate must be > 0".to_string()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "serial.read_timeout_ms must be > 0".to_string(),
            ));
        }
        if !is_positive(self.robot.max_velocity) {
            return Err(ConfigError::Invalid(format!(
                "robot.max_velocity must be positive, got {}",
                self.robot.max_velocity
            )));
        }
        if !is_positive(self.robot.max_angular_rate) {
            return Err(ConfigError::Invalid(format!(
                "robot.max_angular_rate must be positive, got {}",
                self.robot.max_angular_rate
            )));
        }
        Ok(())
    }
}

// NaN is not positive
fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
