//! Configuration loading traits and types.
//!
//! This module provides the TOML configuration of a spin run and a
//! standardized way to load it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use cia402_common::config::{ConfigLoader, ConfigError, SpinConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = SpinConfig::load(Path::new("spin.toml"))?;
//!     config.validate()?;
//!     println!("Devices: {:?}", config.motion.devices.ids());
//!     Ok(())
//! }
//! ```

use crate::consts::*;
use crate::drive::{DeviceId, OperationMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
///
/// This enum represents all possible errors that can occur when loading
/// configuration files.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn default_service_name() -> String {
    "cia402_spin".to_string()
}

/// Common fields shared by every application of the workspace.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "spin-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Device Set ─────────────────────────────────────────────────────

/// Ordered, fixed-capacity list of the device ids a run controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceSet(heapless::Vec<DeviceId, MAX_DEVICES>);

impl DeviceSet {
    /// Build and validate a device set.
    pub fn new(ids: &[DeviceId]) -> Result<Self, ConfigError> {
        let mut set = heapless::Vec::new();
        for &id in ids {
            set.push(id).map_err(|_| {
                ConfigError::ValidationError(format!(
                    "Too many devices: {} (max {})",
                    ids.len(),
                    MAX_DEVICES
                ))
            })?;
        }
        let set = Self(set);
        set.validate()?;
        Ok(set)
    }

    /// Device ids in configured order.
    pub fn ids(&self) -> &[DeviceId] {
        &self.0
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest device id, which bounds the required bus topology.
    pub fn max_id(&self) -> Option<DeviceId> {
        self.0.iter().copied().max()
    }

    /// Validate the set.
    ///
    /// # Validation Rules
    /// 1. At least one device
    /// 2. Ids start at 1 (bus positions are 1-based)
    /// 3. No duplicates
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            return Err(ConfigError::ValidationError(
                "device set cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for &id in self.0.iter() {
            if id == 0 {
                return Err(ConfigError::ValidationError(
                    "device id 0 is invalid (ids are 1-based)".to_string(),
                ));
            }
            if !seen.insert(id) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate device id: {id}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for DeviceSet {
    fn default() -> Self {
        let mut set = heapless::Vec::new();
        for id in 1..=4 {
            let _ = set.push(id);
        }
        Self(set)
    }
}

// ─── Polarity ───────────────────────────────────────────────────────

/// Rotation direction applied to the velocity magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Magnitude as configured.
    #[default]
    Positive,
    /// Magnitude negated.
    Negative,
}

impl Polarity {
    /// Sign multiplier.
    pub const fn sign(self) -> i32 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    /// Signed velocity for a non-negative magnitude.
    pub const fn apply(self, magnitude: i32) -> i32 {
        magnitude * self.sign()
    }
}

/// Polarity of a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolarityOverride {
    /// Device id.
    pub device: DeviceId,
    /// Direction for this device.
    pub polarity: Polarity,
}

fn default_polarity() -> Polarity {
    Polarity::Negative
}

/// Per-device direction policy.
///
/// # TOML Example
///
/// ```toml
/// [motion.polarity]
/// default = "negative"
/// overrides = [{ device = 1, polarity = "positive" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolarityTable {
    /// Direction for devices without an override.
    #[serde(default = "default_polarity")]
    pub default: Polarity,

    /// Explicit per-device directions.
    #[serde(default)]
    pub overrides: Vec<PolarityOverride>,
}

impl PolarityTable {
    /// Direction for `device`.
    pub fn polarity(&self, device: DeviceId) -> Polarity {
        self.overrides
            .iter()
            .find(|o| o.device == device)
            .map(|o| o.polarity)
            .unwrap_or(self.default)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for o in &self.overrides {
            if !seen.insert(o.device) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate polarity override for device {}",
                    o.device
                )));
            }
        }
        Ok(())
    }
}

impl Default for PolarityTable {
    /// Device 1 positive, every other device negative.
    fn default() -> Self {
        Self {
            default: Polarity::Negative,
            overrides: vec![PolarityOverride {
                device: 1,
                polarity: Polarity::Positive,
            }],
        }
    }
}

// ─── Sections ───────────────────────────────────────────────────────

fn default_interface() -> String {
    DEFAULT_INTERFACE.to_string()
}

fn default_master() -> String {
    DEFAULT_MASTER.to_string()
}

fn default_bus_state_timeout_ms() -> u64 {
    DEFAULT_BUS_STATE_TIMEOUT_MS
}

fn default_safe_op_settle_ms() -> u64 {
    DEFAULT_SAFE_OP_SETTLE_MS
}

fn default_op_attempts() -> u32 {
    DEFAULT_OP_ATTEMPTS
}

fn default_op_retry_delay_ms() -> u64 {
    DEFAULT_OP_RETRY_DELAY_MS
}

/// `[bus]` section: master backend and bus-level bring-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Network interface the master opens.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Master backend name (see the master registry).
    #[serde(default = "default_master")]
    pub master: String,

    /// Timeout of a single bus state check.
    #[serde(default = "default_bus_state_timeout_ms")]
    pub state_timeout_ms: u64,

    /// Pause after SAFE_OP is reached.
    #[serde(default = "default_safe_op_settle_ms")]
    pub safe_op_settle_ms: u64,

    /// Number of OPERATIONAL checks before the run fails.
    #[serde(default = "default_op_attempts")]
    pub op_attempts: u32,

    /// Pause after a failed OPERATIONAL check.
    #[serde(default = "default_op_retry_delay_ms")]
    pub op_retry_delay_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            master: default_master(),
            state_timeout_ms: DEFAULT_BUS_STATE_TIMEOUT_MS,
            safe_op_settle_ms: DEFAULT_SAFE_OP_SETTLE_MS,
            op_attempts: DEFAULT_OP_ATTEMPTS,
            op_retry_delay_ms: DEFAULT_OP_RETRY_DELAY_MS,
        }
    }
}

impl BusConfig {
    /// Bus state check timeout.
    pub fn state_timeout(&self) -> Duration {
        Duration::from_millis(self.state_timeout_ms)
    }

    /// SAFE_OP settle delay.
    pub fn safe_op_settle(&self) -> Duration {
        Duration::from_millis(self.safe_op_settle_ms)
    }

    /// Delay between OPERATIONAL checks.
    pub fn op_retry_delay(&self) -> Duration {
        Duration::from_millis(self.op_retry_delay_ms)
    }
}

fn default_velocity() -> i32 {
    DEFAULT_VELOCITY
}

fn default_hold_ms() -> u64 {
    DEFAULT_HOLD_MS
}

/// `[motion]` section: which devices move, how fast, and for how long.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Devices to control, in sequencing order.
    #[serde(default)]
    pub devices: DeviceSet,

    /// Target velocity magnitude, identical for every device.
    #[serde(default = "default_velocity")]
    pub velocity: i32,

    /// Hold duration between velocity application and stop.
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    /// Mode written to 0x6060 during enable.
    #[serde(default)]
    pub operation_mode: OperationMode,

    /// Direction policy.
    #[serde(default)]
    pub polarity: PolarityTable,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            devices: DeviceSet::default(),
            velocity: DEFAULT_VELOCITY,
            hold_ms: DEFAULT_HOLD_MS,
            operation_mode: OperationMode::default(),
            polarity: PolarityTable::default(),
        }
    }
}

impl MotionConfig {
    /// Signed target velocity for `device`.
    pub fn target_velocity(&self, device: DeviceId) -> i32 {
        self.polarity.polarity(device).apply(self.velocity)
    }

    /// Hold duration.
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

fn default_sdo_timeout_ms() -> u64 {
    DEFAULT_SDO_TIMEOUT_MS
}

fn default_status_timeout_ms() -> u64 {
    DEFAULT_STATUS_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_step_delay_us() -> u64 {
    DEFAULT_STEP_DELAY_US
}

fn default_device_delay_us() -> u64 {
    DEFAULT_DEVICE_DELAY_US
}

/// `[timing]` section: per-operation timeouts and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Service-data transaction timeout.
    #[serde(default = "default_sdo_timeout_ms")]
    pub sdo_timeout_ms: u64,

    /// Statusword wait timeout per transition.
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,

    /// Statusword poll interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause before each sequence step.
    #[serde(default = "default_step_delay_us")]
    pub step_delay_us: u64,

    /// Pause before each device of a phase.
    #[serde(default = "default_device_delay_us")]
    pub device_delay_us: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sdo_timeout_ms: DEFAULT_SDO_TIMEOUT_MS,
            status_timeout_ms: DEFAULT_STATUS_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            step_delay_us: DEFAULT_STEP_DELAY_US,
            device_delay_us: DEFAULT_DEVICE_DELAY_US,
        }
    }
}

impl TimingConfig {
    /// Service-data transaction timeout.
    pub fn sdo_timeout(&self) -> Duration {
        Duration::from_millis(self.sdo_timeout_ms)
    }

    /// Statusword wait timeout.
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    /// Statusword poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Inter-step pause.
    pub fn step_delay(&self) -> Duration {
        Duration::from_micros(self.step_delay_us)
    }

    /// Inter-device pause.
    pub fn device_delay(&self) -> Duration {
        Duration::from_micros(self.device_delay_us)
    }
}

/// What to do with the devices when a run fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// No further device traffic; only release the bus.
    CloseOnly,
    /// Zero commanded velocities and disable enabled devices, then release the bus.
    #[default]
    DisableEnabled,
}

/// `[safety]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyConfig {
    /// Cleanup policy after the first failure.
    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Clear a latched drive fault before the enable sequence.
    #[serde(default)]
    pub reset_faults: bool,
}

fn default_settle_reads() -> u32 {
    2
}

/// `[simulation]` section, read by the simulation master only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Simulated device count. Defaults to the highest id in the device set.
    #[serde(default)]
    pub device_count: Option<usize>,

    /// Statusword reads before a commanded transition becomes visible.
    #[serde(default = "default_settle_reads")]
    pub settle_reads: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            device_count: None,
            settle_reads: default_settle_reads(),
        }
    }
}

// ─── Root ───────────────────────────────────────────────────────────

/// Complete configuration of a spin run (`spin.toml`).
///
/// Every section is optional; defaults match the four-drive bench setup
/// (four devices on eth0, 40960 for five seconds, device 1 forward).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpinConfig {
    /// Shared application settings.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Bus and master backend.
    #[serde(default)]
    pub bus: BusConfig,

    /// Motion profile.
    #[serde(default)]
    pub motion: MotionConfig,

    /// Timeouts and pacing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Failure handling.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Simulation backend.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl SpinConfig {
    /// Validate the configuration.
    ///
    /// # Validation Rules
    /// 1. Shared config valid
    /// 2. Device set valid (non-empty, 1-based, no duplicates)
    /// 3. Velocity magnitude >= 0 (direction comes from polarity only)
    /// 4. Interface and master names non-empty
    /// 5. SDO, status, bus-state timeouts and poll interval > 0
    /// 6. `op_attempts` > 0
    /// 7. No duplicate polarity overrides
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.motion.devices.validate()?;
        self.motion.polarity.validate()?;

        if self.motion.velocity < 0 {
            return Err(ConfigError::ValidationError(format!(
                "velocity magnitude must be >= 0, got {}",
                self.motion.velocity
            )));
        }
        if self.bus.interface.is_empty() {
            return Err(ConfigError::ValidationError(
                "bus.interface cannot be empty".to_string(),
            ));
        }
        if self.bus.master.is_empty() {
            return Err(ConfigError::ValidationError(
                "bus.master cannot be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("timing.sdo_timeout_ms", self.timing.sdo_timeout_ms),
            ("timing.status_timeout_ms", self.timing.status_timeout_ms),
            ("timing.poll_interval_ms", self.timing.poll_interval_ms),
            ("bus.state_timeout_ms", self.bus.state_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        if self.bus.op_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "bus.op_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"")
                .unwrap()
                .level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"error\"")
                .unwrap()
                .level,
            LogLevel::Error
        );
    }

    #[test]
    fn defaults_match_four_drive_bench() {
        let config = SpinConfig::from_toml("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.bus.interface, "eth0");
        assert_eq!(config.motion.devices.ids(), &[1, 2, 3, 4]);
        assert_eq!(config.motion.velocity, 40960);
        assert_eq!(config.motion.hold(), Duration::from_secs(5));
        assert_eq!(config.timing.status_timeout(), Duration::from_millis(2000));
        assert_eq!(config.timing.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.bus.op_attempts, 40);
        assert_eq!(config.safety.on_failure, FailurePolicy::DisableEnabled);
        assert!(!config.safety.reset_faults);
    }

    #[test]
    fn default_polarity_first_device_forward_others_reversed() {
        let motion = MotionConfig::default();
        assert_eq!(motion.target_velocity(1), 40960);
        assert_eq!(motion.target_velocity(2), -40960);
        assert_eq!(motion.target_velocity(3), -40960);
        assert_eq!(motion.target_velocity(4), -40960);
    }

    #[test]
    fn polarity_table_from_toml() {
        let config = SpinConfig::from_toml(
            r#"
[motion]
devices = [3, 1]
velocity = 1000

[motion.polarity]
default = "positive"
overrides = [{ device = 3, polarity = "negative" }]
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.motion.devices.ids(), &[3, 1]);
        assert_eq!(config.motion.target_velocity(1), 1000);
        assert_eq!(config.motion.target_velocity(3), -1000);
    }

    #[test]
    fn device_set_rejects_zero_and_duplicates() {
        assert!(matches!(
            DeviceSet::new(&[1, 0]),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            DeviceSet::new(&[1, 2, 1]),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            DeviceSet::new(&[]),
            Err(ConfigError::ValidationError(_))
        ));
        let set = DeviceSet::new(&[2, 5, 1]).unwrap();
        assert_eq!(set.max_id(), Some(5));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn device_set_capacity_is_bounded() {
        let ids: Vec<DeviceId> = (1..=(MAX_DEVICES as DeviceId + 1)).collect();
        assert!(matches!(
            DeviceSet::new(&ids),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = SpinConfig::default();
        config.motion.velocity = -1;
        assert!(config.validate().is_err());

        let mut config = SpinConfig::default();
        config.timing.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SpinConfig::default();
        config.bus.op_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = SpinConfig::default();
        config.motion.polarity.overrides.push(PolarityOverride {
            device: 1,
            polarity: Polarity::Negative,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = SpinConfig::from_toml("[motion]\nspeed = 5\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = SpinConfig::load(Path::new("/nonexistent/path/spin.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = SpinConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_loader_success() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[shared]
log_level = "debug"
service_name = "bench-01"

[bus]
interface = "enp3s0"
op_attempts = 5

[safety]
on_failure = "close_only"
reset_faults = true
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = SpinConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.shared.service_name, "bench-01");
        assert_eq!(config.bus.interface, "enp3s0");
        assert_eq!(config.bus.op_attempts, 5);
        assert_eq!(config.bus.master, "simulation");
        assert_eq!(config.safety.on_failure, FailurePolicy::CloseOnly);
        assert!(config.safety.reset_faults);
    }
}
