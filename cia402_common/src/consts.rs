//! System-wide constants for the spin workspace.
//!
//! Single source of truth for numeric limits and default bench timings.

/// Maximum number of devices in a device set.
pub const MAX_DEVICES: usize = 64;

/// Process-data image size in bytes.
pub const IO_MAP_SIZE: usize = 4096;

/// Default network interface.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Default master backend.
pub const DEFAULT_MASTER: &str = "simulation";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cia402/spin.toml";

/// Default target velocity magnitude (device units).
pub const DEFAULT_VELOCITY: i32 = 40960;

/// Default hold duration in milliseconds.
pub const DEFAULT_HOLD_MS: u64 = 5000;

/// Default service-data transaction timeout in milliseconds.
pub const DEFAULT_SDO_TIMEOUT_MS: u64 = 1000;

/// Default statusword wait timeout in milliseconds.
pub const DEFAULT_STATUS_TIMEOUT_MS: u64 = 2000;

/// Default statusword poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default bus state check timeout in milliseconds.
pub const DEFAULT_BUS_STATE_TIMEOUT_MS: u64 = 1000;

/// Default delay after SAFE_OP before requesting OPERATIONAL, in milliseconds.
pub const DEFAULT_SAFE_OP_SETTLE_MS: u64 = 1000;

/// Default number of OPERATIONAL checks before giving up.
pub const DEFAULT_OP_ATTEMPTS: u32 = 40;

/// Default delay between failed OPERATIONAL checks, in milliseconds.
pub const DEFAULT_OP_RETRY_DELAY_MS: u64 = 1;

/// Default pause between sequence steps, in microseconds.
pub const DEFAULT_STEP_DELAY_US: u64 = 100;

/// Default pause between devices, in microseconds.
pub const DEFAULT_DEVICE_DELAY_US: u64 = 1000;
