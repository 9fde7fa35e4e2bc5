//! Prelude module for common re-exports.
//!
//! ```rust
//! use cia402_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, DeviceSet, FailurePolicy, LogLevel, Polarity, PolarityTable,
    SpinConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{IO_MAP_SIZE, MAX_DEVICES};

// ─── Drive Profile ──────────────────────────────────────────────────
pub use crate::drive::{
    Controlword, DeviceId, OperationMode, PowerState, StatusCondition, Statusword,
};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{DriveError, DriveStep, Phase, SessionError, StepError};

// ─── Fieldbus Master ────────────────────────────────────────────────
pub use crate::master::{BusState, DeviceBusStatus, FieldbusMaster, IoMap, MasterError};
