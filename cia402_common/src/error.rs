//! Error types for drive sequencing and session orchestration.
//!
//! Errors are layered the way they propagate:
//! - `DriveError` - raised by the object dictionary client, status poller and bus adapter
//! - `StepError` - a `DriveError` tagged with the device and the sequence step
//! - `SessionError` - the first failure of a run, tagged with the phase

use crate::drive::{DeviceId, PowerState, StatusCondition};
use crate::master::{BusState, MasterError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Core error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriveError {
    /// Transport failure or malformed response from the master.
    #[error("Communication error on device {device} at 0x{index:04X}:{subindex:02X}: {source}")]
    Comm {
        /// Addressed device.
        device: DeviceId,
        /// Object index.
        index: u16,
        /// Object sub-index.
        subindex: u8,
        /// Master failure.
        #[source]
        source: MasterError,
    },

    /// Returned object size differs from the requested value size.
    #[error(
        "Size mismatch on device {device} at 0x{index:04X}:{subindex:02X}: expected {expected} bytes, got {actual}"
    )]
    SizeMismatch {
        /// Addressed device.
        device: DeviceId,
        /// Object index.
        index: u16,
        /// Object sub-index.
        subindex: u8,
        /// Expected byte count.
        expected: usize,
        /// Byte count delivered by the device.
        actual: usize,
    },

    /// Statusword condition not met before the deadline.
    #[error("Timeout after {timeout:?} on device {device} waiting for {condition}, last status 0x{last_status:04X}")]
    StatusTimeout {
        /// Polled device.
        device: DeviceId,
        /// Awaited condition.
        condition: StatusCondition,
        /// Last statusword observed.
        last_status: u16,
        /// Wait deadline.
        timeout: Duration,
    },

    /// Bus did not reach the requested state.
    #[error("Bus did not reach {target} after {attempts} attempt(s), achieved {achieved}")]
    BusTimeout {
        /// Requested state.
        target: BusState,
        /// Lowest state reported on the final check.
        achieved: BusState,
        /// Number of checks performed.
        attempts: u32,
    },

    /// Fewer devices on the bus than the device set needs.
    #[error("Insufficient topology: found {found} device(s), need {required}")]
    InsufficientTopology {
        /// Devices enumerated by the master.
        found: usize,
        /// Highest device id in the device set.
        required: usize,
    },

    /// Device is in a state from which the requested sequence is undefined.
    #[error("Device {device} in indeterminate state '{state}' (statusword 0x{status:04X})")]
    UnexpectedState {
        /// Offending device.
        device: DeviceId,
        /// Decoded state.
        state: PowerState,
        /// Raw statusword.
        status: u16,
    },

    /// Bus-level request rejected by the master.
    #[error("Bus request failed: {0}")]
    Bus(#[source] MasterError),

    /// Bus connection could not be opened.
    #[error("Failed to open bus: {0}")]
    Open(#[source] MasterError),

    /// Requested master backend is not registered.
    #[error("Master backend not found: {0}")]
    MasterNotFound(String),
}

/// Named step of a drive sequence or motion phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveStep {
    /// Initial statusword read before the first controlword write.
    ReadStatus,
    /// Fault reset (controlword 0x0080).
    FaultReset,
    /// Shutdown (controlword 0x0006) → ready to switch on.
    Shutdown,
    /// Modes of operation write.
    SetOperationMode,
    /// Switch on (controlword 0x0007) → switched on.
    SwitchOn,
    /// Enable operation (controlword 0x000F) → operation enabled.
    EnableOperation,
    /// Disable operation (controlword 0x0007) → switched on.
    DisableOperation,
    /// Non-zero target velocity write.
    ApplyVelocity,
    /// Zero target velocity write.
    StopVelocity,
}

impl fmt::Display for DriveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadStatus => "read status",
            Self::FaultReset => "fault reset",
            Self::Shutdown => "shutdown",
            Self::SetOperationMode => "set operation mode",
            Self::SwitchOn => "switch on",
            Self::EnableOperation => "enable operation",
            Self::DisableOperation => "disable operation",
            Self::ApplyVelocity => "apply velocity",
            Self::StopVelocity => "stop velocity",
        };
        f.write_str(name)
    }
}

/// A `DriveError` tagged with the device and step that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Device {device} failed at step '{step}': {source}")]
pub struct StepError {
    /// Failing device.
    pub device: DeviceId,
    /// Failing step.
    pub step: DriveStep,
    /// Underlying error.
    #[source]
    pub source: DriveError,
}

impl StepError {
    /// Tag `source` with device and step.
    pub fn new(device: DeviceId, step: DriveStep, source: DriveError) -> Self {
        Self {
            device,
            step,
            source,
        }
    }
}

/// Phase of a synchronized motion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Open bus and verify topology.
    Open,
    /// Bus-wide SAFE_OP / OPERATIONAL transitions.
    BusBringUp,
    /// Forward sequence for every device.
    Enable,
    /// Target velocity for every device.
    ApplyVelocity,
    /// Zero velocity for every device.
    Stop,
    /// Reverse sequence for every device.
    Disable,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::BusBringUp => "bus bring-up",
            Self::Enable => "enable",
            Self::ApplyVelocity => "apply velocity",
            Self::Stop => "stop",
            Self::Disable => "disable",
        };
        f.write_str(name)
    }
}

/// First failure of a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Failure not attributable to a single device.
    #[error("Phase '{phase}' failed: {source}")]
    Bus {
        /// Failing phase.
        phase: Phase,
        /// Underlying error.
        #[source]
        source: DriveError,
    },

    /// Failure of one device step.
    #[error("Phase '{phase}' failed: {source}")]
    Device {
        /// Failing phase.
        phase: Phase,
        /// Tagged device error.
        #[source]
        source: StepError,
    },
}

impl SessionError {
    /// Phase in which the failure occurred.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Bus { phase, .. } | Self::Device { phase, .. } => *phase,
        }
    }

    /// Failing device, if the failure is device-specific.
    pub fn device(&self) -> Option<DeviceId> {
        match self {
            Self::Bus { .. } => None,
            Self::Device { source, .. } => Some(source.device),
        }
    }

    /// Failing step, if the failure is device-specific.
    pub fn step(&self) -> Option<DriveStep> {
        match self {
            Self::Bus { .. } => None,
            Self::Device { source, .. } => Some(source.step),
        }
    }

    /// Underlying core error.
    pub fn drive_error(&self) -> &DriveError {
        match self {
            Self::Bus { source, .. } => source,
            Self::Device { source, .. } => &source.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_names_device_and_step() {
        let err = StepError::new(
            2,
            DriveStep::SwitchOn,
            DriveError::StatusTimeout {
                device: 2,
                condition: StatusCondition::new(0x6F, 0x23),
                last_status: 0x0231,
                timeout: Duration::from_millis(2000),
            },
        );
        let text = err.to_string();
        assert!(text.contains("Device 2"));
        assert!(text.contains("switch on"));
        assert!(text.contains("0x0231"));
    }

    #[test]
    fn session_error_accessors() {
        let err = SessionError::Device {
            phase: Phase::Enable,
            source: StepError::new(
                1,
                DriveStep::Shutdown,
                DriveError::Comm {
                    device: 1,
                    index: 0x6040,
                    subindex: 0,
                    source: MasterError::Timeout(Duration::from_millis(1000)),
                },
            ),
        };
        assert_eq!(err.phase(), Phase::Enable);
        assert_eq!(err.device(), Some(1));
        assert_eq!(err.step(), Some(DriveStep::Shutdown));
        assert!(matches!(err.drive_error(), DriveError::Comm { index: 0x6040, .. }));

        let err = SessionError::Bus {
            phase: Phase::BusBringUp,
            source: DriveError::BusTimeout {
                target: BusState::Operational,
                achieved: BusState::SafeOp,
                attempts: 40,
            },
        };
        assert_eq!(err.device(), None);
        assert_eq!(err.step(), None);
        assert!(err.to_string().contains("OPERATIONAL"));
    }
}
