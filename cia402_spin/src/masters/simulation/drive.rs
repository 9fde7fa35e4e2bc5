//! Simulated CiA 402 drive.
//!
//! Implements the device side of the power-state machine and a minimal
//! object dictionary. A commanded transition becomes visible in the
//! statusword only after a configurable number of statusword reads, which
//! exercises the polling path of the sequencer.

use cia402_common::drive::{
    CONTROLWORD, Controlword, DeviceId, ERROR_CODE, MODES_OF_OPERATION, PowerState, STATUSWORD,
    Statusword, TARGET_VELOCITY,
};
use cia402_common::master::MasterError;
use tracing::{debug, trace};

/// Modes of operation display (INTEGER8).
pub const MODES_OF_OPERATION_DISPLAY: u16 = 0x6061;
/// Velocity actual value (INTEGER32).
pub const VELOCITY_ACTUAL: u16 = 0x606C;

/// Attempt to write a read-only object.
pub const ABORT_READ_ONLY: u32 = 0x0601_0002;
/// Object does not exist in the object dictionary.
pub const ABORT_NO_OBJECT: u32 = 0x0602_0000;
/// Data type does not match, length of service parameter does not match.
pub const ABORT_LENGTH: u32 = 0x0607_0010;
/// Sub-index does not exist.
pub const ABORT_NO_SUBINDEX: u32 = 0x0609_0011;

/// Transition waiting to become visible.
#[derive(Debug, Clone, Copy)]
struct Pending {
    target: PowerState,
    reads_left: u32,
}

/// One simulated drive.
#[derive(Debug, Clone)]
pub struct SimulatedDrive {
    id: DeviceId,
    state: PowerState,
    pending: Option<Pending>,
    settle_reads: u32,
    stuck: Option<PowerState>,
    controlword: u16,
    operation_mode: i8,
    target_velocity: i32,
    error_code: u16,
}

impl SimulatedDrive {
    /// Create a drive in switch-on-disabled.
    pub fn new(id: DeviceId, settle_reads: u32) -> Self {
        Self {
            id,
            state: PowerState::SwitchOnDisabled,
            pending: None,
            settle_reads,
            stuck: None,
            controlword: 0,
            operation_mode: 0,
            target_velocity: 0,
            error_code: 0,
        }
    }

    /// Never complete transitions into `state`.
    pub fn set_stuck(&mut self, state: PowerState) {
        self.stuck = Some(state);
    }

    /// Latch a fault with `error_code`.
    pub fn set_fault(&mut self, error_code: u16) {
        self.state = PowerState::Fault;
        self.pending = None;
        self.error_code = error_code;
    }

    /// Power state as currently visible in the statusword.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Statusword for the visible state.
    pub fn statusword(&self) -> u16 {
        let mut status = Statusword::from_bits_retain(self.state.statusword()) | Statusword::REMOTE;
        if matches!(
            self.state,
            PowerState::SwitchedOn | PowerState::OperationEnabled | PowerState::QuickStopActive
        ) {
            status |= Statusword::VOLTAGE_ENABLED;
        }
        if self.state == PowerState::OperationEnabled && self.target_velocity == 0 {
            status |= Statusword::TARGET_REACHED;
        }
        status.bits()
    }

    /// Last controlword written.
    pub fn controlword(&self) -> u16 {
        self.controlword
    }

    /// Last modes-of-operation value written.
    pub fn operation_mode(&self) -> i8 {
        self.operation_mode
    }

    /// Last target velocity written.
    pub fn target_velocity(&self) -> i32 {
        self.target_velocity
    }

    /// Velocity the motor is turning at.
    pub fn actual_velocity(&self) -> i32 {
        if self.state == PowerState::OperationEnabled {
            self.target_velocity
        } else {
            0
        }
    }

    /// Latched error code.
    pub fn error_code(&self) -> u16 {
        self.error_code
    }

    /// Read an object into `buf`, returning the object size.
    pub fn read_object(&mut self, index: u16, subindex: u8, buf: &mut [u8]) -> Result<usize, MasterError> {
        if subindex != 0 {
            return Err(MasterError::Abort(ABORT_NO_SUBINDEX));
        }
        let (bytes, len): ([u8; 4], usize) = match index {
            STATUSWORD => {
                self.settle();
                (widen(&self.statusword().to_le_bytes()), 2)
            }
            CONTROLWORD => (widen(&self.controlword.to_le_bytes()), 2),
            ERROR_CODE => (widen(&self.error_code.to_le_bytes()), 2),
            MODES_OF_OPERATION | MODES_OF_OPERATION_DISPLAY => {
                (widen(&self.operation_mode.to_le_bytes()), 1)
            }
            TARGET_VELOCITY => (self.target_velocity.to_le_bytes(), 4),
            VELOCITY_ACTUAL => (self.actual_velocity().to_le_bytes(), 4),
            _ => return Err(MasterError::Abort(ABORT_NO_OBJECT)),
        };
        if buf.len() < len {
            return Err(MasterError::Abort(ABORT_LENGTH));
        }
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    /// Write `data` to an object.
    pub fn write_object(&mut self, index: u16, subindex: u8, data: &[u8]) -> Result<(), MasterError> {
        if subindex != 0 {
            return Err(MasterError::Abort(ABORT_NO_SUBINDEX));
        }
        match index {
            CONTROLWORD => {
                let [lo, hi] = exact::<2>(data)?;
                self.apply_controlword(u16::from_le_bytes([lo, hi]));
            }
            MODES_OF_OPERATION => {
                let [mode] = exact::<1>(data)?;
                self.operation_mode = i8::from_le_bytes([mode]);
            }
            TARGET_VELOCITY => {
                self.target_velocity = i32::from_le_bytes(exact::<4>(data)?);
            }
            STATUSWORD | ERROR_CODE | MODES_OF_OPERATION_DISPLAY | VELOCITY_ACTUAL => {
                return Err(MasterError::Abort(ABORT_READ_ONLY));
            }
            _ => return Err(MasterError::Abort(ABORT_NO_OBJECT)),
        }
        Ok(())
    }

    fn apply_controlword(&mut self, cw: u16) {
        let rising_reset = cw & Controlword::FAULT_RESET.bits() != 0
            && self.controlword & Controlword::FAULT_RESET.bits() == 0;
        self.controlword = cw;

        let from = self.pending.map_or(self.state, |p| p.target);
        let target = if from == PowerState::Fault {
            if !rising_reset {
                return;
            }
            self.error_code = 0;
            PowerState::SwitchOnDisabled
        } else {
            match next_state(from, cw) {
                Some(next) => next,
                None => return,
            }
        };

        if self.stuck == Some(target) {
            debug!("Drive {}: transition to {} suppressed", self.id, target);
            return;
        }

        trace!("Drive {}: cw 0x{:04X}, {} -> {}", self.id, cw, from, target);
        if self.settle_reads == 0 {
            self.state = target;
            self.pending = None;
        } else {
            self.pending = Some(Pending {
                target,
                reads_left: self.settle_reads,
            });
        }
    }

    fn settle(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.reads_left = pending.reads_left.saturating_sub(1);
            if pending.reads_left == 0 {
                self.state = pending.target;
                self.pending = None;
            }
        }
    }
}

/// Device-side transition for a controlword, `None` if it has no effect.
fn next_state(from: PowerState, cw: u16) -> Option<PowerState> {
    use PowerState::*;

    let next = if cw & 0x0082 == 0x0000 {
        // Disable voltage.
        match from {
            ReadyToSwitchOn | SwitchedOn | OperationEnabled | QuickStopActive => SwitchOnDisabled,
            _ => return None,
        }
    } else if cw & 0x0086 == 0x0002 {
        // Quick stop.
        match from {
            ReadyToSwitchOn | SwitchedOn => SwitchOnDisabled,
            OperationEnabled => QuickStopActive,
            _ => return None,
        }
    } else if cw & 0x0087 == 0x0006 {
        match from {
            SwitchOnDisabled | SwitchedOn | OperationEnabled => ReadyToSwitchOn,
            _ => return None,
        }
    } else if cw & 0x008F == 0x0007 {
        match from {
            ReadyToSwitchOn | OperationEnabled => SwitchedOn,
            _ => return None,
        }
    } else if cw & 0x008F == 0x000F {
        match from {
            SwitchedOn | QuickStopActive => OperationEnabled,
            _ => return None,
        }
    } else {
        return None;
    };

    (next != from).then_some(next)
}

fn exact<const N: usize>(data: &[u8]) -> Result<[u8; N], MasterError> {
    data.try_into().map_err(|_| MasterError::Abort(ABORT_LENGTH))
}

fn widen(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[..bytes.len()].copy_from_slice(bytes);
    out
}
