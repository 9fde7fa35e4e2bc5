//! CiA 402 drive profile types.
//!
//! This module defines:
//! - Object dictionary addresses used by the sequencer
//! - `Controlword` / `Statusword` bitflags
//! - `PowerState` - decoded CiA 402 power state
//! - `StatusCondition` - (mask, expected) pair gating each transition
//! - `OperationMode` - modes-of-operation values (object 0x6060)

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device position on the bus (1-based, as enumerated by the master).
pub type DeviceId = u16;

// ─── Object Dictionary Addresses ────────────────────────────────────

/// Error code (UNSIGNED16).
pub const ERROR_CODE: u16 = 0x603F;
/// Controlword (UNSIGNED16).
pub const CONTROLWORD: u16 = 0x6040;
/// Statusword (UNSIGNED16).
pub const STATUSWORD: u16 = 0x6041;
/// Modes of operation (INTEGER8).
pub const MODES_OF_OPERATION: u16 = 0x6060;
/// Target velocity (INTEGER32).
pub const TARGET_VELOCITY: u16 = 0x60FF;

// ─── Controlword ────────────────────────────────────────────────────

bitflags! {
    /// Controlword bits (object 0x6040).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Controlword: u16 {
        /// Bit 0: switch on.
        const SWITCH_ON        = 0x0001;
        /// Bit 1: enable voltage.
        const ENABLE_VOLTAGE   = 0x0002;
        /// Bit 2: quick stop (active low).
        const QUICK_STOP       = 0x0004;
        /// Bit 3: enable operation.
        const ENABLE_OPERATION = 0x0008;
        /// Bit 7: fault reset (rising edge).
        const FAULT_RESET      = 0x0080;
        /// Bit 8: halt.
        const HALT             = 0x0100;
    }
}

impl Controlword {
    /// Shutdown command (0x0006): → Ready to Switch On.
    pub const SHUTDOWN: Self = Self::from_bits_truncate(
        Self::ENABLE_VOLTAGE.bits() | Self::QUICK_STOP.bits(),
    );

    /// Switch On command (0x0007): → Switched On.
    pub const CMD_SWITCH_ON: Self = Self::from_bits_truncate(
        Self::SWITCH_ON.bits() | Self::ENABLE_VOLTAGE.bits() | Self::QUICK_STOP.bits(),
    );

    /// Enable Operation command (0x000F): → Operation Enabled.
    pub const CMD_ENABLE_OPERATION: Self = Self::from_bits_truncate(
        Self::CMD_SWITCH_ON.bits() | Self::ENABLE_OPERATION.bits(),
    );

    /// Disable Operation command (0x0007): Operation Enabled → Switched On.
    pub const CMD_DISABLE_OPERATION: Self = Self::CMD_SWITCH_ON;

    /// Fault Reset command (0x0080): Fault → Switch On Disabled.
    pub const CMD_FAULT_RESET: Self = Self::FAULT_RESET;
}

// ─── Statusword ─────────────────────────────────────────────────────

bitflags! {
    /// Statusword bits (object 0x6041).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Statusword: u16 {
        /// Bit 0: ready to switch on.
        const READY_TO_SWITCH_ON = 0x0001;
        /// Bit 1: switched on.
        const SWITCHED_ON        = 0x0002;
        /// Bit 2: operation enabled.
        const OPERATION_ENABLED  = 0x0004;
        /// Bit 3: fault.
        const FAULT              = 0x0008;
        /// Bit 4: voltage enabled.
        const VOLTAGE_ENABLED    = 0x0010;
        /// Bit 5: quick stop (active low).
        const QUICK_STOP         = 0x0020;
        /// Bit 6: switch on disabled.
        const SWITCH_ON_DISABLED = 0x0040;
        /// Bit 7: warning.
        const WARNING            = 0x0080;
        /// Bit 9: remote.
        const REMOTE             = 0x0200;
        /// Bit 10: target reached.
        const TARGET_REACHED     = 0x0400;
        /// Bit 11: internal limit active.
        const INTERNAL_LIMIT     = 0x0800;
    }
}

/// Mask selecting the state bits where quick-stop is significant.
pub const STATE_MASK: u16 = 0x006F;

/// Mask selecting the state bits where quick-stop is don't-care.
pub const STATE_MASK_NO_QS: u16 = 0x004F;

// ─── Power State ────────────────────────────────────────────────────

/// CiA 402 power state as decoded from the statusword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Low-level power applied, drive initializing.
    NotReadyToSwitchOn,
    /// Drive initialized, high voltage may be applied.
    SwitchOnDisabled,
    /// High voltage may be applied, drive function disabled.
    ReadyToSwitchOn,
    /// High voltage applied, drive function disabled.
    SwitchedOn,
    /// Drive function enabled, power applied to the motor.
    OperationEnabled,
    /// Quick stop function being executed.
    QuickStopActive,
    /// Fault reaction being executed.
    FaultReactionActive,
    /// Fault occurred.
    Fault,
    /// Statusword does not match any defined state pattern.
    Unknown,
}

impl PowerState {
    /// Decode the power state from a raw statusword.
    pub const fn from_statusword(status: u16) -> Self {
        match status & STATE_MASK_NO_QS {
            0x0000 => return Self::NotReadyToSwitchOn,
            0x0040 => return Self::SwitchOnDisabled,
            0x000F => return Self::FaultReactionActive,
            0x0008 => return Self::Fault,
            _ => {}
        }
        match status & STATE_MASK {
            0x0021 => Self::ReadyToSwitchOn,
            0x0023 => Self::SwitchedOn,
            0x0027 => Self::OperationEnabled,
            0x0007 => Self::QuickStopActive,
            _ => Self::Unknown,
        }
    }

    /// Statusword condition that identifies this state.
    ///
    /// Returns `None` for `Unknown`.
    pub const fn condition(self) -> Option<StatusCondition> {
        let cond = match self {
            Self::NotReadyToSwitchOn => StatusCondition::new(STATE_MASK_NO_QS, 0x0000),
            Self::SwitchOnDisabled => StatusCondition::SWITCH_ON_DISABLED,
            Self::ReadyToSwitchOn => StatusCondition::READY_TO_SWITCH_ON,
            Self::SwitchedOn => StatusCondition::SWITCHED_ON,
            Self::OperationEnabled => StatusCondition::OPERATION_ENABLED,
            Self::QuickStopActive => StatusCondition::new(STATE_MASK, 0x0007),
            Self::FaultReactionActive => StatusCondition::new(STATE_MASK_NO_QS, 0x000F),
            Self::Fault => StatusCondition::new(STATE_MASK_NO_QS, 0x0008),
            Self::Unknown => return None,
        };
        Some(cond)
    }

    /// Canonical statusword for this state (voltage and remote bits clear).
    pub const fn statusword(self) -> u16 {
        match self.condition() {
            Some(cond) => cond.expected,
            None => 0,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotReadyToSwitchOn => "not ready to switch on",
            Self::SwitchOnDisabled => "switch on disabled",
            Self::ReadyToSwitchOn => "ready to switch on",
            Self::SwitchedOn => "switched on",
            Self::OperationEnabled => "operation enabled",
            Self::QuickStopActive => "quick stop active",
            Self::FaultReactionActive => "fault reaction active",
            Self::Fault => "fault",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// ─── Status Condition ───────────────────────────────────────────────

/// A `(status & mask) == expected` predicate on the statusword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCondition {
    /// Bits that are compared.
    pub mask: u16,
    /// Required value of the masked bits.
    pub expected: u16,
}

impl StatusCondition {
    /// Switch on disabled: `0x4F == 0x40`.
    pub const SWITCH_ON_DISABLED: Self = Self::new(STATE_MASK_NO_QS, 0x0040);
    /// Ready to switch on: `0x6F == 0x21`.
    pub const READY_TO_SWITCH_ON: Self = Self::new(STATE_MASK, 0x0021);
    /// Switched on: `0x6F == 0x23`.
    pub const SWITCHED_ON: Self = Self::new(STATE_MASK, 0x0023);
    /// Operation enabled: `0x6F == 0x27`.
    pub const OPERATION_ENABLED: Self = Self::new(STATE_MASK, 0x0027);

    /// Create a new condition.
    pub const fn new(mask: u16, expected: u16) -> Self {
        Self { mask, expected }
    }

    /// Returns true if `status` satisfies the condition.
    #[inline]
    pub const fn is_met(&self, status: u16) -> bool {
        status & self.mask == self.expected
    }
}

impl fmt::Display for StatusCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(status & 0x{:04X}) == 0x{:04X}", self.mask, self.expected)
    }
}

// ─── Modes of Operation ─────────────────────────────────────────────

/// Modes of operation (object 0x6060).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum OperationMode {
    /// Profile position mode.
    ProfilePosition = 1,
    /// Velocity mode.
    Velocity = 2,
    /// Profile velocity mode.
    #[default]
    ProfileVelocity = 3,
    /// Profile torque mode.
    ProfileTorque = 4,
    /// Homing mode.
    Homing = 6,
    /// Cyclic synchronous position.
    CyclicSyncPosition = 8,
    /// Cyclic synchronous velocity.
    CyclicSyncVelocity = 9,
    /// Cyclic synchronous torque.
    CyclicSyncTorque = 10,
}

impl OperationMode {
    /// Raw object value.
    #[inline]
    pub const fn as_i8(self) -> i8 {
        self as i8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controlword_commands_match_cia402() {
        assert_eq!(Controlword::SHUTDOWN.bits(), 0x0006);
        assert_eq!(Controlword::CMD_SWITCH_ON.bits(), 0x0007);
        assert_eq!(Controlword::CMD_ENABLE_OPERATION.bits(), 0x000F);
        assert_eq!(Controlword::CMD_DISABLE_OPERATION.bits(), 0x0007);
        assert_eq!(Controlword::CMD_FAULT_RESET.bits(), 0x0080);
    }

    #[test]
    fn decode_power_states() {
        assert_eq!(PowerState::from_statusword(0x0250), PowerState::SwitchOnDisabled);
        assert_eq!(PowerState::from_statusword(0x0231), PowerState::ReadyToSwitchOn);
        assert_eq!(PowerState::from_statusword(0x0233), PowerState::SwitchedOn);
        assert_eq!(PowerState::from_statusword(0x0637), PowerState::OperationEnabled);
        assert_eq!(PowerState::from_statusword(0x0017), PowerState::QuickStopActive);
        assert_eq!(PowerState::from_statusword(0x0218), PowerState::Fault);
        assert_eq!(PowerState::from_statusword(0x001F), PowerState::FaultReactionActive);
        assert_eq!(PowerState::from_statusword(0x0000), PowerState::NotReadyToSwitchOn);
    }

    #[test]
    fn warning_bit_outside_mask_is_ignored() {
        let status = PowerState::OperationEnabled.statusword() | Statusword::WARNING.bits();
        assert_eq!(PowerState::from_statusword(status), PowerState::OperationEnabled);
    }

    #[test]
    fn undefined_pattern_is_unknown() {
        // Ready-to-switch-on bit without quick-stop bit has no defined state.
        assert_eq!(PowerState::from_statusword(0x0001), PowerState::Unknown);
        assert!(PowerState::Unknown.condition().is_none());
    }

    #[test]
    fn canonical_statusword_round_trips() {
        for state in [
            PowerState::NotReadyToSwitchOn,
            PowerState::SwitchOnDisabled,
            PowerState::ReadyToSwitchOn,
            PowerState::SwitchedOn,
            PowerState::OperationEnabled,
            PowerState::QuickStopActive,
            PowerState::FaultReactionActive,
            PowerState::Fault,
        ] {
            assert_eq!(PowerState::from_statusword(state.statusword()), state);
        }
    }

    #[test]
    fn transition_conditions() {
        let rtso = PowerState::ReadyToSwitchOn.condition().unwrap();
        assert_eq!((rtso.mask, rtso.expected), (0x6F, 0x21));
        let so = PowerState::SwitchedOn.condition().unwrap();
        assert_eq!((so.mask, so.expected), (0x6F, 0x23));
        let oe = PowerState::OperationEnabled.condition().unwrap();
        assert_eq!((oe.mask, oe.expected), (0x6F, 0x27));
        assert!(oe.is_met(0x1637));
        assert!(!oe.is_met(0x0233));
    }

    #[test]
    fn profile_velocity_is_default_mode() {
        assert_eq!(OperationMode::default().as_i8(), 3);
    }
}
