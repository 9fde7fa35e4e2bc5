//! Fieldbus master trait and error types.
//!
//! This module defines:
//! - `FieldbusMaster` trait - Interface to the external bus master
//! - `MasterError` enum - Failures reported by the master
//! - `BusState` enum - Bus-wide device states
//! - `IoMap` - Owned process-data image buffer
//! - `MasterFactory` type alias - Factory function type

use crate::config::SpinConfig;
use crate::consts::IO_MAP_SIZE;
use crate::drive::DeviceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error types reported by a fieldbus master.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MasterError {
    /// Master could not open the network interface or configure the bus.
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Operation attempted before `open()` succeeded.
    #[error("Bus connection not open")]
    NotOpen,

    /// Device id not present on the bus.
    #[error("Device {0} not present on bus")]
    NoSuchDevice(DeviceId),

    /// Service-data transaction did not complete within its timeout.
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// Device aborted the service-data transfer.
    #[error("Transfer aborted with code 0x{0:08X}")]
    Abort(u32),

    /// Transport-level failure.
    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Bus-wide device state as tracked by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BusState {
    /// No valid state.
    #[default]
    None = 0x00,
    /// Init state.
    Init = 0x01,
    /// Pre-operational: mailbox communication only.
    PreOp = 0x02,
    /// Bootstrap (firmware update) state.
    Boot = 0x03,
    /// Safe-operational: inputs valid, outputs held safe.
    SafeOp = 0x04,
    /// Operational: full process-data exchange.
    Operational = 0x08,
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Init => "INIT",
            Self::PreOp => "PRE_OP",
            Self::Boot => "BOOT",
            Self::SafeOp => "SAFE_OP",
            Self::Operational => "OPERATIONAL",
        };
        f.write_str(name)
    }
}

/// Per-device bus diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceBusStatus {
    /// Current bus state of the device.
    pub state: BusState,
    /// Application-layer status code reported by the device.
    pub al_status_code: u16,
}

/// Fixed-size process-data image.
///
/// Owned by the session and lent to the master while it maps process data.
pub struct IoMap {
    buf: Box<[u8; IO_MAP_SIZE]>,
}

impl IoMap {
    /// Create a zeroed image.
    pub fn new() -> Self {
        Self {
            buf: Box::new([0u8; IO_MAP_SIZE]),
        }
    }

    /// Image capacity in bytes.
    pub const fn capacity(&self) -> usize {
        IO_MAP_SIZE
    }

    /// Read-only view of the image.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..]
    }

    /// Mutable view of the image.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }
}

impl Default for IoMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory function type for creating master instances.
pub type MasterFactory = fn(&SpinConfig) -> Box<dyn FieldbusMaster>;

/// Trait defining the interface to an external fieldbus master.
///
/// The sequencer never talks to the wire itself. Interface bring-up,
/// device enumeration, process-data mapping and distributed clocks all
/// happen behind `open()`.
///
/// # Lifecycle
///
/// 1. `open()` - Called once; enumerates devices and maps process data
/// 2. `request_state()` / `check_state()` - Bus-level state transitions
/// 3. `sdo_read()` / `sdo_write()` - Object dictionary access per device
/// 4. `close()` - Called on every exit path, also after a failed `open()`
///
/// All calls block the caller for at most the timeout they are given.
pub trait FieldbusMaster: Send {
    /// Returns the backend's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Open the bus on `interface` and map process data into `io_map`.
    ///
    /// Returns the number of bytes of `io_map` in use.
    fn open(&mut self, interface: &str, io_map: &mut IoMap) -> Result<usize, MasterError>;

    /// Number of devices found on the bus.
    fn device_count(&self) -> usize;

    /// Read an object dictionary entry into `buf`.
    ///
    /// Returns the number of bytes the device delivered.
    fn sdo_read(
        &mut self,
        device: DeviceId,
        index: u16,
        subindex: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, MasterError>;

    /// Write `data` to an object dictionary entry.
    fn sdo_write(
        &mut self,
        device: DeviceId,
        index: u16,
        subindex: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<(), MasterError>;

    /// Request a bus-wide state for all devices.
    fn request_state(&mut self, target: BusState) -> Result<(), MasterError>;

    /// Wait up to `timeout` for all devices to reach `target`.
    ///
    /// Returns the lowest state observed across devices.
    fn check_state(&mut self, target: BusState, timeout: Duration) -> BusState;

    /// Run one process-data exchange.
    ///
    /// Masters need at least one exchange before devices accept OPERATIONAL.
    fn exchange_process_data(&mut self) -> Result<(), MasterError>;

    /// Per-device bus diagnostics.
    /// Default: None
    fn device_bus_status(&self, _device: DeviceId) -> Option<DeviceBusStatus> {
        None
    }

    /// Release the bus connection. Must be idempotent.
    fn close(&mut self);
}
