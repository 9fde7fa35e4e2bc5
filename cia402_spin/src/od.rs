//! Object dictionary client.
//!
//! Typed, blocking read/write of device objects through the external
//! fieldbus master. Values travel little-endian; the byte count returned
//! by a read must equal the size of the requested type.

use cia402_common::drive::{
    CONTROLWORD, Controlword, DeviceId, ERROR_CODE, MODES_OF_OPERATION, OperationMode,
    STATUSWORD, TARGET_VELOCITY,
};
use cia402_common::error::DriveError;
use cia402_common::master::FieldbusMaster;
use std::time::Duration;
use tracing::trace;

/// Largest object the client reads or writes.
const MAX_VALUE_SIZE: usize = 8;

/// Fixed-size value stored in an object dictionary entry.
pub trait OdValue: Copy + std::fmt::Debug {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encode into the first `SIZE` bytes of `buf`.
    fn encode(self, buf: &mut [u8]);

    /// Decode from the first `SIZE` bytes of `buf`.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_od_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl OdValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode(self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn decode(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_od_value!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Object dictionary access to the devices behind one master.
pub struct ObjectDictionary<'m, M: FieldbusMaster + ?Sized> {
    master: &'m mut M,
    timeout: Duration,
}

impl<'m, M: FieldbusMaster + ?Sized> ObjectDictionary<'m, M> {
    /// Create a client issuing every transaction with `timeout`.
    pub fn new(master: &'m mut M, timeout: Duration) -> Self {
        Self { master, timeout }
    }

    /// Read a typed value.
    ///
    /// # Errors
    /// - `DriveError::Comm` if the master reports a failure
    /// - `DriveError::SizeMismatch` if the device returns a different size
    pub fn read<T: OdValue>(
        &mut self,
        device: DeviceId,
        index: u16,
        subindex: u8,
    ) -> Result<T, DriveError> {
        let mut buf = [0u8; MAX_VALUE_SIZE];
        let actual = self
            .master
            .sdo_read(device, index, subindex, &mut buf, self.timeout)
            .map_err(|source| DriveError::Comm {
                device,
                index,
                subindex,
                source,
            })?;

        if actual != T::SIZE {
            return Err(DriveError::SizeMismatch {
                device,
                index,
                subindex,
                expected: T::SIZE,
                actual,
            });
        }

        let value = T::decode(&buf);
        trace!("SDO read dev {} 0x{:04X}:{:02X} -> {:?}", device, index, subindex, value);
        Ok(value)
    }

    /// Write a typed value.
    ///
    /// # Errors
    /// `DriveError::Comm` if the master reports a failure.
    pub fn write<T: OdValue>(
        &mut self,
        device: DeviceId,
        index: u16,
        subindex: u8,
        value: T,
    ) -> Result<(), DriveError> {
        let mut buf = [0u8; MAX_VALUE_SIZE];
        value.encode(&mut buf);
        trace!("SDO write dev {} 0x{:04X}:{:02X} <- {:?}", device, index, subindex, value);
        self.master
            .sdo_write(device, index, subindex, &buf[..T::SIZE], self.timeout)
            .map_err(|source| DriveError::Comm {
                device,
                index,
                subindex,
                source,
            })
    }

    /// Read the statusword (0x6041).
    pub fn read_statusword(&mut self, device: DeviceId) -> Result<u16, DriveError> {
        self.read::<u16>(device, STATUSWORD, 0x00)
    }

    /// Write the controlword (0x6040).
    pub fn write_controlword(&mut self, device: DeviceId, cw: Controlword) -> Result<(), DriveError> {
        self.write(device, CONTROLWORD, 0x00, cw.bits())
    }

    /// Write the modes of operation (0x6060).
    pub fn write_operation_mode(
        &mut self,
        device: DeviceId,
        mode: OperationMode,
    ) -> Result<(), DriveError> {
        self.write(device, MODES_OF_OPERATION, 0x00, mode.as_i8())
    }

    /// Write the target velocity (0x60FF).
    pub fn write_target_velocity(&mut self, device: DeviceId, velocity: i32) -> Result<(), DriveError> {
        self.write(device, TARGET_VELOCITY, 0x00, velocity)
    }

    /// Read the last error code (0x603F).
    pub fn read_error_code(&mut self, device: DeviceId) -> Result<u16, DriveError> {
        self.read::<u16>(device, ERROR_CODE, 0x00)
    }

    /// Underlying master.
    pub fn master(&mut self) -> &mut M {
        self.master
    }
}
