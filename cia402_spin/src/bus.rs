//! Bus session guard and bring-up.
//!
//! `BusSession` owns the open bus connection for the duration of a run and
//! closes it when dropped, so every exit path releases the bus.

use cia402_common::config::{BusConfig, DeviceSet};
use cia402_common::error::DriveError;
use cia402_common::master::{BusState, FieldbusMaster, IoMap};
use std::thread;
use tracing::{debug, error, info, warn};

/// Open bus connection, closed on drop.
pub struct BusSession<'m, M: FieldbusMaster + ?Sized> {
    master: &'m mut M,
    mapped: usize,
}

impl<'m, M: FieldbusMaster + ?Sized> BusSession<'m, M> {
    /// Open the bus on `interface`, mapping process data into `io_map`.
    ///
    /// The master is closed again if opening fails.
    ///
    /// # Errors
    /// `DriveError::Open` with the master's failure.
    pub fn open(master: &'m mut M, interface: &str, io_map: &mut IoMap) -> Result<Self, DriveError> {
        info!("Opening {} master on {}", master.name(), interface);
        match master.open(interface, io_map) {
            Ok(mapped) => {
                info!(
                    "Bus open: {} device(s) found, {} bytes of process data mapped",
                    master.device_count(),
                    mapped
                );
                Ok(Self { master, mapped })
            }
            Err(e) => {
                error!("Failed to open bus on {}: {}", interface, e);
                master.close();
                Err(DriveError::Open(e))
            }
        }
    }

    /// Bytes of the process image in use.
    pub fn mapped(&self) -> usize {
        self.mapped
    }

    /// Number of devices found on the bus.
    pub fn device_count(&self) -> usize {
        self.master.device_count()
    }

    /// Verify that every id in `devices` is present on the bus.
    ///
    /// # Errors
    /// `DriveError::InsufficientTopology` if the highest id exceeds the device count.
    pub fn check_topology(&self, devices: &DeviceSet) -> Result<(), DriveError> {
        let found = self.master.device_count();
        let required = devices.max_id().map_or(0, usize::from);
        if required > found {
            error!("Need at least {} device(s) on the bus, found {}", required, found);
            return Err(DriveError::InsufficientTopology { found, required });
        }
        debug!("Topology ok: {} device(s), highest id {}", found, required);
        Ok(())
    }

    /// Bring the bus to SAFE_OP, then OPERATIONAL.
    ///
    /// SAFE_OP is checked once. OPERATIONAL is checked up to
    /// `bus.op_attempts` times, each check preceded by a process-data
    /// exchange.
    ///
    /// # Errors
    /// - `DriveError::BusTimeout` if a state is not reached
    /// - `DriveError::Bus` if the master rejects a request
    pub fn bring_up(&mut self, bus: &BusConfig) -> Result<(), DriveError> {
        let timeout = bus.state_timeout();

        info!("Requesting {}", BusState::SafeOp);
        self.master
            .request_state(BusState::SafeOp)
            .map_err(DriveError::Bus)?;
        let achieved = self.master.check_state(BusState::SafeOp, timeout);
        if achieved != BusState::SafeOp {
            error!("Bus stuck at {} waiting for {}", achieved, BusState::SafeOp);
            self.log_device_states();
            return Err(DriveError::BusTimeout {
                target: BusState::SafeOp,
                achieved,
                attempts: 1,
            });
        }
        info!("All devices reached {}", BusState::SafeOp);

        if !bus.safe_op_settle().is_zero() {
            thread::sleep(bus.safe_op_settle());
        }

        info!("Requesting {}", BusState::Operational);
        self.master
            .request_state(BusState::Operational)
            .map_err(DriveError::Bus)?;

        let mut achieved = BusState::None;
        for attempt in 1..=bus.op_attempts {
            self.master.exchange_process_data().map_err(DriveError::Bus)?;
            achieved = self.master.check_state(BusState::Operational, timeout);
            if achieved == BusState::Operational {
                info!(
                    "All devices reached {} after {} attempt(s)",
                    BusState::Operational,
                    attempt
                );
                return Ok(());
            }

            warn!(
                "Attempt {}/{}: bus at {}, waiting for {}",
                attempt,
                bus.op_attempts,
                achieved,
                BusState::Operational
            );
            self.log_device_states();
            if attempt < bus.op_attempts && !bus.op_retry_delay().is_zero() {
                thread::sleep(bus.op_retry_delay());
            }
        }

        error!(
            "Not all devices reached {} after {} attempt(s)",
            BusState::Operational,
            bus.op_attempts
        );
        Err(DriveError::BusTimeout {
            target: BusState::Operational,
            achieved,
            attempts: bus.op_attempts,
        })
    }

    /// Underlying master.
    pub fn master(&mut self) -> &mut M {
        self.master
    }

    fn log_device_states(&self) {
        for device in 1..=self.master.device_count() {
            let Ok(device) = u16::try_from(device) else {
                break;
            };
            if let Some(status) = self.master.device_bus_status(device) {
                warn!(
                    "Device {}: state {}, AL status code 0x{:04X}",
                    device, status.state, status.al_status_code
                );
            }
        }
    }
}

impl<M: FieldbusMaster + ?Sized> Drop for BusSession<'_, M> {
    fn drop(&mut self) {
        info!("Closing bus");
        self.master.close();
    }
}
