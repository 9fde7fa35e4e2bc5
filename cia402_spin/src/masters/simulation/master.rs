//! Simulation master implementation.
//!
//! The `SimulationMaster` implements the `FieldbusMaster` trait on top of a
//! set of `SimulatedDrive`s. Every bus interaction is appended to a journal
//! so that tests can check ordering and safety properties after a run.

use super::drive::SimulatedDrive;
use cia402_common::config::SpinConfig;
use cia402_common::drive::{CONTROLWORD, DeviceId, PowerState, STATUSWORD, TARGET_VELOCITY};
use cia402_common::master::{BusState, DeviceBusStatus, FieldbusMaster, IoMap, MasterError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Process-image bytes mapped per device.
///
/// Outputs: controlword (2), modes of operation (1), pad (1), target velocity (4).
/// Inputs: statusword (2), pad (2), velocity actual (4).
pub const PROCESS_IMAGE_PER_DEVICE: usize = 16;

/// AL status code reported by a device that refused a state change.
pub const AL_INVALID_STATE_CHANGE: u16 = 0x0011;

/// One recorded bus interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// `open()` called.
    Open {
        /// Requested interface.
        interface: String,
    },
    /// Successful object read.
    SdoRead {
        /// Addressed device.
        device: DeviceId,
        /// Object index.
        index: u16,
        /// Object sub-index.
        subindex: u8,
        /// Returned bytes.
        data: Vec<u8>,
    },
    /// Successful object write.
    SdoWrite {
        /// Addressed device.
        device: DeviceId,
        /// Object index.
        index: u16,
        /// Object sub-index.
        subindex: u8,
        /// Written bytes.
        data: Vec<u8>,
    },
    /// Bus state requested.
    RequestState(BusState),
    /// Bus state checked.
    CheckState {
        /// Awaited state.
        target: BusState,
        /// State reached.
        achieved: BusState,
    },
    /// Process-data exchange.
    ProcessData,
    /// `close()` called.
    Close,
}

impl BusEvent {
    /// Statusword value if this event is a statusword read from `device`.
    pub fn statusword(&self, device: DeviceId) -> Option<u16> {
        match self {
            Self::SdoRead {
                device: d,
                index: STATUSWORD,
                data,
                ..
            } if *d == device && data.len() == 2 => Some(u16::from_le_bytes([data[0], data[1]])),
            _ => None,
        }
    }

    /// Returns true if this event wrote `data` to `index` on `device`.
    pub fn is_write(&self, device: DeviceId, index: u16, data: &[u8]) -> bool {
        matches!(
            self,
            Self::SdoWrite { device: d, index: i, data: w, .. }
                if *d == device && *i == index && w.as_slice() == data
        )
    }

    /// Returns true for any object write.
    pub fn is_any_write(&self) -> bool {
        matches!(self, Self::SdoWrite { .. })
    }
}

/// A single write that times out once its matching predecessors went through.
#[derive(Debug, Clone)]
struct WriteFailure {
    device: DeviceId,
    index: u16,
    data: Vec<u8>,
    skip: usize,
}

/// Simulation master implementing the `FieldbusMaster` trait.
pub struct SimulationMaster {
    /// Master name
    name: &'static str,
    /// Simulated drives, index = id - 1
    drives: Vec<SimulatedDrive>,
    /// Open flag
    open: bool,
    /// Last requested bus state
    requested: BusState,
    /// Current bus state
    bus_state: BusState,
    /// Process-data exchanges since open
    exchanges: u64,
    /// Bus state the devices refuse to enter
    unreachable: Option<BusState>,
    /// Injected `open()` failure
    open_failure: Option<String>,
    /// Injected object access failures (device, index)
    sdo_failures: Vec<(DeviceId, u16)>,
    /// Injected one-shot write failures
    write_failures: Vec<WriteFailure>,
    /// Recorded interactions
    journal: Vec<BusEvent>,
}

impl SimulationMaster {
    /// Create a master with `device_count` drives.
    ///
    /// `settle_reads` is the number of statusword reads before a commanded
    /// transition becomes visible (0 = immediately).
    pub fn new(device_count: usize, settle_reads: u32) -> Self {
        let drives = (1..=device_count)
            .map(|id| SimulatedDrive::new(id as DeviceId, settle_reads))
            .collect();
        Self {
            name: "simulation",
            drives,
            open: false,
            requested: BusState::None,
            bus_state: BusState::None,
            exchanges: 0,
            unreachable: None,
            open_failure: None,
            sdo_failures: Vec::new(),
            write_failures: Vec::new(),
            journal: Vec::new(),
        }
    }

    /// Create a master sized for the configured device set.
    pub fn from_config(config: &SpinConfig) -> Self {
        let count = config.simulation.device_count.unwrap_or_else(|| {
            config.motion.devices.max_id().map_or(0, usize::from)
        });
        Self::new(count, config.simulation.settle_reads)
    }

    /// Transitions of `device` into `state` never complete.
    pub fn with_stuck_transition(mut self, device: DeviceId, state: PowerState) -> Self {
        if let Some(drive) = self.drive_mut(device) {
            drive.set_stuck(state);
        }
        self
    }

    /// `device` starts latched in fault with `error_code`.
    pub fn with_fault(mut self, device: DeviceId, error_code: u16) -> Self {
        if let Some(drive) = self.drive_mut(device) {
            drive.set_fault(error_code);
        }
        self
    }

    /// Every access to `index` on `device` times out.
    pub fn with_sdo_failure(mut self, device: DeviceId, index: u16) -> Self {
        self.sdo_failures.push((device, index));
        self
    }

    /// Writing `data` to `index` on `device` times out once.
    ///
    /// The first `skip` matching writes succeed; the one after fails and
    /// every later one succeeds again.
    pub fn with_write_failure(mut self, device: DeviceId, index: u16, data: &[u8], skip: usize) -> Self {
        self.write_failures.push(WriteFailure {
            device,
            index,
            data: data.to_vec(),
            skip,
        });
        self
    }

    /// Devices refuse to enter `state`.
    pub fn with_unreachable_state(mut self, state: BusState) -> Self {
        self.unreachable = Some(state);
        self
    }

    /// `open()` fails with `message`.
    pub fn with_open_failure(mut self, message: impl Into<String>) -> Self {
        self.open_failure = Some(message.into());
        self
    }

    /// Recorded interactions, oldest first.
    pub fn journal(&self) -> &[BusEvent] {
        &self.journal
    }

    /// Simulated drive `device`.
    pub fn drive(&self, device: DeviceId) -> Option<&SimulatedDrive> {
        let idx = usize::from(device).checked_sub(1)?;
        self.drives.get(idx)
    }

    fn drive_mut(&mut self, device: DeviceId) -> Option<&mut SimulatedDrive> {
        let idx = usize::from(device).checked_sub(1)?;
        self.drives.get_mut(idx)
    }

    /// Returns true while the bus is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Current bus state.
    pub fn bus_state(&self) -> BusState {
        self.bus_state
    }

    /// Controlwords written to `device`, in order.
    pub fn controlword_writes(&self, device: DeviceId) -> Vec<u16> {
        self.journal
            .iter()
            .filter_map(|event| match event {
                BusEvent::SdoWrite {
                    device: d,
                    index: CONTROLWORD,
                    data,
                    ..
                } if *d == device && data.len() == 2 => Some(u16::from_le_bytes([data[0], data[1]])),
                _ => None,
            })
            .collect()
    }

    /// Target velocities written, in order, as `(device, velocity)`.
    pub fn velocity_writes(&self) -> Vec<(DeviceId, i32)> {
        self.journal
            .iter()
            .filter_map(|event| match event {
                BusEvent::SdoWrite {
                    device,
                    index: TARGET_VELOCITY,
                    data,
                    ..
                } => {
                    let bytes: [u8; 4] = data.as_slice().try_into().ok()?;
                    Some((*device, i32::from_le_bytes(bytes)))
                }
                _ => None,
            })
            .collect()
    }

    /// Process-data exchanges since open.
    pub fn process_data_exchanges(&self) -> u64 {
        self.exchanges
    }

    fn ensure_open(&self) -> Result<(), MasterError> {
        if self.open {
            Ok(())
        } else {
            Err(MasterError::NotOpen)
        }
    }

    fn check_injected(&self, device: DeviceId, index: u16, timeout: Duration) -> Result<(), MasterError> {
        if self.sdo_failures.contains(&(device, index)) {
            warn!("Injected timeout on device {} at 0x{:04X}", device, index);
            return Err(MasterError::Timeout(timeout));
        }
        Ok(())
    }

    fn take_write_failure(
        &mut self,
        device: DeviceId,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<(), MasterError> {
        let hit = self
            .write_failures
            .iter()
            .position(|f| f.device == device && f.index == index && f.data == data);
        let Some(pos) = hit else {
            return Ok(());
        };
        if self.write_failures[pos].skip > 0 {
            self.write_failures[pos].skip -= 1;
            return Ok(());
        }
        self.write_failures.remove(pos);
        warn!("Injected one-shot timeout on device {} at 0x{:04X}", device, index);
        Err(MasterError::Timeout(timeout))
    }

    /// Highest state the devices accept when `target` is requested.
    fn reachable(&self, target: BusState) -> BusState {
        let mut achieved = target;
        if achieved == BusState::Operational && self.exchanges == 0 {
            achieved = BusState::SafeOp;
        }
        if let Some(blocked) = self.unreachable {
            if achieved >= blocked {
                achieved = below(blocked);
            }
        }
        achieved
    }
}

impl Default for SimulationMaster {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl FieldbusMaster for SimulationMaster {
    fn name(&self) -> &'static str {
        self.name
    }

    fn open(&mut self, interface: &str, io_map: &mut IoMap) -> Result<usize, MasterError> {
        self.journal.push(BusEvent::Open {
            interface: interface.to_string(),
        });

        if let Some(message) = &self.open_failure {
            return Err(MasterError::InitFailed(message.clone()));
        }

        let mapped = self.drives.len() * PROCESS_IMAGE_PER_DEVICE;
        if mapped > io_map.capacity() {
            return Err(MasterError::InitFailed(format!(
                "process image of {} bytes exceeds io map of {} bytes",
                mapped,
                io_map.capacity()
            )));
        }
        io_map.as_mut_slice()[..mapped].fill(0);

        self.open = true;
        self.exchanges = 0;
        self.requested = BusState::PreOp;
        self.bus_state = BusState::PreOp;

        info!(
            "Simulation master opened on {} with {} device(s), {} bytes mapped",
            interface,
            self.drives.len(),
            mapped
        );
        Ok(mapped)
    }

    fn device_count(&self) -> usize {
        if self.open { self.drives.len() } else { 0 }
    }

    fn sdo_read(
        &mut self,
        device: DeviceId,
        index: u16,
        subindex: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, MasterError> {
        self.ensure_open()?;
        self.check_injected(device, index, timeout)?;
        let drive = self
            .drive_mut(device)
            .ok_or(MasterError::NoSuchDevice(device))?;
        let len = drive.read_object(index, subindex, buf)?;
        self.journal.push(BusEvent::SdoRead {
            device,
            index,
            subindex,
            data: buf[..len].to_vec(),
        });
        Ok(len)
    }

    fn sdo_write(
        &mut self,
        device: DeviceId,
        index: u16,
        subindex: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<(), MasterError> {
        self.ensure_open()?;
        self.check_injected(device, index, timeout)?;
        self.take_write_failure(device, index, data, timeout)?;
        let drive = self
            .drive_mut(device)
            .ok_or(MasterError::NoSuchDevice(device))?;
        drive.write_object(index, subindex, data)?;
        self.journal.push(BusEvent::SdoWrite {
            device,
            index,
            subindex,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn request_state(&mut self, target: BusState) -> Result<(), MasterError> {
        self.ensure_open()?;
        debug!("Simulation master: requesting {}", target);
        self.journal.push(BusEvent::RequestState(target));
        self.requested = target;
        Ok(())
    }

    fn check_state(&mut self, target: BusState, _timeout: Duration) -> BusState {
        let achieved = if self.open {
            self.reachable(self.requested.min(target))
        } else {
            BusState::None
        };
        self.bus_state = achieved;
        self.journal.push(BusEvent::CheckState { target, achieved });
        achieved
    }

    fn exchange_process_data(&mut self) -> Result<(), MasterError> {
        self.ensure_open()?;
        self.exchanges += 1;
        self.journal.push(BusEvent::ProcessData);
        Ok(())
    }

    fn device_bus_status(&self, device: DeviceId) -> Option<DeviceBusStatus> {
        self.drive(device)?;
        let al_status_code = if self.bus_state < self.requested {
            AL_INVALID_STATE_CHANGE
        } else {
            0
        };
        Some(DeviceBusStatus {
            state: self.bus_state,
            al_status_code,
        })
    }

    fn close(&mut self) {
        self.journal.push(BusEvent::Close);
        if self.open {
            info!("Closing simulation master");
            self.open = false;
            self.requested = BusState::Init;
            self.bus_state = BusState::Init;
        }
    }
}

/// Next lower state in the bring-up order.
fn below(state: BusState) -> BusState {
    match state {
        BusState::Operational => BusState::SafeOp,
        BusState::SafeOp => BusState::PreOp,
        BusState::PreOp | BusState::Boot => BusState::Init,
        BusState::Init | BusState::None => BusState::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(master: &mut SimulationMaster) -> usize {
        master.open("sim0", &mut IoMap::new()).unwrap()
    }

    #[test]
    fn open_maps_process_image_and_enumerates() {
        let mut master = SimulationMaster::new(4, 0);
        assert_eq!(master.device_count(), 0);
        assert_eq!(open(&mut master), 4 * PROCESS_IMAGE_PER_DEVICE);
        assert_eq!(master.device_count(), 4);
        assert_eq!(master.bus_state(), BusState::PreOp);
    }

    #[test]
    fn open_failure_is_reported() {
        let mut master = SimulationMaster::new(1, 0).with_open_failure("no socket");
        let err = master.open("eth9", &mut IoMap::new()).unwrap_err();
        assert_eq!(err, MasterError::InitFailed("no socket".to_string()));
        assert!(!master.is_open());
    }

    #[test]
    fn operational_needs_process_data() {
        let mut master = SimulationMaster::new(1, 0);
        open(&mut master);
        master.request_state(BusState::SafeOp).unwrap();
        assert_eq!(master.check_state(BusState::SafeOp, Duration::ZERO), BusState::SafeOp);

        master.request_state(BusState::Operational).unwrap();
        assert_eq!(
            master.check_state(BusState::Operational, Duration::ZERO),
            BusState::SafeOp
        );
        master.exchange_process_data().unwrap();
        assert_eq!(
            master.check_state(BusState::Operational, Duration::ZERO),
            BusState::Operational
        );
    }

    #[test]
    fn unreachable_state_reports_al_status() {
        let mut master = SimulationMaster::new(2, 0).with_unreachable_state(BusState::Operational);
        open(&mut master);
        master.request_state(BusState::Operational).unwrap();
        master.exchange_process_data().unwrap();
        assert_eq!(
            master.check_state(BusState::Operational, Duration::ZERO),
            BusState::SafeOp
        );
        let status = master.device_bus_status(2).unwrap();
        assert_eq!(status.state, BusState::SafeOp);
        assert_eq!(status.al_status_code, AL_INVALID_STATE_CHANGE);
        assert!(master.device_bus_status(3).is_none());
    }

    #[test]
    fn access_before_open_fails() {
        let mut master = SimulationMaster::new(1, 0);
        let mut buf = [0u8; 2];
        assert_eq!(
            master.sdo_read(1, 0x6041, 0, &mut buf, Duration::from_millis(1)),
            Err(MasterError::NotOpen)
        );
    }

    #[test]
    fn injected_failure_times_out() {
        let mut master = SimulationMaster::new(1, 0).with_sdo_failure(1, TARGET_VELOCITY);
        open(&mut master);
        let timeout = Duration::from_millis(5);
        assert_eq!(
            master.sdo_write(1, TARGET_VELOCITY, 0, &7i32.to_le_bytes(), timeout),
            Err(MasterError::Timeout(timeout))
        );
        assert!(master.velocity_writes().is_empty());
    }

    #[test]
    fn write_failure_fires_once_after_skipped_matches() {
        let mut master =
            SimulationMaster::new(1, 0).with_write_failure(1, CONTROLWORD, &0x0007u16.to_le_bytes(), 1);
        open(&mut master);
        let timeout = Duration::from_millis(5);
        let cw = |w: u16| w.to_le_bytes();

        assert!(master.sdo_write(1, CONTROLWORD, 0, &cw(0x0006), timeout).is_ok());
        assert!(master.sdo_write(1, CONTROLWORD, 0, &cw(0x0007), timeout).is_ok());
        assert_eq!(
            master.sdo_write(1, CONTROLWORD, 0, &cw(0x0007), timeout),
            Err(MasterError::Timeout(timeout))
        );
        assert!(master.sdo_write(1, CONTROLWORD, 0, &cw(0x0007), timeout).is_ok());
        assert_eq!(master.controlword_writes(1), vec![0x0006, 0x0007, 0x0007]);
    }

    #[test]
    fn journal_records_writes_and_close() {
        let mut master = SimulationMaster::new(1, 0);
        open(&mut master);
        master
            .sdo_write(1, CONTROLWORD, 0, &0x0006u16.to_le_bytes(), Duration::ZERO)
            .unwrap();
        master.close();
        master.close();

        assert_eq!(master.controlword_writes(1), vec![0x0006]);
        assert_eq!(master.journal().last(), Some(&BusEvent::Close));
        assert!(!master.is_open());
    }

    #[test]
    fn from_config_sizes_to_highest_device() {
        let mut config = SpinConfig::default();
        config.motion.devices = cia402_common::config::DeviceSet::new(&[2, 5]).unwrap();
        let mut master = SimulationMaster::from_config(&config);
        open(&mut master);
        assert_eq!(master.device_count(), 5);
    }
}
