//! CiA 402 drive state machine sequencer.
//!
//! Drives one device through the power-state graph with controlword
//! writes, gating every transition on a statusword wait:
//!
//! ```text
//! enable:   [fault reset] → shutdown (0x06, 0x21) → mode → switch on (0x07, 0x23)
//!           → enable operation (0x0F, 0x27)
//! disable:  disable operation (0x07, 0x23) → shutdown (0x06, 0x21)
//! ```
//!
//! Each sequence starts with a statusword read so that no controlword is
//! written while the device state is unknown. Steps fail fast; nothing is
//! retried.

use crate::od::ObjectDictionary;
use crate::poller::StatusPoller;
use cia402_common::config::SpinConfig;
use cia402_common::drive::{Controlword, DeviceId, OperationMode, PowerState, StatusCondition};
use cia402_common::error::{DriveError, DriveStep, StepError};
use cia402_common::master::FieldbusMaster;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Per-device CiA 402 sequencer.
#[derive(Debug, Clone)]
pub struct DriveSequencer {
    poller: StatusPoller,
    mode: OperationMode,
    step_delay: Duration,
    reset_faults: bool,
}

impl DriveSequencer {
    /// Create a sequencer.
    pub fn new(poller: StatusPoller, mode: OperationMode) -> Self {
        Self {
            poller,
            mode,
            step_delay: Duration::ZERO,
            reset_faults: false,
        }
    }

    /// Build a sequencer from the run configuration.
    pub fn from_config(config: &SpinConfig) -> Self {
        let poller = StatusPoller::new(
            config.timing.poll_interval(),
            config.timing.status_timeout(),
        );
        Self::new(poller, config.motion.operation_mode)
            .with_step_delay(config.timing.step_delay())
            .with_fault_reset(config.safety.reset_faults)
    }

    /// Pause before every step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Clear a latched fault before enabling.
    pub fn with_fault_reset(mut self, enabled: bool) -> Self {
        self.reset_faults = enabled;
        self
    }

    /// Run the forward sequence, leaving the device in operation enabled.
    ///
    /// Returns the final statusword.
    pub fn enable<M: FieldbusMaster + ?Sized>(
        &self,
        od: &mut ObjectDictionary<'_, M>,
        device: DeviceId,
    ) -> Result<u16, StepError> {
        let status = self.observe(od, device)?;
        let state = PowerState::from_statusword(status);
        debug!("Device {} initial state: {} (0x{:04X})", device, state, status);

        match state {
            PowerState::SwitchOnDisabled
            | PowerState::ReadyToSwitchOn
            | PowerState::SwitchedOn
            | PowerState::OperationEnabled => {}
            PowerState::Fault if self.reset_faults => {
                info!("Device {}: resetting fault", device);
                self.transition(
                    od,
                    device,
                    DriveStep::FaultReset,
                    Controlword::CMD_FAULT_RESET,
                    StatusCondition::SWITCH_ON_DISABLED,
                )?;
            }
            _ => return Err(unexpected(device, DriveStep::ReadStatus, status)),
        }

        info!("Device {}: shutdown (0x{:04X})", device, Controlword::SHUTDOWN.bits());
        self.transition(
            od,
            device,
            DriveStep::Shutdown,
            Controlword::SHUTDOWN,
            StatusCondition::READY_TO_SWITCH_ON,
        )?;

        self.pause();
        info!("Device {}: mode of operation {:?} ({})", device, self.mode, self.mode.as_i8());
        od.write_operation_mode(device, self.mode)
            .map_err(|e| StepError::new(device, DriveStep::SetOperationMode, e))?;

        info!("Device {}: switch on (0x{:04X})", device, Controlword::CMD_SWITCH_ON.bits());
        self.transition(
            od,
            device,
            DriveStep::SwitchOn,
            Controlword::CMD_SWITCH_ON,
            StatusCondition::SWITCHED_ON,
        )?;

        info!(
            "Device {}: enable operation (0x{:04X})",
            device,
            Controlword::CMD_ENABLE_OPERATION.bits()
        );
        let status = self.transition(
            od,
            device,
            DriveStep::EnableOperation,
            Controlword::CMD_ENABLE_OPERATION,
            StatusCondition::OPERATION_ENABLED,
        )?;

        info!("Device {} is now in Operation Enabled state", device);
        Ok(status)
    }

    /// Run the reverse sequence, leaving the device in ready to switch on.
    ///
    /// Returns the final statusword.
    pub fn disable<M: FieldbusMaster + ?Sized>(
        &self,
        od: &mut ObjectDictionary<'_, M>,
        device: DeviceId,
    ) -> Result<u16, StepError> {
        let status = self.observe(od, device)?;
        let state = PowerState::from_statusword(status);
        debug!("Device {} state before disable: {} (0x{:04X})", device, state, status);

        match state {
            PowerState::OperationEnabled => {
                info!(
                    "Device {}: disable operation (0x{:04X})",
                    device,
                    Controlword::CMD_DISABLE_OPERATION.bits()
                );
                self.transition(
                    od,
                    device,
                    DriveStep::DisableOperation,
                    Controlword::CMD_DISABLE_OPERATION,
                    StatusCondition::SWITCHED_ON,
                )?;
            }
            PowerState::SwitchedOn => {}
            PowerState::ReadyToSwitchOn => {
                debug!("Device {} already ready to switch on", device);
                return Ok(status);
            }
            _ => return Err(unexpected(device, DriveStep::ReadStatus, status)),
        }

        info!("Device {}: shutdown (0x{:04X})", device, Controlword::SHUTDOWN.bits());
        let status = self.transition(
            od,
            device,
            DriveStep::Shutdown,
            Controlword::SHUTDOWN,
            StatusCondition::READY_TO_SWITCH_ON,
        )?;

        info!("Device {} disabled (ready to switch on)", device);
        Ok(status)
    }

    /// Read the current statusword before any controlword write.
    fn observe<M: FieldbusMaster + ?Sized>(
        &self,
        od: &mut ObjectDictionary<'_, M>,
        device: DeviceId,
    ) -> Result<u16, StepError> {
        od.read_statusword(device)
            .map_err(|e| StepError::new(device, DriveStep::ReadStatus, e))
    }

    /// Write `command`, then wait for `target`.
    fn transition<M: FieldbusMaster + ?Sized>(
        &self,
        od: &mut ObjectDictionary<'_, M>,
        device: DeviceId,
        step: DriveStep,
        command: Controlword,
        target: StatusCondition,
    ) -> Result<u16, StepError> {
        self.pause();
        od.write_controlword(device, command)
            .map_err(|e| StepError::new(device, step, e))?;
        self.poller
            .wait_for(od, device, target)
            .map_err(|e| StepError::new(device, step, e))
    }

    fn pause(&self) {
        if !self.step_delay.is_zero() {
            thread::sleep(self.step_delay);
        }
    }
}

fn unexpected(device: DeviceId, step: DriveStep, status: u16) -> StepError {
    StepError::new(
        device,
        step,
        DriveError::UnexpectedState {
            device,
            state: PowerState::from_statusword(status),
            status,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masters::simulation::{BusEvent, SimulationMaster};
    use cia402_common::drive::CONTROLWORD;
    use cia402_common::master::IoMap;

    fn sequencer() -> DriveSequencer {
        DriveSequencer::new(
            StatusPoller::new(Duration::from_millis(1), Duration::from_millis(30)),
            OperationMode::ProfileVelocity,
        )
    }

    fn open_master(master: &mut SimulationMaster) {
        master.open("sim0", &mut IoMap::new()).unwrap();
    }

    #[test]
    fn forward_then_reverse_returns_to_ready_to_switch_on() {
        let mut master = SimulationMaster::new(2, 2);
        open_master(&mut master);
        let seq = sequencer();
        {
            let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));
            for device in [1, 2] {
                let status = seq.enable(&mut od, device).unwrap();
                assert_eq!(PowerState::from_statusword(status), PowerState::OperationEnabled);
                let status = seq.disable(&mut od, device).unwrap();
                assert_eq!(PowerState::from_statusword(status), PowerState::ReadyToSwitchOn);
            }
        }
        for device in [1, 2] {
            assert_eq!(master.drive(device).unwrap().state(), PowerState::ReadyToSwitchOn);
        }
    }

    #[test]
    fn enable_writes_mode_and_controlwords_in_order() {
        let mut master = SimulationMaster::new(1, 1);
        open_master(&mut master);
        {
            let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));
            sequencer().enable(&mut od, 1).unwrap();
        }
        assert_eq!(master.controlword_writes(1), vec![0x0006, 0x0007, 0x000F]);
        assert_eq!(master.drive(1).unwrap().operation_mode(), 3);
    }

    #[test]
    fn switch_on_waits_for_ready_to_switch_on() {
        let mut master = SimulationMaster::new(1, 3);
        open_master(&mut master);
        {
            let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));
            sequencer().enable(&mut od, 1).unwrap();
        }

        let journal = master.journal();
        let switch_on = journal
            .iter()
            .position(|e| e.is_write(1, CONTROLWORD, &0x0007u16.to_le_bytes()))
            .expect("switch on written");
        let shutdown = journal
            .iter()
            .position(|e| e.is_write(1, CONTROLWORD, &0x0006u16.to_le_bytes()))
            .expect("shutdown written");
        let confirmed = journal[shutdown..switch_on].iter().any(|e| {
            matches!(e.statusword(1), Some(s) if StatusCondition::READY_TO_SWITCH_ON.is_met(s))
        });
        assert!(confirmed, "switch on issued before ready to switch on was observed");
    }

    #[test]
    fn statusword_read_precedes_first_controlword_write() {
        let mut master = SimulationMaster::new(1, 0);
        open_master(&mut master);
        {
            let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));
            sequencer().enable(&mut od, 1).unwrap();
        }
        let first_device_event = master
            .journal()
            .iter()
            .find(|e| matches!(e, BusEvent::SdoRead { .. } | BusEvent::SdoWrite { .. }))
            .unwrap();
        assert!(first_device_event.statusword(1).is_some());
    }

    #[test]
    fn stuck_transition_fails_at_named_step() {
        let mut master = SimulationMaster::new(1, 0).with_stuck_transition(1, PowerState::SwitchedOn);
        open_master(&mut master);
        let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));

        let err = sequencer().enable(&mut od, 1).unwrap_err();
        assert_eq!(err.device, 1);
        assert_eq!(err.step, DriveStep::SwitchOn);
        assert!(matches!(err.source, DriveError::StatusTimeout { last_status, .. }
            if PowerState::from_statusword(last_status) == PowerState::ReadyToSwitchOn));
    }

    #[test]
    fn fault_is_unexpected_without_reset() {
        let mut master = SimulationMaster::new(1, 0).with_fault(1, 0x2310);
        open_master(&mut master);
        {
            let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));
            let err = sequencer().enable(&mut od, 1).unwrap_err();
            assert_eq!(err.step, DriveStep::ReadStatus);
            assert!(matches!(
                err.source,
                DriveError::UnexpectedState {
                    state: PowerState::Fault,
                    ..
                }
            ));
        }
        assert!(master.controlword_writes(1).is_empty());
    }

    #[test]
    fn fault_reset_precedes_enable_when_configured() {
        let mut master = SimulationMaster::new(1, 1).with_fault(1, 0x2310);
        open_master(&mut master);
        {
            let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));
            sequencer().with_fault_reset(true).enable(&mut od, 1).unwrap();
        }
        assert_eq!(master.controlword_writes(1), vec![0x0080, 0x0006, 0x0007, 0x000F]);
        assert_eq!(master.drive(1).unwrap().error_code(), 0);
    }

    #[test]
    fn disable_from_switch_on_disabled_is_unexpected() {
        let mut master = SimulationMaster::new(1, 0);
        open_master(&mut master);
        let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));

        let err = sequencer().disable(&mut od, 1).unwrap_err();
        assert!(matches!(
            err.source,
            DriveError::UnexpectedState {
                state: PowerState::SwitchOnDisabled,
                ..
            }
        ));
    }

    #[test]
    fn disable_when_already_ready_writes_nothing() {
        let mut master = SimulationMaster::new(1, 0);
        open_master(&mut master);
        {
            let mut od = ObjectDictionary::new(&mut master, Duration::from_millis(10));
            od.write_controlword(1, Controlword::SHUTDOWN).unwrap();
            sequencer().disable(&mut od, 1).unwrap();
        }
        assert_eq!(master.controlword_writes(1), vec![0x0006]);
    }
}
