//! Synchronized motion orchestrator.
//!
//! Runs the device set through five phases, each over every device in
//! configured order before the next phase starts:
//!
//! ```text
//! Enable → ApplyVelocity → Hold → Stop → Disable
//! ```
//!
//! The first failure ends phase work. What happens to the devices
//! afterwards is set by `safety.on_failure`.

use crate::od::ObjectDictionary;
use crate::report::{DeviceReport, SessionReport};
use crate::sequencer::DriveSequencer;
use cia402_common::config::{FailurePolicy, SpinConfig};
use cia402_common::drive::DeviceId;
use cia402_common::error::{DriveStep, Phase, SessionError, StepError};
use cia402_common::master::FieldbusMaster;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// One motion run over the configured device set.
pub struct SyncMotion<'a> {
    config: &'a SpinConfig,
    sequencer: DriveSequencer,
    running: Arc<AtomicBool>,
    devices: Vec<DeviceReport>,
    interrupted: bool,
}

impl<'a> SyncMotion<'a> {
    /// Prepare a run. Clearing `running` ends the hold phase early.
    pub fn new(config: &'a SpinConfig, running: Arc<AtomicBool>) -> Self {
        let devices = config
            .motion
            .devices
            .ids()
            .iter()
            .copied()
            .map(DeviceReport::new)
            .collect();
        Self {
            config,
            sequencer: DriveSequencer::from_config(config),
            running,
            devices,
            interrupted: false,
        }
    }

    /// Run all phases and apply the failure policy on error.
    pub fn run<M: FieldbusMaster + ?Sized>(mut self, od: &mut ObjectDictionary<'_, M>) -> SessionReport {
        let result = self.run_phases(od);

        match &result {
            Ok(()) => info!("Motion session completed"),
            Err(err) => {
                error!("Motion session failed: {}", err);
                if let Some(device) = err.device() {
                    self.capture_error_code(od, device);
                }
                self.cleanup(od, err);
            }
        }

        SessionReport::new(result, self.devices, self.interrupted)
    }

    fn run_phases<M: FieldbusMaster + ?Sized>(
        &mut self,
        od: &mut ObjectDictionary<'_, M>,
    ) -> Result<(), SessionError> {
        self.enable_all(od)?;
        self.apply_velocity(od)?;
        self.hold();
        self.stop_all(od)?;
        self.disable_all(od)
    }

    fn enable_all<M: FieldbusMaster + ?Sized>(
        &mut self,
        od: &mut ObjectDictionary<'_, M>,
    ) -> Result<(), SessionError> {
        info!("Enabling {} device(s)", self.devices.len());
        for idx in 0..self.devices.len() {
            let id = self.devices[idx].id;
            self.pause_between_devices();
            match self.sequencer.enable(od, id) {
                Ok(status) => self.devices[idx].observe(status),
                Err(e) => return Err(self.device_failure(idx, Phase::Enable, e)),
            }
        }
        Ok(())
    }

    fn apply_velocity<M: FieldbusMaster + ?Sized>(
        &mut self,
        od: &mut ObjectDictionary<'_, M>,
    ) -> Result<(), SessionError> {
        info!("Applying velocity magnitude {}", self.config.motion.velocity);
        for idx in 0..self.devices.len() {
            let id = self.devices[idx].id;
            let velocity = self.config.motion.target_velocity(id);
            self.pause_between_devices();
            info!("Device {}: target velocity {}", id, velocity);
            // A failed write may still have reached the device.
            self.devices[idx].commanded_velocity = velocity;
            if let Err(e) = od.write_target_velocity(id, velocity) {
                let e = StepError::new(id, DriveStep::ApplyVelocity, e);
                return Err(self.device_failure(idx, Phase::ApplyVelocity, e));
            }
        }
        Ok(())
    }

    fn hold(&mut self) {
        let duration = self.config.motion.hold();
        let tick = self.config.timing.poll_interval();
        info!("Holding velocity for {:?}", duration);

        let start = Instant::now();
        loop {
            if !self.running.load(Ordering::SeqCst) {
                warn!("Hold interrupted after {:?}", start.elapsed());
                self.interrupted = true;
                return;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                break;
            }
            thread::sleep(tick.min(duration - elapsed));
        }
        debug!("Hold complete");
    }

    fn stop_all<M: FieldbusMaster + ?Sized>(
        &mut self,
        od: &mut ObjectDictionary<'_, M>,
    ) -> Result<(), SessionError> {
        info!("Stopping all devices");
        for idx in 0..self.devices.len() {
            let id = self.devices[idx].id;
            self.pause_between_devices();
            if let Err(e) = od.write_target_velocity(id, 0) {
                let e = StepError::new(id, DriveStep::StopVelocity, e);
                return Err(self.device_failure(idx, Phase::Stop, e));
            }
            self.devices[idx].commanded_velocity = 0;
        }
        Ok(())
    }

    fn disable_all<M: FieldbusMaster + ?Sized>(
        &mut self,
        od: &mut ObjectDictionary<'_, M>,
    ) -> Result<(), SessionError> {
        info!("Disabling {} device(s)", self.devices.len());
        for idx in 0..self.devices.len() {
            let id = self.devices[idx].id;
            self.pause_between_devices();
            match self.sequencer.disable(od, id) {
                Ok(status) => self.devices[idx].observe(status),
                Err(e) => return Err(self.device_failure(idx, Phase::Disable, e)),
            }
        }
        Ok(())
    }

    fn device_failure(&mut self, idx: usize, phase: Phase, source: StepError) -> SessionError {
        self.devices[idx].observe_failure(&source);
        SessionError::Device { phase, source }
    }

    fn capture_error_code<M: FieldbusMaster + ?Sized>(
        &mut self,
        od: &mut ObjectDictionary<'_, M>,
        device: DeviceId,
    ) {
        match od.read_error_code(device) {
            Ok(code) => {
                if code != 0 {
                    error!("Device {} error code 0x{:04X}", device, code);
                }
                if let Some(record) = self.devices.iter_mut().find(|d| d.id == device) {
                    record.error_code = Some(code);
                }
            }
            Err(e) => warn!("Could not read error code of device {}: {}", device, e),
        }
    }

    /// Bring devices to a safe state after a failure.
    ///
    /// The failing device takes part too, except that the step which just
    /// failed on it is not repeated. Cleanup errors are logged only.
    fn cleanup<M: FieldbusMaster + ?Sized>(&mut self, od: &mut ObjectDictionary<'_, M>, err: &SessionError) {
        match self.config.safety.on_failure {
            FailurePolicy::CloseOnly => {
                info!("Failure policy close_only: no further device commands");
            }
            FailurePolicy::DisableEnabled => {
                let failed = err.device();
                let phase = err.phase();
                info!("Failure policy disable_enabled: stopping and disabling devices");

                for record in self.devices.iter_mut() {
                    let repeats_failure = phase == Phase::Stop && Some(record.id) == failed;
                    if repeats_failure || record.commanded_velocity == 0 {
                        continue;
                    }
                    match od.write_target_velocity(record.id, 0) {
                        Ok(()) => {
                            info!("Device {}: velocity zeroed", record.id);
                            record.commanded_velocity = 0;
                        }
                        Err(e) => warn!("Device {}: failed to zero velocity: {}", record.id, e),
                    }
                }

                for idx in 0..self.devices.len() {
                    let record = &self.devices[idx];
                    let repeats_failure = phase == Phase::Disable && Some(record.id) == failed;
                    if repeats_failure || !record.enabled {
                        continue;
                    }
                    let id = record.id;
                    match self.sequencer.disable(od, id) {
                        Ok(status) => self.devices[idx].observe(status),
                        Err(e) => {
                            warn!("Device {}: disable during cleanup failed: {}", id, e);
                            self.devices[idx].observe_failure(&e);
                        }
                    }
                }
            }
        }
    }

    fn pause_between_devices(&self) {
        let delay: Duration = self.config.timing.device_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}
