//! Spin session core.
//!
//! The `SpinCore` struct is the main entry point for a run. It owns the
//! validated configuration and the running flag, and drives one session
//! against a fieldbus master: open, topology check, bus bring-up, motion.

use crate::bus::BusSession;
use crate::motion::SyncMotion;
use crate::od::ObjectDictionary;
use crate::report::SessionReport;
use cia402_common::config::{ConfigError, SpinConfig};
use cia402_common::error::{DriveError, Phase, SessionError};
use cia402_common::master::{FieldbusMaster, IoMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

/// Spin core drives one synchronized motion session.
pub struct SpinCore {
    /// Run configuration
    config: SpinConfig,
    /// Running flag, cleared to end the hold phase early
    running: Arc<AtomicBool>,
}

impl SpinCore {
    /// Create a new SpinCore instance with the given configuration.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(config: SpinConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            "SpinCore created: devices={:?}, velocity={}, hold={}ms, master={}",
            config.motion.devices.ids(),
            config.motion.velocity,
            config.motion.hold_ms,
            config.bus.master
        );

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Run one session on `master`.
    ///
    /// The bus is closed on every exit path. Failures are reported in the
    /// returned `SessionReport`, never as a panic.
    pub fn run<M: FieldbusMaster + ?Sized>(&self, master: &mut M) -> SessionReport {
        let config = &self.config;
        let mut io_map = IoMap::new();

        let mut session = match BusSession::open(master, &config.bus.interface, &mut io_map) {
            Ok(session) => session,
            Err(source) => return self.failed(Phase::Open, source),
        };
        debug!(
            "Bus open: {} device(s), {} process-image bytes mapped",
            session.device_count(),
            session.mapped()
        );

        if let Err(source) = session.check_topology(&config.motion.devices) {
            return self.failed(Phase::Open, source);
        }

        if let Err(source) = session.bring_up(&config.bus) {
            return self.failed(Phase::BusBringUp, source);
        }

        let mut od = ObjectDictionary::new(session.master(), config.timing.sdo_timeout());
        let report = SyncMotion::new(config, Arc::clone(&self.running)).run(&mut od);

        if report.is_success() {
            info!("Session finished successfully");
        }
        report
    }

    fn failed(&self, phase: Phase, source: DriveError) -> SessionReport {
        let err = SessionError::Bus { phase, source };
        error!("{}", err);
        SessionReport::failed(&self.config.motion.devices, err)
    }

    /// Request the hold phase to end early.
    pub fn interrupt(&self) {
        info!("Interrupt requested");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Get the validated configuration.
    pub fn config(&self) -> &SpinConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masters::simulation::{BusEvent, SimulationMaster};
    use cia402_common::config::DeviceSet;
    use cia402_common::master::BusState;

    fn fast_config() -> SpinConfig {
        let mut config = SpinConfig::default();
        config.motion.devices = DeviceSet::new(&[1, 2]).unwrap();
        config.motion.hold_ms = 0;
        config.bus.safe_op_settle_ms = 0;
        config.bus.op_retry_delay_ms = 0;
        config.timing.status_timeout_ms = 20;
        config.timing.poll_interval_ms = 1;
        config.timing.step_delay_us = 0;
        config.timing.device_delay_us = 0;
        config
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = fast_config();
        config.motion.velocity = -1;
        assert!(matches!(SpinCore::new(config), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn run_closes_bus_on_success() {
        let core = SpinCore::new(fast_config()).unwrap();
        let mut master = SimulationMaster::new(2, 1);

        let report = core.run(&mut master);

        assert!(report.is_success(), "{:?}", report.error());
        assert!(!master.is_open());
        assert_eq!(master.journal().last(), Some(&BusEvent::Close));
    }

    #[test]
    fn topology_failure_stops_before_bring_up() {
        let core = SpinCore::new(fast_config()).unwrap();
        let mut master = SimulationMaster::new(1, 0);

        let report = core.run(&mut master);

        let err = report.error().unwrap();
        assert_eq!(err.phase(), Phase::Open);
        assert!(!master.journal().contains(&BusEvent::RequestState(BusState::SafeOp)));
        assert_eq!(master.journal().last(), Some(&BusEvent::Close));
    }

    #[test]
    fn interrupt_clears_running_flag() {
        let core = SpinCore::new(fast_config()).unwrap();
        let flag = core.running_flag();
        assert!(flag.load(Ordering::SeqCst));
        core.interrupt();
        assert!(!flag.load(Ordering::SeqCst));
    }
}
