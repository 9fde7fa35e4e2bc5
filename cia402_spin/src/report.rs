//! Session outcome and per-device report.

use cia402_common::config::DeviceSet;
use cia402_common::drive::{DeviceId, PowerState};
use cia402_common::error::{DriveError, DriveStep, Phase, SessionError, StepError};
use serde::Serialize;

/// Last known state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    /// Device id.
    pub id: DeviceId,
    /// Last observed power state (`unknown` until a statusword was read).
    pub state: PowerState,
    /// Last observed statusword.
    pub last_status: Option<u16>,
    /// Error code (0x603F) read after a failure.
    pub error_code: Option<u16>,
    /// Last target velocity commanded.
    pub commanded_velocity: i32,
    /// True while the device is known to be in operation enabled.
    pub enabled: bool,
}

impl DeviceReport {
    /// Record for a device nothing is known about yet.
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            state: PowerState::Unknown,
            last_status: None,
            error_code: None,
            commanded_velocity: 0,
            enabled: false,
        }
    }

    /// Record an observed statusword.
    pub fn observe(&mut self, status: u16) {
        self.last_status = Some(status);
        self.state = PowerState::from_statusword(status);
        self.enabled = self.state == PowerState::OperationEnabled;
    }

    /// Record whatever statusword a failed step carries.
    pub fn observe_failure(&mut self, err: &StepError) {
        match err.source {
            DriveError::StatusTimeout { last_status, .. } => self.observe(last_status),
            DriveError::UnexpectedState { status, .. } => self.observe(status),
            _ => {}
        }
    }
}

/// Outcome of one session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    result: Result<(), SessionError>,
    devices: Vec<DeviceReport>,
    interrupted: bool,
}

#[derive(Serialize)]
struct ReportView<'a> {
    success: bool,
    phase: Option<Phase>,
    device: Option<DeviceId>,
    step: Option<DriveStep>,
    error: Option<String>,
    interrupted: bool,
    devices: &'a [DeviceReport],
}

impl SessionReport {
    /// Assemble a report.
    pub fn new(result: Result<(), SessionError>, devices: Vec<DeviceReport>, interrupted: bool) -> Self {
        Self {
            result,
            devices,
            interrupted,
        }
    }

    /// Report for a run that failed before any device was addressed.
    pub fn failed(devices: &DeviceSet, err: SessionError) -> Self {
        Self::new(
            Err(err),
            devices.ids().iter().copied().map(DeviceReport::new).collect(),
            false,
        )
    }

    /// Returns true if every phase completed.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// First failure, if any.
    pub fn error(&self) -> Option<&SessionError> {
        self.result.as_ref().err()
    }

    /// Per-device records in device-set order.
    pub fn devices(&self) -> &[DeviceReport] {
        &self.devices
    }

    /// Record for `id`.
    pub fn device(&self, id: DeviceId) -> Option<&DeviceReport> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Returns true if the hold was cut short by an operator interrupt.
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Process exit code: 0 on success, 1 on failure.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let err = self.error();
        let view = ReportView {
            success: self.is_success(),
            phase: err.map(SessionError::phase),
            device: err.and_then(SessionError::device),
            step: err.and_then(SessionError::step),
            error: err.map(ToString::to_string),
            interrupted: self.interrupted,
            devices: &self.devices,
        };
        serde_json::to_string_pretty(&view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cia402_common::drive::StatusCondition;
    use cia402_common::master::BusState;
    use std::time::Duration;

    #[test]
    fn observe_tracks_enabled() {
        let mut record = DeviceReport::new(3);
        assert_eq!(record.state, PowerState::Unknown);

        record.observe(0x0237);
        assert!(record.enabled);
        record.observe(0x0231);
        assert!(!record.enabled);
        assert_eq!(record.state, PowerState::ReadyToSwitchOn);
        assert_eq!(record.last_status, Some(0x0231));
    }

    #[test]
    fn failure_status_is_recorded() {
        let mut record = DeviceReport::new(2);
        record.observe_failure(&StepError::new(
            2,
            DriveStep::SwitchOn,
            DriveError::StatusTimeout {
                device: 2,
                condition: StatusCondition::SWITCHED_ON,
                last_status: 0x0231,
                timeout: Duration::from_millis(5),
            },
        ));
        assert_eq!(record.state, PowerState::ReadyToSwitchOn);
    }

    #[test]
    fn failed_report_json_names_phase() {
        let devices = DeviceSet::new(&[1, 2]).unwrap();
        let report = SessionReport::failed(
            &devices,
            SessionError::Bus {
                phase: Phase::BusBringUp,
                source: DriveError::BusTimeout {
                    target: BusState::Operational,
                    achieved: BusState::SafeOp,
                    attempts: 40,
                },
            },
        );
        assert_eq!(report.exit_code(), 1);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["phase"], "bus_bring_up");
        assert!(json["device"].is_null());
        assert_eq!(json["devices"].as_array().unwrap().len(), 2);
        assert_eq!(json["devices"][1]["state"], "unknown");
    }

    #[test]
    fn success_report() {
        let report = SessionReport::new(Ok(()), vec![DeviceReport::new(1)], true);
        assert!(report.is_success());
        assert!(report.interrupted());
        assert_eq!(report.exit_code(), 0);
        assert!(report.device(1).is_some());
        assert!(report.device(2).is_none());
    }
}
