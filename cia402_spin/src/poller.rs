//! Statusword poller.
//!
//! Blocks until a device statusword satisfies a `(mask, expected)`
//! condition or the deadline passes. Bits outside the mask (warning,
//! target reached, manufacturer bits) never influence the result.

use crate::od::ObjectDictionary;
use cia402_common::drive::{DeviceId, StatusCondition};
use cia402_common::error::DriveError;
use cia402_common::master::FieldbusMaster;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Poll interval and deadline for statusword waits.
#[derive(Debug, Clone, Copy)]
pub struct StatusPoller {
    interval: Duration,
    timeout: Duration,
}

impl StatusPoller {
    /// Create a poller reading every `interval` until `timeout` has elapsed.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Wait for `condition` on `device`.
    ///
    /// At least one read is always made. Returns the satisfying statusword.
    ///
    /// # Errors
    /// - `DriveError::StatusTimeout` with the last observed status
    /// - Any read error, unchanged
    pub fn wait_for<M: FieldbusMaster + ?Sized>(
        &self,
        od: &mut ObjectDictionary<'_, M>,
        device: DeviceId,
        condition: StatusCondition,
    ) -> Result<u16, DriveError> {
        debug!("Waiting for statusword on device {}: {}", device, condition);

        let start = Instant::now();
        loop {
            let status = od.read_statusword(device)?;
            trace!("Device {} statusword: 0x{:04X}", device, status);

            if condition.is_met(status) {
                debug!(
                    "Device {} statusword condition met (0x{:04X}) after {:?}",
                    device,
                    status,
                    start.elapsed()
                );
                return Ok(status);
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                warn!(
                    "Timeout waiting for {} on device {}. Last status: 0x{:04X}",
                    condition, device, status
                );
                return Err(DriveError::StatusTimeout {
                    device,
                    condition,
                    last_status: status,
                    timeout: self.timeout,
                });
            }

            thread::sleep(self.interval.min(self.timeout - elapsed));
        }
    }
}
