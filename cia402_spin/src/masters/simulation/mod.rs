//! Simulation master module.
//!
//! This module provides a software fieldbus master with simulated CiA 402
//! drives for development and testing without physical hardware.

mod drive;
mod master;

pub use drive::{
    ABORT_LENGTH, ABORT_NO_OBJECT, ABORT_NO_SUBINDEX, ABORT_READ_ONLY, MODES_OF_OPERATION_DISPLAY,
    SimulatedDrive, VELOCITY_ACTUAL,
};
pub use master::{AL_INVALID_STATE_CHANGE, BusEvent, PROCESS_IMAGE_PER_DEVICE, SimulationMaster};

use cia402_common::config::SpinConfig;
use cia402_common::master::FieldbusMaster;

/// Factory function to create a simulation master instance.
pub fn create_master(config: &SpinConfig) -> Box<dyn FieldbusMaster> {
    Box::new(SimulationMaster::from_config(config))
}
