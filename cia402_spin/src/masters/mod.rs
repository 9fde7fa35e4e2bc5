//! Fieldbus master backends.
//!
//! - [`simulation`] - Software master with simulated drives
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `masters/`
//! 2. Implement the `FieldbusMaster` trait from `cia402_common::master`
//! 3. Register its factory in [`register_builtin`]

pub mod simulation;

use crate::master_registry::MasterRegistry;

/// Register all built-in backends.
pub fn register_builtin(registry: &mut MasterRegistry) {
    registry.register("simulation", simulation::create_master);
}
