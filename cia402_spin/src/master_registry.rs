//! Named fieldbus master backends.
//!
//! `main` resolves `bus.master` (or `--simulate`) through a `MasterRegistry`
//! built once at startup. Additional backends plug in with `register`.

use cia402_common::config::SpinConfig;
use cia402_common::error::DriveError;
use cia402_common::master::{FieldbusMaster, MasterFactory};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Backend name to factory, ordered by name.
#[derive(Default)]
pub struct MasterRegistry {
    factories: BTreeMap<&'static str, MasterFactory>,
}

impl MasterRegistry {
    /// Registry without any backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the backends shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::masters::register_builtin(&mut registry);
        registry
    }

    /// Add a backend under `name`.
    ///
    /// # Panics
    /// Two backends may not share a name.
    pub fn register(&mut self, name: &'static str, factory: MasterFactory) {
        match self.factories.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(factory);
            }
            Entry::Occupied(_) => panic!("Master backend '{name}' registered twice"),
        }
    }

    /// Returns true if a backend is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the backend `name` for `config`.
    ///
    /// # Errors
    /// `DriveError::MasterNotFound` for an unknown name.
    pub fn create_master(
        &self,
        name: &str,
        config: &SpinConfig,
    ) -> Result<Box<dyn FieldbusMaster>, DriveError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory(config)),
            None => Err(DriveError::MasterNotFound(name.to_string())),
        }
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cia402_common::master::{BusState, IoMap, MasterError};
    use std::time::Duration;

    struct NullMaster;

    impl FieldbusMaster for NullMaster {
        fn name(&self) -> &'static str {
            "null"
        }

        fn open(&mut self, _interface: &str, _io_map: &mut IoMap) -> Result<usize, MasterError> {
            Ok(0)
        }

        fn device_count(&self) -> usize {
            0
        }

        fn sdo_read(
            &mut self,
            device: u16,
            _index: u16,
            _subindex: u8,
            _buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<usize, MasterError> {
            Err(MasterError::NoSuchDevice(device))
        }

        fn sdo_write(
            &mut self,
            device: u16,
            _index: u16,
            _subindex: u8,
            _data: &[u8],
            _timeout: Duration,
        ) -> Result<(), MasterError> {
            Err(MasterError::NoSuchDevice(device))
        }

        fn request_state(&mut self, _target: BusState) -> Result<(), MasterError> {
            Ok(())
        }

        fn check_state(&mut self, _target: BusState, _timeout: Duration) -> BusState {
            BusState::None
        }

        fn exchange_process_data(&mut self) -> Result<(), MasterError> {
            Ok(())
        }

        fn close(&mut self) {}
    }

    fn create_null_master(_config: &SpinConfig) -> Box<dyn FieldbusMaster> {
        Box::new(NullMaster)
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = MasterRegistry::with_builtin();
        reg.register("null", create_null_master);
        assert_eq!(reg.names(), vec!["null", "simulation"]);

        let master = reg
            .create_master("null", &SpinConfig::default())
            .expect("should create");
        assert_eq!(master.name(), "null");
    }

    #[test]
    fn registry_master_not_found() {
        let reg = MasterRegistry::new();
        let result = reg.create_master("ethercat", &SpinConfig::default());
        assert!(matches!(result, Err(DriveError::MasterNotFound(name)) if name == "ethercat"));
    }

    #[test]
    fn builtin_registry_has_simulation() {
        let reg = MasterRegistry::with_builtin();
        assert_eq!(reg.names(), vec!["simulation"]);
        assert!(reg.contains("simulation"));
        assert!(!reg.contains("null"));
        let master = reg
            .create_master("simulation", &SpinConfig::default())
            .expect("should create");
        assert_eq!(master.name(), "simulation");
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn registry_duplicate_panics() {
        let mut reg = MasterRegistry::new();
        reg.register("dup", create_null_master);
        reg.register("dup", create_null_master);
    }
}
