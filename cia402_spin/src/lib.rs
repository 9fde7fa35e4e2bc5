//! # CiA 402 Spin Library
//!
//! Synchronized velocity run for a set of CiA 402 drives behind a
//! pluggable fieldbus master.
//!
//! # Module Structure
//!
//! - [`core`] - SpinCore struct, session entry point
//! - [`bus`] - Bus session guard and SAFE_OP / OPERATIONAL bring-up
//! - [`od`] - Typed object dictionary client
//! - [`poller`] - Statusword poller with deadline
//! - [`sequencer`] - Per-device CiA 402 enable / disable sequences
//! - [`motion`] - Phase orchestration and failure policy
//! - [`report`] - Session and per-device report
//! - [`master_registry`] - Master backend registration
//! - [`masters`] - Master backend implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          SpinCore                            │
//! │   ┌────────────┐    ┌─────────────┐    ┌──────────────────┐  │
//! │   │ BusSession │───►│ SyncMotion  │───►│ DriveSequencer   │  │
//! │   │ (guard)    │    │ (phases)    │    │ + StatusPoller   │  │
//! │   └─────┬──────┘    └──────┬──────┘    └────────┬─────────┘  │
//! │         │                  ▼                    │            │
//! │         │         ┌──────────────────┐          │            │
//! │         └────────►│ ObjectDictionary │◄─────────┘            │
//! │                   └────────┬─────────┘                       │
//! │                            ▼                                 │
//! │                  ┌────────────────────┐                      │
//! │                  │  FieldbusMaster    │ (trait object)       │
//! │                  └────────────────────┘                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod bus;
pub mod core;
pub mod master_registry;
pub mod masters;
pub mod motion;
pub mod od;
pub mod poller;
pub mod report;
pub mod sequencer;

// Re-export key types for convenience
pub use crate::core::SpinCore;
pub use crate::master_registry::MasterRegistry;
pub use crate::report::{DeviceReport, SessionReport};
