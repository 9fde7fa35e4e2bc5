//! CiA 402 Common Library
//!
//! This crate provides the types shared by the spin workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Run configuration and TOML loading
//! - [`consts`] - Numeric limits and default bench timings
//! - [`drive`] - CiA 402 object addresses, control/status words, power states
//! - [`error`] - Drive, step and session error types
//! - [`master`] - Fieldbus master trait
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cia402_common::prelude::*;
//!
//! let state = PowerState::from_statusword(0x0237);
//! assert_eq!(state, PowerState::OperationEnabled);
//! ```

pub mod config;
pub mod consts;
pub mod drive;
pub mod error;
pub mod master;
pub mod prelude;
