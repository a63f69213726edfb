//! Shared types for the syringe pump and sensor controller firmware.
//!
//! This crate holds no control-loop logic: state enums, error bitflags, the
//! wire protocol, hardware-abstraction contracts and TOML configuration
//! loading. `pump_core` builds the motion controller, PID loop and command
//! dispatcher on top of these types.
//!
//! # Module Structure
//!
//! - [`state`] - lifecycle enums and control-loop data types
//! - [`error`] - error bitflags
//! - [`protocol`] - wire frame header, FID tables, request/reply bodies
//! - [`hal`] - hardware abstraction contracts (C1/C2/C3)
//! - [`config`] - TOML configuration loading
//! - [`consts`] - shared numeric constants
//! - [`prelude`] - common re-exports

pub mod config;
pub mod consts;
pub mod error;
pub mod hal;
pub mod protocol;
pub mod state;

pub mod prelude;
