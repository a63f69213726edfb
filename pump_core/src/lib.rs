//! # Pump & Sensor Board Firmware Core
//!
//! Motion control, PID temperature control and command dispatch for the
//! networked syringe pump / water-chemistry sensor controller. Depends only
//! on the hardware contracts in `pump_common::hal`; concrete HAL
//! implementations (real hardware or a software simulation) are supplied by
//! the binaries in `src/bin`.

pub mod control;
pub mod ezo;
pub mod motion;
pub mod pump;
pub mod sensor;
pub mod sim;
pub mod stepper;
