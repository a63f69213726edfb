//! Control loop implementations.

pub mod pid;
