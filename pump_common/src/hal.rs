//! Hardware abstraction contracts (C1/C2/C3).
//!
//! These traits are the boundary named in the firmware's purpose/scope as
//! external collaborators: the TCP/IP stack, the raw I²C/SPI bus drivers, the
//! AMIS30543 register-level stepper driver, the EZO probe command wrappers
//! and LED pins. `pump_core` depends only on these traits; concrete
//! implementations (real hardware or a test double) are supplied by the
//! binary that wires everything together.

use thiserror::Error;

/// Error type for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// A GPIO, SPI or I²C transaction failed at the bus level.
    #[error("bus error: {0}")]
    Bus(String),
    /// A peripheral did not answer within its expected timeout.
    #[error("timeout waiting for {0}")]
    Timeout(String),
}

/// A single digital output pin (step, direction, enable, LED).
pub trait DigitalOutputPin: Send {
    /// Drive the pin high.
    fn set_high(&mut self);
    /// Drive the pin low.
    fn set_low(&mut self);
}

/// A single digital input pin (limit switch, driver fault).
pub trait DigitalInputPin: Send {
    /// Read the pin's instantaneous logic level.
    fn is_high(&self) -> bool;
}

/// A single PWM output channel driving a heater MOSFET.
pub trait PwmOutput: Send {
    /// Set the duty cycle, clamped to `[0.0, 1.0]`.
    fn set_duty(&mut self, duty: f32);
}

/// Microsecond-resolution hardware timer driving the motion ISR (§4.1, §5).
///
/// `schedule_after` rearms a one-shot alarm relative to "now"; the motion
/// controller calls it on every tick that changes the whole-microsecond
/// interval. The timer's callback must run in the same interrupt context
/// the rest of §4.4's handlers run in.
pub trait MicrosecondTimer: Send {
    /// Arm a one-shot alarm `micros` microseconds from now.
    fn schedule_after(&mut self, micros: u32);
    /// Cancel any pending alarm without firing it.
    fn cancel(&mut self);
}

/// Fault-status bits decoded from the AMIS30543's SR0/SR1/SR2 registers (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverFaultStatus {
    /// Open load on phase X.
    pub openx: bool,
    /// Open load on phase Y.
    pub openy: bool,
    /// Watchdog timeout.
    pub wd: bool,
    /// Charge pump failure.
    pub cpfail: bool,
    /// Thermal warning.
    pub tw: bool,
    /// Overcurrent on phase X.
    pub ovcx: bool,
    /// Overcurrent on phase Y.
    pub ovcy: bool,
    /// Thermal shutdown.
    pub tsd: bool,
}

impl DriverFaultStatus {
    /// `true` if any latched fault bit is set.
    pub const fn has_fault(&self) -> bool {
        self.openx
            || self.openy
            || self.wd
            || self.cpfail
            || self.tw
            || self.ovcx
            || self.ovcy
            || self.tsd
    }
}

/// C2 — façade over the AMIS30543 register-level stepper driver.
///
/// Implementations perform the actual SPI register writes; `pump_core` only
/// ever speaks in terms of the typed configuration and fault status below.
pub trait StepperDriver: Send {
    /// Apply the full register configuration (PWM frequency/slope/jitter,
    /// microstep mode, current limit). Returns `Err` if register readback
    /// verification fails, per §7's `STEPDRV_NOT_CONFIGURED` taxonomy.
    fn configure(
        &mut self,
        step_mode: u8,
        current_limit_ma: u16,
        pwm_frequency_doubled: bool,
        pwm_slope: u8,
        pwm_jitter: bool,
    ) -> Result<(), HalError>;

    /// Set the direction output ahead of a motion run.
    fn set_direction(&mut self, forward: bool);

    /// Enable or disable the driver's output stage (holding torque).
    fn set_enabled(&mut self, enabled: bool);

    /// Read and decode the latched fault-status registers.
    fn read_fault_status(&mut self) -> Result<DriverFaultStatus, HalError>;
}

/// Status byte returned by every EZO command per the I²C protocol (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EzoStatus {
    /// Command succeeded; payload bytes follow.
    Ok,
    /// Command still processing; retry the read later.
    Pending,
    /// No data available to return.
    NoData,
    /// Command failed (any other status byte).
    Failed(u8),
}

impl EzoStatus {
    /// Decode the first response byte per the EZO status convention.
    pub const fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::Ok,
            254 => Self::Pending,
            255 => Self::NoData,
            other => Self::Failed(other),
        }
    }
}

/// C3 — one I²C command/response exchange with a single EZO probe.
///
/// Implementations own the bus address and perform the command-specific
/// delay (§5, §6) between writing the ASCII command and reading the
/// response buffer.
pub trait I2cProbe: Send {
    /// Write an ASCII command, wait the given delay, and read back the
    /// response buffer (status byte followed by a null-terminated payload).
    fn command(&mut self, ascii_command: &str, delay_ms: u32) -> Result<Vec<u8>, HalError>;

    /// Write an ASCII command without waiting or reading back a response.
    /// Used by the commanded-read flow (§4.3): `sendReadCMD` fires the `R`
    /// command and returns immediately, leaving the read itself to the
    /// soft-timer deadline handler.
    fn write_only(&mut self, ascii_command: &str) -> Result<(), HalError>;

    /// Read back a response buffer without writing a command first. Used
    /// to collect the reading once the 1 s deadline armed by
    /// [`I2cProbe::write_only`]'s `R` command has elapsed.
    fn read_only(&mut self) -> Result<Vec<u8>, HalError>;

    /// Reassign this probe's I²C bus address (used after `SET_ADDRESS`,
    /// §4.4, since a successful `I2C,<addr>` command changes the address
    /// the next transaction must target).
    fn set_bus_address(&mut self, address: u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ezo_status_decodes_known_bytes() {
        assert_eq!(EzoStatus::from_byte(1), EzoStatus::Ok);
        assert_eq!(EzoStatus::from_byte(254), EzoStatus::Pending);
        assert_eq!(EzoStatus::from_byte(255), EzoStatus::NoData);
        assert_eq!(EzoStatus::from_byte(7), EzoStatus::Failed(7));
    }

    #[test]
    fn fault_status_has_fault_detects_any_bit() {
        let mut f = DriverFaultStatus::default();
        assert!(!f.has_fault());
        f.tsd = true;
        assert!(f.has_fault());
    }
}
