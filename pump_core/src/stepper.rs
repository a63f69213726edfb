//! AMIS30543 stepper driver façade (C2).
//!
//! A thin layer translating [`HardwareConfig`](pump_common::state::HardwareConfig)
//! fields into the register-level [`StepperDriver`] contract, and decoding
//! its fault-status bits into the `PumpError::DRIVER_ERROR`/
//! `STEPDRV_NOT_CONFIGURED` taxonomy (§3, §6, §7).

use pump_common::hal::{DriverFaultStatus, HalError, StepperDriver};
use pump_common::state::HardwareConfig;

/// Apply a full hardware configuration to the driver and verify it took
/// effect by reading back the fault-status registers once.
///
/// Returns `Err` (to be latched as `STEPDRV_NOT_CONFIGURED` by the caller)
/// if either the register write or the verification readback fails.
pub fn apply_config(
    driver: &mut impl StepperDriver,
    config: &HardwareConfig,
) -> Result<(), HalError> {
    driver.configure(
        config.step_mode,
        config.max_driver_current_ma,
        config.pwm_frequency_doubled,
        config.pwm_slope,
        config.pwm_jitter,
    )?;
    driver.read_fault_status()?;
    Ok(())
}

/// Read and classify the driver's latched fault status.
///
/// Returns `true` if any fault bit beyond thermal warning (`tw`, advisory
/// only) is set — the caller latches `PumpError::DRIVER_ERROR` on `true`.
pub fn has_latched_fault(status: &DriverFaultStatus) -> bool {
    status.openx
        || status.openy
        || status.wd
        || status.cpfail
        || status.ovcx
        || status.ovcy
        || status.tsd
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDriver {
        configure_ok: bool,
        fault: DriverFaultStatus,
        enabled: bool,
        forward: bool,
    }

    impl StepperDriver for FakeDriver {
        fn configure(
            &mut self,
            _step_mode: u8,
            _current_limit_ma: u16,
            _pwm_frequency_doubled: bool,
            _pwm_slope: u8,
            _pwm_jitter: bool,
        ) -> Result<(), HalError> {
            if self.configure_ok {
                Ok(())
            } else {
                Err(HalError::Bus("nack".into()))
            }
        }

        fn set_direction(&mut self, forward: bool) {
            self.forward = forward;
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }

        fn read_fault_status(&mut self) -> Result<DriverFaultStatus, HalError> {
            Ok(self.fault)
        }
    }

    #[test]
    fn apply_config_succeeds_when_driver_accepts_write() {
        let mut d = FakeDriver {
            configure_ok: true,
            fault: DriverFaultStatus::default(),
            enabled: false,
            forward: false,
        };
        let cfg = HardwareConfig::default();
        assert!(apply_config(&mut d, &cfg).is_ok());
    }

    #[test]
    fn apply_config_fails_when_register_write_nacks() {
        let mut d = FakeDriver {
            configure_ok: false,
            fault: DriverFaultStatus::default(),
            enabled: false,
            forward: false,
        };
        let cfg = HardwareConfig::default();
        assert!(apply_config(&mut d, &cfg).is_err());
    }

    #[test]
    fn thermal_warning_alone_is_not_a_latched_fault() {
        let mut status = DriverFaultStatus::default();
        status.tw = true;
        assert!(!has_latched_fault(&status));
    }

    #[test]
    fn overcurrent_is_a_latched_fault() {
        let mut status = DriverFaultStatus::default();
        status.ovcx = true;
        assert!(has_latched_fault(&status));
    }
}
