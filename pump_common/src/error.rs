//! Error bitflag types shared by both boards (§3, §7).

use bitflags::bitflags;

bitflags! {
    /// Pump error OR-bitset (§3). Cleared only by `ResetPump`, except
    /// `MAXLIM`/`MINLIM` which additionally auto-clear on switch release.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PumpError: u8 {
        /// Pull-side (max-travel) limit switch asserted.
        const MAXLIM                   = 0x01;
        /// Push-side (min-travel) limit switch asserted.
        const MINLIM                   = 0x02;
        /// Stepper driver reported a latched fault.
        const DRIVER_ERROR              = 0x04;
        /// Driver register verification failed after the last config apply.
        const STEPDRV_NOT_CONFIGURED    = 0x08;
    }
}

impl PumpError {
    /// `true` if the motion controller must not be allowed to run.
    #[inline]
    pub const fn blocks_motion(&self) -> bool {
        !self.is_empty()
    }
}

/// Per-probe connectivity flags for the sensor board.
///
/// Not part of the wire protocol's `PumpError` taxonomy; tracked internally
/// from each probe's identification query outcome (§4.5, `checkSensorConnection`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProbeConnection {
    /// `true` if the pH probe answered its last identification query.
    pub ph_connected: bool,
    /// `true` per channel if that temperature probe answered its last
    /// identification query.
    pub temp_connected: [bool; crate::protocol::PID_CHANNEL_COUNT],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(PumpError::default().is_empty());
        assert!(!PumpError::default().blocks_motion());
    }

    #[test]
    fn maxlim_and_minlim_are_independent_bits() {
        let mut e = PumpError::empty();
        e |= PumpError::MAXLIM;
        assert!(e.contains(PumpError::MAXLIM));
        assert!(!e.contains(PumpError::MINLIM));
        e.remove(PumpError::MAXLIM);
        assert!(e.is_empty());
    }

    #[test]
    fn any_bit_blocks_motion() {
        assert!(PumpError::STEPDRV_NOT_CONFIGURED.blocks_motion());
    }
}
