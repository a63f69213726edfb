//! Shared numeric constants referenced by both boards.

/// Minimum step interval, in microseconds. A motion profile whose cruise
/// interval would fall below this is rejected (§3, §8).
pub const MIN_STEP_INTERVAL_US: f32 = 10.0;

/// First-step correction factor applied to `c0` (§3, §4.1).
pub const FIRST_STEP_CORRECTION: f32 = 0.676;

/// Default TCP port for the pump board (§6).
pub const PUMP_BOARD_DEFAULT_PORT: u16 = 7850;

/// Default TCP port for the sensor board (§6).
pub const SENSOR_BOARD_DEFAULT_PORT: u16 = 7851;

/// Command-specific I²C delays for EZO probe commands, in milliseconds (§5, §6).
pub mod ezo_delay_ms {
    /// Delay for most EZO commands (compensation, LED, protocol lock, address).
    pub const DEFAULT: u32 = 300;
    /// Delay for a read command.
    pub const READ: u32 = 800;
    /// Delay for a calibration command.
    pub const CALIBRATION: u32 = 1600;
}

/// One-shot soft-timer deadline for a commanded sensor read cycle (§4.3).
pub const READ_CYCLE_TIMEOUT_MS: u32 = 1000;
