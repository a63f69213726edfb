//! State machine enums and control-loop data types shared by both boards.
//!
//! Enums use `#[repr(u8)]` for a compact wire representation; the wire
//! encoding of a `GET_STATUS` reply carries these values directly.

use serde::{Deserialize, Serialize};

/// Pump board lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PumpState {
    /// Initial state after boot, before hardware is configured.
    SysInit = 0,
    /// Hardware configured, waiting for a TCP client.
    WaitForConnection = 1,
    /// Connected, no motion in progress.
    Idle = 2,
    /// A motion profile is running.
    PumpRunning = 3,
}

impl PumpState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SysInit),
            1 => Some(Self::WaitForConnection),
            2 => Some(Self::Idle),
            3 => Some(Self::PumpRunning),
            _ => None,
        }
    }
}

impl Default for PumpState {
    fn default() -> Self {
        Self::SysInit
    }
}

/// Sensor board lifecycle state.
///
/// No `Running` state and no admission restriction: probe reads and PID
/// tuning commands are always legal once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorBoardState {
    /// Initial state after boot, before probes are configured.
    SysInit = 0,
    /// Hardware configured, waiting for a TCP client.
    WaitForConnection = 1,
    /// Connected, serving requests.
    Idle = 2,
}

impl SensorBoardState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SysInit),
            1 => Some(Self::WaitForConnection),
            2 => Some(Self::Idle),
            _ => None,
        }
    }
}

impl Default for SensorBoardState {
    fn default() -> Self {
        Self::SysInit
    }
}

/// Motion ramp phase (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RampState {
    /// Accelerating from `c0`/`c1` toward `c_min`.
    RampUp = 0,
    /// Cruising at `c_min`.
    RampMax = 1,
    /// Decelerating back toward `c0`.
    RampDown = 2,
}

impl RampState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::RampUp),
            1 => Some(Self::RampMax),
            2 => Some(Self::RampDown),
            _ => None,
        }
    }
}

impl Default for RampState {
    fn default() -> Self {
        Self::RampUp
    }
}

/// Anti-windup method selection for a PID channel (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AntiWindup {
    /// Integral always updates.
    None = 0,
    /// Conditional integration: integral freezes when it would push the
    /// clamped output further into saturation.
    Clamping = 1,
}

impl AntiWindup {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Clamping),
            _ => None,
        }
    }
}

impl Default for AntiWindup {
    fn default() -> Self {
        Self::Clamping
    }
}

/// Hardware configuration for the pump board (§3). Mutable only via
/// `SetHardwareConfig`; applied atomically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Microstep mode ∈ {1,2,4,8,16,32,64,128}.
    pub step_mode: u8,
    /// Full steps per revolution, ∈ (0,1000].
    pub steps_per_rev: u16,
    /// Lead screw pitch [mm], ∈ (0,10).
    pub lead_screw_pitch_mm: f32,
    /// Max driver current [mA], ∈ [132,3000].
    pub max_driver_current_ma: u16,
    /// `true` selects the doubled PWM frequency.
    pub pwm_frequency_doubled: bool,
    /// PWM slope ∈ {0..3}.
    pub pwm_slope: u8,
    /// `true` enables PWM jitter.
    pub pwm_jitter: bool,
    /// Max pull/push acceleration [rev/s²], ∈ (0,10].
    pub max_pull_push_acc: f32,
    /// Max pull/push velocity [rev/s], ∈ (0,10].
    pub max_pull_push_vel: f32,
    /// Pumping acceleration [rev/s²], ∈ (0,10].
    pub pump_acc: f32,
    /// Pumping deceleration [rev/s²], ∈ (0,10].
    pub pump_dec: f32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            step_mode: 32,
            steps_per_rev: 400,
            lead_screw_pitch_mm: 1.5,
            max_driver_current_ma: 1000,
            pwm_frequency_doubled: false,
            pwm_slope: 2,
            pwm_jitter: true,
            max_pull_push_acc: 5.0,
            max_pull_push_vel: 5.0,
            pump_acc: 2.0,
            pump_dec: 2.0,
        }
    }
}

/// Flow configuration for a single pumping run (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Target volume to deliver [ml], ∈ (0,200].
    pub target_volume_ml: f32,
    /// Target flow rate [ml/min], ∈ (0,100].
    pub target_flow_rate_mlmin: f32,
    /// Syringe inner diameter [mm], ∈ (0,100].
    pub syringe_diameter_mm: f32,
    /// Pumping direction.
    pub direction: Direction,
}

/// Pumping direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Withdraw fluid into the syringe.
    Pull = 0,
    /// Expel fluid from the syringe.
    Push = 1,
}

impl Direction {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pull),
            1 => Some(Self::Push),
            _ => None,
        }
    }
}

/// Derived quantities for a single trapezoidal motion (§3, §4.1).
///
/// Computed once by `create_motion_profile`/`create_max_speed_motion_profile`
/// and then read-only for the duration of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    /// Commanded step count.
    pub steps: u32,
    /// Target velocity [steps/s].
    pub velocity: f32,
    /// Acceleration [steps/s²].
    pub accel: f32,
    /// Deceleration [steps/s²].
    pub decel: f32,
    /// Initial interval before the first-step correction [µs].
    pub c0: f32,
    /// First scheduled interval, `0.676 * c0` [µs].
    pub c1: f32,
    /// Minimum interval at cruise velocity [µs], floored at `10.0`.
    pub c_min: f32,
    /// Step count of the acceleration phase, `v^2 / (2*accel)`.
    pub s_accel: f32,
    /// Accel-limited crossover step count.
    pub s_lim: u32,
    /// Deceleration index origin (negative or zero).
    pub n_dec: i64,
    /// Step index at which deceleration begins.
    pub decel_start: i64,
}

/// Per-channel PID tuning parameters (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    /// Sample period [s].
    pub dt: f32,
    /// Output upper bound.
    pub max: f32,
    /// Output lower bound.
    pub min: f32,
    /// Proportional gain.
    pub kp: f32,
    /// Derivative gain.
    pub kd: f32,
    /// Integral gain.
    pub ki: f32,
    /// Feedforward gain.
    pub kf: f32,
}

impl Default for PidParams {
    fn default() -> Self {
        Self {
            dt: 0.5,
            max: 100.0,
            min: 0.0,
            kp: 1.0,
            kd: 0.0,
            ki: 0.0,
            kf: 0.0,
        }
    }
}

/// Per-channel PID runtime state (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidState {
    /// Error computed on the previous call, used for the derivative term.
    pub prev_error: f32,
    /// Running integral accumulator.
    pub integral: f32,
    /// Ramped setpoint, moves toward `target` by at most `step` per call.
    pub setpoint: f32,
    /// Maximum setpoint change per call.
    pub step: f32,
    /// Output limit factor ∈ (0,1], multiplies `max`.
    pub limit: f32,
    /// Selected anti-windup method.
    pub anti_windup: AntiWindup,
}

impl Default for PidState {
    fn default() -> Self {
        Self {
            prev_error: 0.0,
            integral: 0.0,
            setpoint: 0.0,
            step: 0.1,
            limit: 1.0,
            anti_windup: AntiWindup::Clamping,
        }
    }
}

impl PidState {
    /// Reset integral and setpoint to zero, per §4.2's reset invariant.
    pub fn reset(&mut self) {
        self.prev_error = 0.0;
        self.integral = 0.0;
        self.setpoint = 0.0;
    }
}
