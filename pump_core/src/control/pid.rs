//! Per-channel setpoint-ramped PID controller driving a PWM heater output
//! (C5).
//!
//! Grounded on the mbed `PID::calculate` this was ported from. One semantic
//! correction versus that source: its `CLAMPING` branch never updated the
//! integral when the computed output was *not* saturated, which both
//! contradicts the textual algorithm description and breaks the testable
//! invariant that the integral only freezes when saturated against the
//! error's own direction. This port adds the missing unconditional-update
//! arm for the in-range case.

use pump_common::hal::PwmOutput;
use pump_common::state::{AntiWindup, PidParams, PidState};

/// Run one control step: ramp the setpoint, compute P/I/D/F, apply the
/// selected anti-windup method, clamp, and write the PWM duty cycle.
///
/// `reinit` snaps the ramped setpoint to `measured` before ramping — used
/// for a bumpless start on the first call after a connection or reset.
pub fn compute(
    params: &PidParams,
    state: &mut PidState,
    target: f32,
    measured: f32,
    reinit: bool,
    pwm: &mut impl PwmOutput,
) -> f32 {
    if params.dt == 0.0 {
        return 0.0;
    }

    if reinit {
        // Bumpless start: snap straight to the measured value and skip this
        // call's ramp step, so the very first sample after (re)connect reads
        // back a zero error instead of jumping toward `target` immediately.
        state.setpoint = measured;
    } else {
        // Setpoint ramping: move at most `step` per call, snap once within range.
        if state.setpoint + state.step < target {
            state.setpoint += state.step;
        } else if state.setpoint - state.step >= target {
            state.setpoint -= state.step;
        } else {
            state.setpoint = target;
        }
    }

    let error = state.setpoint - measured;
    let p_out = params.kp * error;

    let tentative_integral = state.integral + error * params.dt;
    let i_out = params.ki * tentative_integral;

    let derivative = (error - state.prev_error) / params.dt;
    let d_out = params.kd * derivative;

    let f_out = params.kf * state.setpoint;

    let mut output = p_out + i_out + d_out + f_out;
    let upper = params.max * state.limit;

    match state.anti_windup {
        AntiWindup::None => {
            state.integral = tentative_integral;
        }
        AntiWindup::Clamping => {
            if output > upper {
                if error < 0.0 {
                    state.integral = tentative_integral;
                }
            } else if output < params.min {
                if error > 0.0 {
                    state.integral = tentative_integral;
                }
            } else {
                state.integral = tentative_integral;
            }
        }
    }

    if output > upper {
        output = upper;
    } else if output < params.min {
        output = params.min;
    }

    state.prev_error = error;

    let span = params.max - params.min;
    let duty = if span > 0.0 { (output - params.min) / span } else { 0.0 };
    pwm.set_duty(duty.clamp(0.0, 1.0));

    output
}

/// Reset a channel: zero integral/setpoint and drive the PWM output to 0,
/// per §4.2's reset invariant.
pub fn reset(state: &mut PidState, pwm: &mut impl PwmOutput) {
    state.reset();
    pwm.set_duty(0.0);
}
