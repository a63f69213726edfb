//! Trapezoidal stepper motion profile generator (C4), the hard real-time
//! core of the firmware.
//!
//! Ground truth for the recurrence and state machine is the mbed
//! `MotionController` this was ported from: the Austin/Eiderman integer
//! recurrence `c' = c - (2c)/(4n+1)`, a single-precision `alpha = 1.0`
//! reference angle, and a timer reschedule that only fires on a
//! whole-microsecond change in `c`.
//!
//! `tick()` is the ISR-context entry point: it must never allocate, lock or
//! block. `steps_performed`, `c` and `state` are exposed to the foreground
//! through atomics so a `GET_STATUS` poll never blocks on the ISR; readers
//! accept a one-tick-stale view, per the concurrency model's no-lock
//! contract for these three fields.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use pump_common::hal::{DigitalOutputPin, MicrosecondTimer};
use pump_common::state::{MotionProfile, RampState};

/// Reference angle used by the step-interval recurrence; always `1.0` in
/// the source firmware.
const ALPHA: f32 = 1.0;

/// Returned by [`MotionController::create_motion_profile`] when the
/// requested velocity would need a cruise interval below `c_min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileTooFast;

/// Raw motion parameters as supplied by `configure` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    /// Commanded step count.
    pub steps: u32,
    /// Target velocity [steps/s].
    pub speed: f32,
    /// Acceleration [steps/s²].
    pub accel: f32,
    /// Deceleration [steps/s²].
    pub decel: f32,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            steps: 0,
            speed: 1.0,
            accel: 1.0,
            decel: 1.0,
        }
    }
}

/// Interrupt-driven trapezoidal motion generator.
///
/// `P` is the step output pin, `T` the microsecond timer the ISR reschedules
/// itself through. Both are supplied by the binary wiring real (or test
/// double) hardware to this controller.
pub struct MotionController<P, T> {
    step_pin: P,
    timer: T,
    params: MotionParams,
    c0: f32,
    c_min: f32,
    decel_n: i64,
    decel_start: i64,
    n: i64,
    steps: i64,
    state: AtomicU8,
    c_bits: AtomicU32,
    steps_performed: AtomicU32,
    stop: AtomicBool,
    on_done: Option<Box<dyn FnMut() + Send>>,
}

impl<P: DigitalOutputPin, T: MicrosecondTimer> MotionController<P, T> {
    /// Construct a controller over the given step pin and timer, idle until
    /// `configure`/`create_motion_profile`/`run` are called.
    pub fn new(step_pin: P, timer: T) -> Self {
        Self {
            step_pin,
            timer,
            params: MotionParams::default(),
            c0: 0.0,
            c_min: 10.0,
            decel_n: 0,
            decel_start: 0,
            n: 1,
            steps: 0,
            state: AtomicU8::new(RampState::RampUp as u8),
            c_bits: AtomicU32::new(0f32.to_bits()),
            steps_performed: AtomicU32::new(0),
            stop: AtomicBool::new(true),
            on_done: None,
        }
    }

    /// Install the single-shot completion callback, invoked from ISR
    /// context when the profile completes naturally.
    pub fn set_on_done(&mut self, cb: impl FnMut() + Send + 'static) {
        self.on_done = Some(Box::new(cb));
    }

    /// Store motion parameters. Does not start motion.
    pub fn configure(&mut self, steps: u32, steps_per_sec: f32, accel: f32, decel: f32) {
        self.params = MotionParams {
            steps,
            speed: steps_per_sec,
            accel,
            decel,
        };
    }

    fn compute_common(&mut self) {
        let p = self.params;
        self.c0 = 1_000_000.0 * ((2.0 * ALPHA) / p.accel).sqrt();
        self.n = 1;
        self.set_c(self.c0 * 0.676);
        self.steps_performed.store(0, Ordering::Relaxed);
        self.steps = p.steps as i64;
    }

    /// Compute all derived quantities for a bounded-length move. Returns
    /// [`ProfileTooFast`] when the resulting `c_min` would fall below 10 µs;
    /// `c_min` is still floored to 10 in that case so a caller that ignores
    /// the error does not schedule an impossibly short interval.
    pub fn create_motion_profile(&mut self) -> Result<(), ProfileTooFast> {
        self.compute_common();
        let p = self.params;

        let max_s_lim = (p.speed * p.speed) / (2.0 * ALPHA * p.accel);
        self.c_min = (1.0 / p.speed) * 1_000_000.0;

        let accel_lim = ((self.steps as f32 * p.decel) / (p.accel + p.decel)) as i64;
        self.decel_n = if max_s_lim < accel_lim as f32 {
            (-(max_s_lim) * (p.accel / p.decel)) as i64
        } else {
            -(self.steps - accel_lim)
        };
        self.decel_start = self.decel_n + self.steps;

        if self.c_min < 10.0 {
            self.c_min = 10.0;
            Err(ProfileTooFast)
        } else {
            Ok(())
        }
    }

    /// Compute a profile with an effectively unbounded step count: motion
    /// only terminates via `reset()` or an external fault hook, used by
    /// `MAX_PULL`/`MAX_PUSH` to run until a limit switch fires.
    pub fn create_max_speed_motion_profile(&mut self) {
        self.compute_common();
        let p = self.params;
        self.c_min = ((1.0 / p.speed) * 1_000_000.0).max(10.0);
        self.steps = 2_000_000_000;
        self.decel_n = 1;
        self.decel_start = i64::from(i32::MAX);
    }

    /// Clear the stop flag, enter `RAMP_UP`, and arm the timer for the
    /// first pulse.
    pub fn run(&mut self) {
        self.stop.store(false, Ordering::Relaxed);
        self.set_state(RampState::RampUp);
        self.timer.schedule_after((self.c() + 0.5) as u32);
    }

    /// Request a stop. The next ISR tick tears down the timer without
    /// invoking the completion callback. Safe to call from either context.
    pub fn reset(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Current ramp state (one-tick-stale if read concurrently with a tick).
    pub fn ramp_state(&self) -> RampState {
        RampState::from_u8(self.state.load(Ordering::Relaxed)).expect("valid RampState bits")
    }

    fn set_state(&self, s: RampState) {
        self.state.store(s as u8, Ordering::Relaxed);
    }

    /// Current step interval in microseconds.
    pub fn c(&self) -> f32 {
        f32::from_bits(self.c_bits.load(Ordering::Relaxed))
    }

    fn set_c(&self, v: f32) {
        self.c_bits.store(v.to_bits(), Ordering::Relaxed);
    }

    /// Steps completed so far this run.
    pub fn steps_performed(&self) -> u32 {
        self.steps_performed.load(Ordering::Relaxed)
    }

    /// `true` once `reset()` has been called and no subsequent `run()`.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// ISR-context tick: advance one step pulse. Must be called by the
    /// timer's alarm callback; never call this from foreground code.
    pub fn tick(&mut self) {
        self.step_pin.set_high();

        let performed = self.steps_performed.fetch_add(1, Ordering::Relaxed) + 1;
        let stopped = self.stop.load(Ordering::Relaxed);

        if (performed as i64) < self.steps && !stopped {
            let c = self.c();
            match self.ramp_state() {
                RampState::RampUp => {
                    let mut new_c = c - (c * 2.0) / (4.0 * self.n as f32 + 1.0);
                    if performed as i64 >= self.decel_start {
                        self.set_state(RampState::RampDown);
                        self.n = self.decel_n;
                    } else if new_c <= self.c_min {
                        self.set_state(RampState::RampMax);
                        new_c = self.c_min;
                    }
                    if (new_c as i32) != (c as i32) {
                        self.timer.schedule_after((new_c + 0.5) as u32);
                    }
                    self.set_c(new_c);
                }
                RampState::RampMax => {
                    if performed as i64 >= self.decel_start {
                        self.set_state(RampState::RampDown);
                        self.n = self.decel_n;
                    }
                }
                RampState::RampDown => {
                    let new_c = c - (c * 2.0) / (4.0 * self.n as f32 + 1.0);
                    if (new_c as i32) != (c as i32) {
                        self.timer.schedule_after((new_c + 0.5) as u32);
                    }
                    self.set_c(new_c);
                }
            }
            self.n += 1;
        } else {
            self.timer.cancel();
            if !stopped {
                if let Some(cb) = self.on_done.as_mut() {
                    cb();
                }
            }
        }

        self.step_pin.set_low();
    }
}

/// Derive the full [`MotionProfile`] snapshot for reporting/testing, without
/// mutating the live controller.
pub fn preview_profile(params: MotionParams) -> MotionProfile {
    let c0 = 1_000_000.0 * ((2.0 * ALPHA) / params.accel).sqrt();
    let c1 = c0 * 0.676;
    let steps = params.steps as i64;
    let s_accel = (params.speed * params.speed) / (2.0 * ALPHA * params.accel);
    let mut c_min = (1.0 / params.speed) * 1_000_000.0;
    let s_lim = ((steps as f32 * params.decel) / (params.accel + params.decel)) as i64;
    let n_dec = if s_accel < s_lim as f32 {
        (-(s_accel) * (params.accel / params.decel)) as i64
    } else {
        -(steps - s_lim)
    };
    let decel_start = n_dec + steps;
    if c_min < 10.0 {
        c_min = 10.0;
    }
    MotionProfile {
        steps: params.steps,
        velocity: params.speed,
        accel: params.accel,
        decel: params.decel,
        c0,
        c1,
        c_min,
        s_accel,
        s_lim: s_lim.max(0) as u32,
        n_dec,
        decel_start,
    }
}
