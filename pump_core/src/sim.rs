//! Software-simulated hardware, grounded on `evo_hal`'s `drivers::simulation`
//! pattern: no physical bus traffic, just enough behavior to exercise the
//! dispatch loop end to end when no real board is attached. Used by the
//! `pump_board`/`sensor_board` binaries; never compiled into real firmware.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use pump_common::hal::{
    DigitalInputPin, DigitalOutputPin, DriverFaultStatus, HalError, I2cProbe, MicrosecondTimer,
    PwmOutput, StepperDriver,
};

/// A pin with no physical backing; logs at trace level.
#[derive(Default)]
pub struct SimOutputPin {
    pub name: &'static str,
    pub high: bool,
}

impl SimOutputPin {
    pub fn new(name: &'static str) -> Self {
        Self { name, high: false }
    }
}

impl DigitalOutputPin for SimOutputPin {
    fn set_high(&mut self) {
        self.high = true;
        debug!(pin = self.name, "set high");
    }

    fn set_low(&mut self) {
        self.high = false;
        debug!(pin = self.name, "set low");
    }
}

/// An input pin that never asserts, representing an idle limit switch or a
/// driver fault line with nothing latched.
#[derive(Default)]
pub struct SimInputPin;

impl DigitalInputPin for SimInputPin {
    fn is_high(&self) -> bool {
        false
    }
}

/// A PWM channel with no physical backing.
#[derive(Default)]
pub struct SimPwm {
    pub duty: f32,
}

impl PwmOutput for SimPwm {
    fn set_duty(&mut self, duty: f32) {
        self.duty = duty;
    }
}

/// A software timer with no real alarm; `schedule_after`/`cancel` just
/// record intent. Used for the pump board's motion-step timer, where the
/// binary drives `tick()` on a fixed polling cadence regardless of what the
/// timer reports.
#[derive(Default)]
pub struct SimTimer {
    pub armed_micros: Option<u32>,
}

impl MicrosecondTimer for SimTimer {
    fn schedule_after(&mut self, micros: u32) {
        self.armed_micros = Some(micros);
    }

    fn cancel(&mut self) {
        self.armed_micros = None;
    }
}

/// A software timer that actually fires: `schedule_after` spawns a thread
/// which sleeps the requested duration and then signals `on_fire`. A
/// generation counter lets `cancel` invalidate an alarm already sleeping.
/// Used for the sensor board's read-cycle deadline, where the binary has no
/// other way to learn when the 1 s window armed by `SEND_READ_CMD` elapses.
pub struct SimReadTimer {
    generation: Arc<AtomicU64>,
    on_fire: mpsc::Sender<()>,
}

impl SimReadTimer {
    pub fn new(on_fire: mpsc::Sender<()>) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            on_fire,
        }
    }
}

impl MicrosecondTimer for SimReadTimer {
    fn schedule_after(&mut self, micros: u32) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let flag = self.generation.clone();
        let tx = self.on_fire.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_micros(micros as u64));
            if flag.load(Ordering::SeqCst) == generation {
                let _ = tx.send(());
            }
        });
    }

    fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// A stepper driver stand-in that always reports a clean configuration and
/// no latched faults.
#[derive(Default)]
pub struct SimStepperDriver {
    pub enabled: bool,
    pub forward: bool,
}

impl StepperDriver for SimStepperDriver {
    fn configure(
        &mut self,
        _step_mode: u8,
        _current_limit_ma: u16,
        _pwm_frequency_doubled: bool,
        _pwm_slope: u8,
        _pwm_jitter: bool,
    ) -> Result<(), HalError> {
        Ok(())
    }

    fn set_direction(&mut self, forward: bool) {
        self.forward = forward;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn read_fault_status(&mut self) -> Result<DriverFaultStatus, HalError> {
        Ok(DriverFaultStatus::default())
    }
}

/// An EZO probe stand-in that answers every command with a canned reply.
/// Queued responses pop in FIFO order; once empty it answers a plausible
/// default for whatever command comes next.
pub struct SimProbe {
    pub address: u8,
    pub reading: f32,
    responses: VecDeque<Vec<u8>>,
}

impl SimProbe {
    pub fn new(address: u8, reading: f32) -> Self {
        Self {
            address,
            reading,
            responses: VecDeque::new(),
        }
    }

    fn default_response(&self, ascii_command: &str) -> Vec<u8> {
        let mut reply = vec![1u8];
        if ascii_command == "R" || ascii_command.is_empty() {
            reply.extend_from_slice(format!("{:.2}", self.reading).as_bytes());
        }
        reply.push(0);
        reply
    }
}

impl I2cProbe for SimProbe {
    fn command(&mut self, ascii_command: &str, _delay_ms: u32) -> Result<Vec<u8>, HalError> {
        debug!(address = self.address, command = ascii_command, "i2c command");
        Ok(self
            .responses
            .pop_front()
            .unwrap_or_else(|| self.default_response(ascii_command)))
    }

    fn write_only(&mut self, ascii_command: &str) -> Result<(), HalError> {
        debug!(address = self.address, command = ascii_command, "i2c write");
        Ok(())
    }

    fn read_only(&mut self) -> Result<Vec<u8>, HalError> {
        Ok(self
            .responses
            .pop_front()
            .unwrap_or_else(|| self.default_response("R")))
    }

    fn set_bus_address(&mut self, address: u8) {
        self.address = address;
    }
}
