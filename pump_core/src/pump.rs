//! Pump board controller: frame dispatch (C6) and FID handlers (C7),
//! grounded on `original_source/src/SyringePump.cpp`.
//!
//! The composite `pumpState`/`pumpError`/`flowConfigured`/`hardwareConfig`/
//! `flowConfig` fields the source guards with `__disable_irq`/`__enable_irq`
//! live behind one [`parking_lot::Mutex`] (`PumpRuntime`). Every mutator that
//! the source calls with a `calledFromIRQ` flag gets two entry points here
//! instead: the foreground variant logs through `tracing`, the `_irq`
//! variant — used only by the async hardware-event handlers of §4.4 — never
//! logs, since logging is blocking I/O that must not run in interrupt
//! context.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use pump_common::hal::{DigitalInputPin, DigitalOutputPin, MicrosecondTimer, StepperDriver};
use pump_common::protocol::{
    ByteReader, ByteWriter, DriverFaultWire, ErrorCode, FlowConfigWire, FrameHeader,
    HardwareConfigWire, PumpFid, PumpStatusWire, SysInfoWire, HARDWARE_CONFIG_WIRE_LEN,
    HEADER_LEN,
};
use pump_common::state::{Direction, FlowConfig, HardwareConfig, PumpState};

use pump_common::error::PumpError;

use crate::motion::{MotionController, ProfileTooFast};
use crate::stepper;

const PI: f32 = std::f32::consts::PI;

const STEP_MODES: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// Composite state the source keeps coherent under one critical section.
struct PumpRuntime {
    pump_state: PumpState,
    pump_error: PumpError,
    hardware_config: HardwareConfig,
    flow_config: Option<FlowConfig>,
    steps_per_ml: f32,
}

impl PumpRuntime {
    fn flow_configured(&self) -> bool {
        self.flow_config.is_some()
    }
}

/// System identification reported by `GET_SYS_INFO`.
pub struct SysInfo {
    /// Firmware semantic version.
    pub fw_version: String,
    /// Board identification string.
    pub board_id: String,
    /// IPv4 address, dotted-decimal.
    pub ip_addr: String,
    /// MAC address string.
    pub mac_addr: String,
}

/// Pump board controller: owns the motion generator, the stepper driver
/// handle, the limit-switch/fault input pins, and dispatches wire frames to
/// the FID handlers above.
pub struct PumpController<P, T, D> {
    runtime: Arc<Mutex<PumpRuntime>>,
    motion: MotionController<P, T>,
    driver: D,
    max_limit_pin: Box<dyn DigitalInputPin>,
    min_limit_pin: Box<dyn DigitalInputPin>,
    driver_fault_pin: Box<dyn DigitalInputPin>,
    green_led: Box<dyn DigitalOutputPin>,
    yellow_led: Box<dyn DigitalOutputPin>,
    red_led: Box<dyn DigitalOutputPin>,
    sys_info: SysInfo,
}

impl<P, T, D> PumpController<P, T, D>
where
    P: DigitalOutputPin,
    T: MicrosecondTimer,
    D: StepperDriver,
{
    /// Build a controller, wiring the motion-done callback to the shared
    /// runtime before the controller is handed back to the caller.
    pub fn new(
        step_pin: P,
        timer: T,
        driver: D,
        max_limit_pin: Box<dyn DigitalInputPin>,
        min_limit_pin: Box<dyn DigitalInputPin>,
        driver_fault_pin: Box<dyn DigitalInputPin>,
        green_led: Box<dyn DigitalOutputPin>,
        yellow_led: Box<dyn DigitalOutputPin>,
        red_led: Box<dyn DigitalOutputPin>,
        hardware_config: HardwareConfig,
        sys_info: SysInfo,
    ) -> Self {
        let runtime = Arc::new(Mutex::new(PumpRuntime {
            pump_state: PumpState::SysInit,
            pump_error: PumpError::empty(),
            hardware_config,
            flow_config: None,
            steps_per_ml: 1.0,
        }));

        let mut motion = MotionController::new(step_pin, timer);
        let done_runtime = runtime.clone();
        motion.set_on_done(move || {
            let mut rt = done_runtime.lock();
            rt.flow_config = None;
            rt.pump_state = PumpState::Idle;
        });

        Self {
            runtime,
            motion,
            driver,
            max_limit_pin,
            min_limit_pin,
            driver_fault_pin,
            green_led,
            yellow_led,
            red_led,
            sys_info,
        }
    }

    /// ISR-context tick, forwarded to the motion controller.
    pub fn tick(&mut self) {
        self.motion.tick();
    }

    // ── internal mutators (dual entry points, §5) ──────────────────────

    fn set_pump_state(&self, state: PumpState) {
        self.runtime.lock().pump_state = state;
        info!(?state, "pump state changed");
    }

    fn set_pump_state_irq(&self, state: PumpState) {
        self.runtime.lock().pump_state = state;
    }

    fn set_pump_error(&self, error: PumpError) {
        self.runtime.lock().pump_error |= error;
        warn!(?error, "pump error latched");
    }

    fn set_pump_error_irq(&self, error: PumpError) {
        self.runtime.lock().pump_error |= error;
    }

    fn unset_pump_error(&self, error: PumpError) {
        self.runtime.lock().pump_error.remove(error);
    }

    /// Stop motion and clear the active flow config. No foreground-only side
    /// effect to log, unlike `set_pump_state`/`set_pump_error`, so this has a
    /// single entry point safe to call from either context.
    fn disable_pump(&self) {
        self.motion.reset();
        self.runtime.lock().flow_config = None;
    }

    /// Reconcile the status LEDs with the current runtime state. Collapses
    /// the source's blinking tickers to a solid-state indicator — this port
    /// has no software-timer infrastructure for blink cadence, and the wire
    /// protocol carries the same state regardless of how it is displayed.
    pub fn refresh_leds(&mut self) {
        let rt = self.runtime.lock();
        match rt.pump_state {
            PumpState::SysInit => {
                self.green_led.set_low();
                self.red_led.set_high();
            }
            PumpState::WaitForConnection => {
                self.green_led.set_high();
                self.red_led.set_low();
            }
            PumpState::Idle => {
                self.green_led.set_high();
                self.red_led.set_low();
            }
            PumpState::PumpRunning => {
                self.green_led.set_high();
                self.red_led.set_low();
            }
        }
        if rt.pump_error.is_empty() {
            self.yellow_led.set_low();
        } else {
            self.yellow_led.set_high();
        }
    }

    // ── async hardware event handlers (§4.4) ────────────────────────────

    /// Max-travel limit switch asserted.
    pub fn on_max_limit_hit(&self) {
        self.disable_pump();
        self.set_pump_error_irq(PumpError::MAXLIM);
    }

    /// Max-travel limit switch released.
    pub fn on_max_limit_released(&self) {
        self.unset_pump_error(PumpError::MAXLIM);
    }

    /// Min-travel limit switch asserted.
    pub fn on_min_limit_hit(&self) {
        self.disable_pump();
        self.set_pump_error_irq(PumpError::MINLIM);
    }

    /// Min-travel limit switch released.
    pub fn on_min_limit_released(&self) {
        self.unset_pump_error(PumpError::MINLIM);
    }

    /// Stepper driver fault edge.
    pub fn on_driver_fault(&self) {
        self.disable_pump();
        self.set_pump_error_irq(PumpError::DRIVER_ERROR);
    }

    // ── lifecycle ────────────────────────────────────────────────────────

    /// Apply the default hardware configuration at boot, mirroring
    /// `initHardware()`.
    pub fn init_hardware(&mut self) {
        let config = { self.runtime.lock().hardware_config };
        self.apply_hardware_config(&config);
        self.set_pump_state(PumpState::WaitForConnection);
        if self.max_limit_pin.is_high() {
            self.set_pump_error(PumpError::MAXLIM);
        } else if self.min_limit_pin.is_high() {
            self.set_pump_error(PumpError::MINLIM);
        }
        if self.driver_fault_pin.is_high() {
            self.set_pump_error(PumpError::DRIVER_ERROR);
        }
    }

    /// Called when a client socket connects, admitting command traffic.
    pub fn on_client_connected(&mut self) {
        self.set_pump_state(PumpState::Idle);
    }

    /// Called when a client socket disconnects: stop the pump, disable the
    /// driver, and reinitialise hardware for the next connection.
    pub fn on_client_disconnected(&mut self) {
        self.disable_pump();
        self.driver.set_enabled(false);
        let config = { self.runtime.lock().hardware_config };
        self.apply_hardware_config(&config);
        self.set_pump_state(PumpState::WaitForConnection);
    }

    fn apply_hardware_config(&mut self, config: &HardwareConfig) {
        let direction = {
            let rt = self.runtime.lock();
            rt.flow_config.map(|f| f.direction).unwrap_or(Direction::Pull)
        };
        self.driver.set_direction(direction == Direction::Push);
        match stepper::apply_config(&mut self.driver, config) {
            Ok(()) => self.unset_pump_error(PumpError::STEPDRV_NOT_CONFIGURED),
            Err(_) => self.set_pump_error(PumpError::STEPDRV_NOT_CONFIGURED),
        }
    }

    // ── wire dispatch (C6) ───────────────────────────────────────────────

    /// Decode a complete request frame (header + body) and produce the
    /// encoded reply frame.
    pub fn dispatch(&mut self, request: &[u8]) -> Vec<u8> {
        let header = match FrameHeader::decode(request) {
            Ok(h) => h,
            Err(_) => return header_only(PumpFid::GetStatus as u16, ErrorCode::InvalidParameter),
        };

        let fid = match PumpFid::from_u16(header.fid) {
            Some(fid) => fid,
            None => return header_only(header.fid, ErrorCode::NotSupported),
        };

        let (state, error_empty) = {
            let rt = self.runtime.lock();
            (rt.pump_state, rt.pump_error.is_empty())
        };
        let admitted = !(state == PumpState::PumpRunning
            && fid != PumpFid::StopPump
            && fid != PumpFid::GetStatus
            && error_empty);
        if !admitted {
            return header_only(header.fid, ErrorCode::PumpRunning);
        }

        let body = &request[HEADER_LEN.min(request.len())..];
        match fid {
            PumpFid::GetStatus => self.get_status(),
            PumpFid::StopPump => self.stop_pump(),
            PumpFid::StartPump => self.start_pump(),
            PumpFid::SetHardwareConfig => self.set_hardware_config(body),
            PumpFid::SetFlowConfig => self.set_flow_config(body),
            PumpFid::GetHardwareConfig => self.get_hardware_config(),
            PumpFid::MaxPull => self.max_pull(),
            PumpFid::MaxPush => self.max_push(),
            PumpFid::DisableMotorHold => self.disable_motor_hold(),
            PumpFid::GetStepDrvError => self.get_step_drv_error(),
            PumpFid::GetFlowConfig => self.get_flow_config(),
            PumpFid::ResetPump => self.reset_pump(),
            PumpFid::GetPumpError => self.get_pump_error(),
            PumpFid::GetSysInfo => self.get_sys_info(),
            PumpFid::IdentifyItself => self.identify_itself(),
        }
    }

    fn get_status(&self) -> Vec<u8> {
        let rt = self.runtime.lock();
        let c = self.motion.c();
        let flow_rate = if rt.pump_state == PumpState::PumpRunning && c > 0.0 {
            ((1_000_000.0 / c) / rt.steps_per_ml) * 60.0
        } else {
            0.0
        };
        let body = PumpStatusWire {
            pump_state: rt.pump_state as u8,
            pump_error: rt.pump_error.bits(),
            supplied_volume_ml: self.motion.steps_performed() as f32 / rt.steps_per_ml,
            flow_rate_mlmin: flow_rate,
        };
        let mut w = ByteWriter::new();
        body.encode(&mut w);
        frame(PumpFid::GetStatus as u16, ErrorCode::Ok, w)
    }

    fn stop_pump(&self) -> Vec<u8> {
        self.disable_pump();
        self.set_pump_state(PumpState::Idle);
        header_only(PumpFid::StopPump as u16, ErrorCode::Ok)
    }

    fn start_pump(&mut self) -> Vec<u8> {
        let (flow_config, hardware_config, pump_error) = {
            let rt = self.runtime.lock();
            (rt.flow_config, rt.hardware_config, rt.pump_error)
        };
        let Some(flow_config) = flow_config else {
            return header_only(PumpFid::StartPump as u16, ErrorCode::FlowNotConfigured);
        };

        let limit_blocks = match flow_config.direction {
            Direction::Push => pump_error.contains(PumpError::MAXLIM),
            Direction::Pull => pump_error.contains(PumpError::MINLIM),
        };
        if limit_blocks {
            return header_only(PumpFid::StartPump as u16, ErrorCode::LimitSwActive);
        }
        if pump_error.contains(PumpError::DRIVER_ERROR) {
            return header_only(PumpFid::StartPump as u16, ErrorCode::StepDrvErr);
        }

        let syringe_area_mm2 = PI * (flow_config.syringe_diameter_mm / 2.0).powi(2);
        let steps_per_rev = hardware_config.step_mode as f32 * hardware_config.steps_per_rev as f32;
        let steps_per_ml = ((1000.0 / syringe_area_mm2) * steps_per_rev) / hardware_config.lead_screw_pitch_mm;
        let steps = flow_config.target_volume_ml * steps_per_ml;
        let steps_per_sec = (flow_config.target_flow_rate_mlmin / 60.0) * steps_per_ml;
        let accel = hardware_config.pump_acc * steps_per_rev;
        let decel = hardware_config.pump_dec * steps_per_rev;

        self.runtime.lock().steps_per_ml = steps_per_ml;
        self.motion.configure(steps.round() as u32, steps_per_sec, accel, decel);

        match self.motion.create_motion_profile() {
            Ok(()) => {
                self.driver.set_enabled(true);
                self.motion.run();
                self.set_pump_state(PumpState::PumpRunning);
                header_only(PumpFid::StartPump as u16, ErrorCode::Ok)
            }
            Err(ProfileTooFast) => header_only(PumpFid::StartPump as u16, ErrorCode::SwitchingOverMax),
        }
    }

    fn set_hardware_config(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = HardwareConfigWire::decode(&mut r) else {
            return header_only(PumpFid::SetHardwareConfig as u16, ErrorCode::InvalidParameter);
        };
        if !valid_hardware_config(&wire) {
            return header_only(PumpFid::SetHardwareConfig as u16, ErrorCode::InvalidParameter);
        }

        let config = HardwareConfig {
            step_mode: wire.step_mode,
            steps_per_rev: wire.steps_per_rev,
            lead_screw_pitch_mm: wire.lead_screw_pitch_mm,
            max_driver_current_ma: wire.max_driver_current_ma,
            pwm_frequency_doubled: wire.pwm_frequency == 1,
            pwm_slope: wire.pwm_slope,
            pwm_jitter: wire.pwm_jitter == 1,
            max_pull_push_acc: wire.max_pull_push_acc,
            max_pull_push_vel: wire.max_pull_push_vel,
            pump_acc: wire.pump_acc,
            pump_dec: wire.pump_dec,
        };
        self.runtime.lock().hardware_config = config;
        self.apply_hardware_config(&config);

        if self.runtime.lock().pump_error.contains(PumpError::STEPDRV_NOT_CONFIGURED) {
            header_only(PumpFid::SetHardwareConfig as u16, ErrorCode::StepDrvNotConfigured)
        } else {
            header_only(PumpFid::SetHardwareConfig as u16, ErrorCode::Ok)
        }
    }

    fn set_flow_config(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = FlowConfigWire::decode(&mut r) else {
            return header_only(PumpFid::SetFlowConfig as u16, ErrorCode::InvalidParameter);
        };
        if !valid_flow_config(&wire) {
            return header_only(PumpFid::SetFlowConfig as u16, ErrorCode::InvalidParameter);
        }
        let Some(direction) = Direction::from_u8(wire.direction) else {
            return header_only(PumpFid::SetFlowConfig as u16, ErrorCode::InvalidParameter);
        };

        let config = FlowConfig {
            target_volume_ml: wire.target_volume_ml,
            target_flow_rate_mlmin: wire.target_flow_rate_mlmin,
            syringe_diameter_mm: wire.syringe_diameter_mm,
            direction,
        };
        self.runtime.lock().flow_config = Some(config);
        let hardware_config = self.runtime.lock().hardware_config;
        self.apply_hardware_config(&hardware_config);

        if self.runtime.lock().pump_error.contains(PumpError::STEPDRV_NOT_CONFIGURED) {
            header_only(PumpFid::SetFlowConfig as u16, ErrorCode::StepDrvNotConfigured)
        } else {
            header_only(PumpFid::SetFlowConfig as u16, ErrorCode::Ok)
        }
    }

    fn get_hardware_config(&self) -> Vec<u8> {
        let hw = self.runtime.lock().hardware_config;
        let wire = HardwareConfigWire {
            step_mode: hw.step_mode,
            steps_per_rev: hw.steps_per_rev,
            lead_screw_pitch_mm: hw.lead_screw_pitch_mm,
            max_driver_current_ma: hw.max_driver_current_ma,
            pwm_frequency: hw.pwm_frequency_doubled as u8,
            pwm_slope: hw.pwm_slope,
            pwm_jitter: hw.pwm_jitter as u8,
            max_pull_push_acc: hw.max_pull_push_acc,
            max_pull_push_vel: hw.max_pull_push_vel,
            pump_acc: hw.pump_acc,
            pump_dec: hw.pump_dec,
        };
        let mut w = ByteWriter::new();
        wire.encode(&mut w);
        let _ = HARDWARE_CONFIG_WIRE_LEN;
        frame(PumpFid::GetHardwareConfig as u16, ErrorCode::Ok, w)
    }

    fn get_flow_config(&self) -> Vec<u8> {
        let flow = self.runtime.lock().flow_config;
        let flow = flow.unwrap_or(FlowConfig {
            target_volume_ml: 0.0,
            target_flow_rate_mlmin: 0.0,
            syringe_diameter_mm: 0.0,
            direction: Direction::Pull,
        });
        let wire = FlowConfigWire {
            target_volume_ml: flow.target_volume_ml,
            target_flow_rate_mlmin: flow.target_flow_rate_mlmin,
            syringe_diameter_mm: flow.syringe_diameter_mm,
            direction: flow.direction as u8,
        };
        let mut w = ByteWriter::new();
        wire.encode(&mut w);
        frame(PumpFid::GetFlowConfig as u16, ErrorCode::Ok, w)
    }

    fn max_pull(&mut self) -> Vec<u8> {
        self.max_travel(Direction::Pull)
    }

    fn max_push(&mut self) -> Vec<u8> {
        self.max_travel(Direction::Push)
    }

    fn max_travel(&mut self, direction: Direction) -> Vec<u8> {
        let fid = match direction {
            Direction::Pull => PumpFid::MaxPull,
            Direction::Push => PumpFid::MaxPush,
        } as u16;

        let (pump_error, hardware_config) = {
            let rt = self.runtime.lock();
            (rt.pump_error, rt.hardware_config)
        };
        if pump_error.contains(PumpError::DRIVER_ERROR) {
            return header_only(fid, ErrorCode::StepDrvErr);
        }
        if pump_error.contains(PumpError::STEPDRV_NOT_CONFIGURED) {
            return header_only(fid, ErrorCode::StepDrvNotConfigured);
        }
        let blocked = match direction {
            Direction::Pull => pump_error.contains(PumpError::MINLIM),
            Direction::Push => pump_error.contains(PumpError::MAXLIM),
        };
        if blocked {
            return header_only(fid, ErrorCode::LimitSwActive);
        }

        self.driver.set_direction(direction == Direction::Push);
        let steps_per_rev = hardware_config.step_mode as f32 * hardware_config.steps_per_rev as f32;
        let accel = hardware_config.max_pull_push_acc * steps_per_rev;
        self.motion
            .configure(0, steps_per_rev * hardware_config.max_pull_push_vel, accel, accel);
        self.motion.create_max_speed_motion_profile();
        self.driver.set_enabled(true);
        self.motion.run();
        self.set_pump_state(PumpState::PumpRunning);
        header_only(fid, ErrorCode::Ok)
    }

    fn disable_motor_hold(&mut self) -> Vec<u8> {
        self.driver.set_enabled(false);
        header_only(PumpFid::DisableMotorHold as u16, ErrorCode::Ok)
    }

    fn get_step_drv_error(&mut self) -> Vec<u8> {
        let status = self.driver.read_fault_status().unwrap_or_default();
        let wire = DriverFaultWire {
            openx: status.openx,
            openy: status.openy,
            wd: status.wd,
            cpfail: status.cpfail,
            tw: status.tw,
            ovcx: status.ovcx,
            ovcy: status.ovcy,
            tsd: status.tsd,
        };
        let mut w = ByteWriter::new();
        wire.encode(&mut w);
        frame(PumpFid::GetStepDrvError as u16, ErrorCode::Ok, w)
    }

    fn reset_pump(&mut self) -> Vec<u8> {
        self.disable_pump();
        self.unset_pump_error(PumpError::MAXLIM);
        self.unset_pump_error(PumpError::MINLIM);
        self.unset_pump_error(PumpError::DRIVER_ERROR);
        self.unset_pump_error(PumpError::STEPDRV_NOT_CONFIGURED);

        let config = { self.runtime.lock().hardware_config };
        self.apply_hardware_config(&config);
        self.set_pump_state(PumpState::Idle);

        if self.max_limit_pin.is_high() {
            self.set_pump_error(PumpError::MAXLIM);
        } else if self.min_limit_pin.is_high() {
            self.set_pump_error(PumpError::MINLIM);
        }
        if self.driver_fault_pin.is_high() {
            self.set_pump_error(PumpError::DRIVER_ERROR);
        }

        header_only(PumpFid::ResetPump as u16, ErrorCode::Ok)
    }

    fn get_pump_error(&self) -> Vec<u8> {
        let bits = self.runtime.lock().pump_error.bits();
        let mut w = ByteWriter::new();
        w.u8(bits);
        frame(PumpFid::GetPumpError as u16, ErrorCode::Ok, w)
    }

    fn get_sys_info(&self) -> Vec<u8> {
        let wire = SysInfoWire {
            fw_version: self.sys_info.fw_version.clone(),
            board_id: self.sys_info.board_id.clone(),
            ip_addr: self.sys_info.ip_addr.clone(),
            mac_addr: self.sys_info.mac_addr.clone(),
        };
        let mut w = ByteWriter::new();
        wire.encode(&mut w);
        frame(PumpFid::GetSysInfo as u16, ErrorCode::Ok, w)
    }

    fn identify_itself(&mut self) -> Vec<u8> {
        // The source blinks the green LED for ~1.2s here; this port leaves
        // the blink cadence to `refresh_leds` and simply acknowledges.
        header_only(PumpFid::IdentifyItself as u16, ErrorCode::Ok)
    }
}

fn valid_hardware_config(wire: &HardwareConfigWire) -> bool {
    if !(132..=3000).contains(&wire.max_driver_current_ma) {
        return false;
    }
    if wire.lead_screw_pitch_mm <= 0.0 || wire.lead_screw_pitch_mm >= 10.0 {
        return false;
    }
    if wire.steps_per_rev == 0 || wire.steps_per_rev > 1000 {
        return false;
    }
    if wire.pwm_frequency > 1 || wire.pwm_jitter > 1 || wire.pwm_slope > 3 {
        return false;
    }
    for v in [
        wire.max_pull_push_acc,
        wire.max_pull_push_vel,
        wire.pump_acc,
        wire.pump_dec,
    ] {
        if v <= 0.0 || v > 10.0 {
            return false;
        }
    }
    STEP_MODES.contains(&wire.step_mode)
}

fn valid_flow_config(wire: &FlowConfigWire) -> bool {
    if wire.target_flow_rate_mlmin <= 0.0 || wire.target_flow_rate_mlmin > 100.0 {
        return false;
    }
    if wire.target_volume_ml <= 0.0 || wire.target_volume_ml > 200.0 {
        return false;
    }
    if wire.syringe_diameter_mm <= 0.0 || wire.syringe_diameter_mm > 100.0 {
        return false;
    }
    wire.direction == 0 || wire.direction == 1
}

fn header_only(fid: u16, error: ErrorCode) -> Vec<u8> {
    FrameHeader::reply(fid, error.code()).encode().to_vec()
}

fn frame(fid: u16, error: ErrorCode, body: ByteWriter) -> Vec<u8> {
    let body = body.finish();
    let header = FrameHeader {
        packet_length: (HEADER_LEN + body.len()) as u16,
        fid,
        error: error.code(),
        _reserved: 0,
    };
    let mut out = header.encode().to_vec();
    out.extend_from_slice(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pump_common::hal::{DriverFaultStatus, HalError};

    #[derive(Default)]
    struct FakePin {
        high: bool,
    }
    impl DigitalOutputPin for FakePin {
        fn set_high(&mut self) {
            self.high = true;
        }
        fn set_low(&mut self) {
            self.high = false;
        }
    }

    struct FixedInput(bool);
    impl DigitalInputPin for FixedInput {
        fn is_high(&self) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct FakeTimer;
    impl MicrosecondTimer for FakeTimer {
        fn schedule_after(&mut self, _micros: u32) {}
        fn cancel(&mut self) {}
    }

    struct FakeDriver {
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

    fn controller() -> PumpController<FakePin, FakeTimer, FakeDriver> {
        PumpController::new(
            FakePin::default(),
            FakeTimer,
            FakeDriver {
                enabled: false,
                forward: false,
            },
            Box::new(FixedInput(false)),
            Box::new(FixedInput(false)),
            Box::new(FixedInput(false)),
            Box::new(FakePin::default()),
            Box::new(FakePin::default()),
            Box::new(FakePin::default()),
            HardwareConfig::default(),
            SysInfo {
                fw_version: "1.0.0".into(),
                board_id: "pump-test".into(),
                ip_addr: "10.0.0.5".into(),
                mac_addr: "00:11:22:33:44:55".into(),
            },
        )
    }

    fn request(fid: PumpFid, body: &[u8]) -> Vec<u8> {
        let header = FrameHeader::new(fid as u16, body.len() as u16);
        let mut out = header.encode().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn start_pump_without_flow_config_is_rejected() {
        let mut pc = controller();
        pc.init_hardware();
        let reply = pc.dispatch(&request(PumpFid::StartPump, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::FlowNotConfigured.code());
    }

    #[test]
    fn set_flow_config_then_start_pump_runs() {
        let mut pc = controller();
        pc.init_hardware();

        let flow = FlowConfigWire {
            target_volume_ml: 1.0,
            target_flow_rate_mlmin: 10.0,
            syringe_diameter_mm: 10.0,
            direction: 0,
        };
        let mut w = ByteWriter::new();
        flow.encode(&mut w);
        let reply = pc.dispatch(&request(PumpFid::SetFlowConfig, &w.finish()));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());

        let reply = pc.dispatch(&request(PumpFid::StartPump, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());
        assert_eq!(pc.runtime.lock().pump_state, PumpState::PumpRunning);
    }

    #[test]
    fn admission_policy_blocks_non_exempt_fids_while_running() {
        let mut pc = controller();
        pc.init_hardware();
        pc.set_pump_state(PumpState::PumpRunning);

        let reply = pc.dispatch(&request(PumpFid::GetHardwareConfig, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::PumpRunning.code());

        let reply = pc.dispatch(&request(PumpFid::GetStatus, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());
    }

    #[test]
    fn admission_policy_admits_everything_once_an_error_is_latched() {
        let mut pc = controller();
        pc.init_hardware();
        pc.set_pump_state(PumpState::PumpRunning);
        pc.set_pump_error(PumpError::DRIVER_ERROR);

        let reply = pc.dispatch(&request(PumpFid::GetHardwareConfig, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());
    }

    #[test]
    fn out_of_range_fid_is_not_supported() {
        let mut pc = controller();
        let header = FrameHeader::new(999, 0);
        let reply = pc.dispatch(&header.encode());
        let decoded = FrameHeader::decode(&reply).unwrap();
        assert_eq!(decoded.error, ErrorCode::NotSupported.code());
    }

    #[test]
    fn reset_pump_clears_all_latched_errors() {
        let mut pc = controller();
        pc.init_hardware();
        pc.set_pump_error(PumpError::MAXLIM);
        pc.set_pump_error(PumpError::DRIVER_ERROR);
        let reply = pc.dispatch(&request(PumpFid::ResetPump, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());
        assert!(pc.runtime.lock().pump_error.is_empty());
    }

    #[test]
    fn invalid_hardware_config_step_mode_is_rejected() {
        let mut pc = controller();
        let wire = HardwareConfigWire {
            step_mode: 7,
            steps_per_rev: 400,
            lead_screw_pitch_mm: 1.5,
            max_driver_current_ma: 1000,
            pwm_frequency: 0,
            pwm_slope: 0,
            pwm_jitter: 0,
            max_pull_push_acc: 1.0,
            max_pull_push_vel: 1.0,
            pump_acc: 1.0,
            pump_dec: 1.0,
        };
        let mut w = ByteWriter::new();
        wire.encode(&mut w);
        let reply = pc.dispatch(&request(PumpFid::SetHardwareConfig, &w.finish()));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::InvalidParameter.code());
    }

    #[test]
    fn max_pull_blocked_by_min_limit_switch() {
        let mut pc = controller();
        pc.init_hardware();
        pc.set_pump_error(PumpError::MINLIM);
        let reply = pc.dispatch(&request(PumpFid::MaxPull, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::LimitSwActive.code());
    }
}
