//! Sensor board controller: frame dispatch and FID handlers (C8), grounded
//! on `original_source/src/EZOSensors.cpp`.
//!
//! That source implements only six FIDs (`GET_STATUS` through
//! `GET_SYSTEM_INFO`); the temperature-control FIDs the wire protocol also
//! names are supplemented here from the PID module and the EZO command set.
//! Unlike the pump board there is no admission policy: every FID is legal
//! once connected, matching the source's flat dispatch with no state check.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use pump_common::consts::READ_CYCLE_TIMEOUT_MS;
use pump_common::hal::{DigitalOutputPin, HalError, I2cProbe, MicrosecondTimer, PwmOutput};
use pump_common::protocol::{
    ByteReader, ByteWriter, CalibrateWire, ChannelRequestWire, ErrorCode, FrameHeader,
    PidLimitWire, PidParamsWire, ProbeSelect, ProbeSelectWire, SensorDataWire, SensorFid,
    SensorStatusHeaderWire, SensorTextWire, SetAddressWire, SetPidLimitWire, SetPidMethodWire,
    SetPidStepWire, SetPidWire, SetTempSetpointWire, SysInfoWire, HEADER_LEN, PID_CHANNEL_COUNT,
};
use pump_common::state::{AntiWindup, PidParams, PidState, SensorBoardState};

use crate::control::pid;
use crate::ezo;

/// System identification reported by `GET_SYSTEM_INFO`.
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

/// Composite state shared between the dispatch (foreground) thread and the
/// read-cycle deadline (ISR) entry point.
struct SensorRuntime {
    board_state: SensorBoardState,
    reading_pending: bool,
    /// Set once on the first commanded-read deadline and never cleared,
    /// mirroring the source's `_CMDRead` flag.
    first_read_completed: bool,
    ph_reading: Option<f32>,
    temp_readings: [Option<f32>; PID_CHANNEL_COUNT],
    pid_targets: [f32; PID_CHANNEL_COUNT],
    pid_params: [PidParams; PID_CHANNEL_COUNT],
    pid_state: [PidState; PID_CHANNEL_COUNT],
}

/// Owns the pH probe, three temperature probes each driving one PID-tuned
/// heater channel, and dispatches wire frames to the FID handlers above.
pub struct SensorController<T> {
    runtime: Arc<Mutex<SensorRuntime>>,
    ph_probe: Box<dyn I2cProbe>,
    temp_probes: [Box<dyn I2cProbe>; PID_CHANNEL_COUNT],
    heaters: [Box<dyn PwmOutput>; PID_CHANNEL_COUNT],
    status_led: Box<dyn DigitalOutputPin>,
    fault_led: Box<dyn DigitalOutputPin>,
    timer: T,
    sys_info: SysInfo,
}

impl<T> SensorController<T>
where
    T: MicrosecondTimer,
{
    /// Build a controller with default PID tuning on every channel.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ph_probe: Box<dyn I2cProbe>,
        temp_probes: [Box<dyn I2cProbe>; PID_CHANNEL_COUNT],
        heaters: [Box<dyn PwmOutput>; PID_CHANNEL_COUNT],
        status_led: Box<dyn DigitalOutputPin>,
        fault_led: Box<dyn DigitalOutputPin>,
        timer: T,
        pid_defaults: [PidParams; PID_CHANNEL_COUNT],
        sys_info: SysInfo,
    ) -> Self {
        let runtime = Arc::new(Mutex::new(SensorRuntime {
            board_state: SensorBoardState::SysInit,
            reading_pending: false,
            first_read_completed: false,
            ph_reading: None,
            temp_readings: [None; PID_CHANNEL_COUNT],
            pid_targets: [0.0; PID_CHANNEL_COUNT],
            pid_params: pid_defaults,
            pid_state: [PidState::default(); PID_CHANNEL_COUNT],
        }));

        Self {
            runtime,
            ph_probe,
            temp_probes,
            heaters,
            status_led,
            fault_led,
            timer,
            sys_info,
        }
    }

    /// ISR-context entry point: the hardware timer armed by `SEND_READ_CMD`
    /// has fired. Clears the pending flag; never logs.
    pub fn on_read_deadline(&self) {
        let mut rt = self.runtime.lock();
        rt.reading_pending = false;
        rt.first_read_completed = true;
    }

    /// Apply boot-time state, mirroring `run()`'s initial `setBoardState`.
    pub fn init_hardware(&mut self) {
        self.set_board_state(SensorBoardState::WaitForConnection);
    }

    /// A TCP client connected.
    pub fn on_client_connected(&mut self) {
        self.set_board_state(SensorBoardState::Idle);
    }

    /// The client socket disconnected: cancel any outstanding read-cycle
    /// deadline and return to the waiting state.
    pub fn on_client_disconnected(&mut self) {
        self.timer.cancel();
        self.runtime.lock().reading_pending = false;
        self.set_board_state(SensorBoardState::WaitForConnection);
    }

    fn set_board_state(&mut self, state: SensorBoardState) {
        self.runtime.lock().board_state = state;
        info!(?state, "sensor board state changed");
        self.refresh_leds();
    }

    /// Reconcile the status/fault LEDs with the current state. Collapses the
    /// source's blinking `WAIT_FOR_CONNECTION` ticker to a solid indicator,
    /// as `pump::PumpController::refresh_leds` does for the pump board.
    pub fn refresh_leds(&mut self) {
        let connected = self.runtime.lock().board_state != SensorBoardState::WaitForConnection;
        if connected {
            self.status_led.set_high();
        } else {
            self.status_led.set_low();
        }
    }

    fn probe_mut(&mut self, probe: ProbeSelect) -> &mut dyn I2cProbe {
        match probe {
            ProbeSelect::Ph => self.ph_probe.as_mut(),
            ProbeSelect::Temp0 => self.temp_probes[0].as_mut(),
            ProbeSelect::Temp1 => self.temp_probes[1].as_mut(),
            ProbeSelect::Temp2 => self.temp_probes[2].as_mut(),
        }
    }

    // ── wire dispatch ────────────────────────────────────────────────────

    /// Decode a complete request frame and produce the encoded reply frame.
    pub fn dispatch(&mut self, request: &[u8]) -> Vec<u8> {
        let header = match FrameHeader::decode(request) {
            Ok(h) => h,
            Err(_) => return header_only(SensorFid::GetStatus as u16, ErrorCode::InvalidParameter),
        };
        let fid = match SensorFid::from_u16(header.fid) {
            Some(fid) => fid,
            None => return header_only(header.fid, ErrorCode::NotSupported),
        };
        let body = &request[HEADER_LEN.min(request.len())..];
        match fid {
            SensorFid::GetStatus => self.get_status(),
            SensorFid::SendReadCmd => self.send_read_cmd(),
            SensorFid::GetSensorData => self.get_sensor_data(),
            SensorFid::GetSensorInfo => self.get_sensor_info(),
            SensorFid::GetSensorStatus => self.get_sensor_status(),
            SensorFid::GetSystemInfo => self.get_system_info(),
            SensorFid::SetTempSetpoint => self.set_temp_setpoint(body),
            SensorFid::SetPid => self.set_pid(body),
            SensorFid::GetPid => self.get_pid(body),
            SensorFid::ResetPid => self.reset_pid(body),
            SensorFid::SetPidStep => self.set_pid_step(body),
            SensorFid::SetPidMethod => self.set_pid_method(body),
            SensorFid::SetAddress => self.set_address(body),
            SensorFid::SetPidLimit => self.set_pid_limit(body),
            SensorFid::GetPidLimit => self.get_pid_limit(body),
            SensorFid::CalibrateLow => self.calibrate(body, SensorFid::CalibrateLow),
            SensorFid::CalibrateMid => self.calibrate(body, SensorFid::CalibrateMid),
            SensorFid::CalibrateHigh => self.calibrate(body, SensorFid::CalibrateHigh),
            SensorFid::FactoryResetEzo => self.factory_reset_ezo(body),
        }
    }

    fn get_status(&self) -> Vec<u8> {
        let rt = self.runtime.lock();
        let ph_connected = rt.first_read_completed && rt.ph_reading.is_some();
        let mut temp_connected = [false; PID_CHANNEL_COUNT];
        if rt.first_read_completed {
            for i in 0..PID_CHANNEL_COUNT {
                temp_connected[i] = rt.temp_readings[i].is_some();
            }
        }
        let all_connected = ph_connected && temp_connected.iter().all(|c| *c);
        let body = SensorStatusHeaderWire {
            board_state: rt.board_state as u8,
            ph_connected,
            temp_connected,
        };
        let mut w = ByteWriter::new();
        body.encode(&mut w);
        let error = if all_connected { ErrorCode::Ok } else { ErrorCode::SensorDisconnected };
        frame(SensorFid::GetStatus as u16, error, w)
    }

    fn send_read_cmd(&mut self) -> Vec<u8> {
        if self.runtime.lock().reading_pending {
            return header_only(SensorFid::SendReadCmd as u16, ErrorCode::ReadingPending);
        }
        let _ = ezo::send_read_cmd(self.ph_probe.as_mut());
        for probe in self.temp_probes.iter_mut() {
            let _ = ezo::send_read_cmd(probe.as_mut());
        }
        self.runtime.lock().reading_pending = true;
        self.timer.schedule_after(READ_CYCLE_TIMEOUT_MS * 1_000);
        header_only(SensorFid::SendReadCmd as u16, ErrorCode::Ok)
    }

    fn get_sensor_data(&mut self) -> Vec<u8> {
        let (pending, reinit) = {
            let rt = self.runtime.lock();
            (rt.reading_pending, !rt.first_read_completed)
        };
        if pending {
            return header_only(SensorFid::GetSensorData as u16, ErrorCode::ReadingPending);
        }

        let ph = ezo::receive_reading(self.ph_probe.as_mut()).ok().flatten();
        let mut temps = [None; PID_CHANNEL_COUNT];
        for (i, probe) in self.temp_probes.iter_mut().enumerate() {
            temps[i] = ezo::receive_reading(probe.as_mut()).ok().flatten();
        }

        let mut rt = self.runtime.lock();
        rt.ph_reading = ph;
        rt.temp_readings = temps;
        for i in 0..PID_CHANNEL_COUNT {
            let measured = temps[i].unwrap_or(0.0);
            let target = rt.pid_targets[i];
            pid::compute(
                &rt.pid_params[i],
                &mut rt.pid_state[i],
                target,
                measured,
                reinit,
                self.heaters[i].as_mut(),
            );
        }
        drop(rt);

        let body = SensorDataWire {
            ph: ph.unwrap_or(0.0),
            temp: temps.map(|t| t.unwrap_or(0.0)),
        };
        let mut w = ByteWriter::new();
        body.encode(&mut w);
        frame(SensorFid::GetSensorData as u16, ErrorCode::Ok, w)
    }

    fn get_sensor_info(&mut self) -> Vec<u8> {
        if self.runtime.lock().reading_pending {
            return header_only(SensorFid::GetSensorInfo as u16, ErrorCode::ReadingPending);
        }
        let ph = text_or_empty(ezo::get_sensor_info(self.ph_probe.as_mut()));
        let temp = std::array::from_fn(|i| text_or_empty(ezo::get_sensor_info(self.temp_probes[i].as_mut())));
        let body = SensorTextWire { ph, temp };
        let mut w = ByteWriter::new();
        body.encode(&mut w);
        frame(SensorFid::GetSensorInfo as u16, ErrorCode::Ok, w)
    }

    fn get_sensor_status(&mut self) -> Vec<u8> {
        if self.runtime.lock().reading_pending {
            return header_only(SensorFid::GetSensorStatus as u16, ErrorCode::ReadingPending);
        }
        let ph = text_or_empty(ezo::get_sensor_status(self.ph_probe.as_mut()));
        let temp = std::array::from_fn(|i| text_or_empty(ezo::get_sensor_status(self.temp_probes[i].as_mut())));
        let body = SensorTextWire { ph, temp };
        let mut w = ByteWriter::new();
        body.encode(&mut w);
        frame(SensorFid::GetSensorStatus as u16, ErrorCode::Ok, w)
    }

    fn get_system_info(&self) -> Vec<u8> {
        let wire = SysInfoWire {
            fw_version: self.sys_info.fw_version.clone(),
            board_id: self.sys_info.board_id.clone(),
            ip_addr: self.sys_info.ip_addr.clone(),
            mac_addr: self.sys_info.mac_addr.clone(),
        };
        let mut w = ByteWriter::new();
        wire.encode(&mut w);
        frame(SensorFid::GetSystemInfo as u16, ErrorCode::Ok, w)
    }

    fn set_temp_setpoint(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = SetTempSetpointWire::decode(&mut r) else {
            return header_only(SensorFid::SetTempSetpoint as u16, ErrorCode::InvalidParameter);
        };
        let Some(i) = channel_index(wire.channel) else {
            return header_only(SensorFid::SetTempSetpoint as u16, ErrorCode::InvalidParameter);
        };
        self.runtime.lock().pid_targets[i] = wire.target;
        header_only(SensorFid::SetTempSetpoint as u16, ErrorCode::Ok)
    }

    fn set_pid(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = SetPidWire::decode(&mut r) else {
            return header_only(SensorFid::SetPid as u16, ErrorCode::InvalidParameter);
        };
        let Some(i) = channel_index(wire.channel) else {
            return header_only(SensorFid::SetPid as u16, ErrorCode::InvalidParameter);
        };
        self.runtime.lock().pid_params[i] = params_from_wire(wire.params);
        header_only(SensorFid::SetPid as u16, ErrorCode::Ok)
    }

    fn get_pid(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = ChannelRequestWire::decode(&mut r) else {
            return header_only(SensorFid::GetPid as u16, ErrorCode::InvalidParameter);
        };
        let Some(i) = channel_index(wire.channel) else {
            return header_only(SensorFid::GetPid as u16, ErrorCode::InvalidParameter);
        };
        let params = self.runtime.lock().pid_params[i];
        let mut w = ByteWriter::new();
        wire_from_params(params).encode(&mut w);
        frame(SensorFid::GetPid as u16, ErrorCode::Ok, w)
    }

    fn reset_pid(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = ChannelRequestWire::decode(&mut r) else {
            return header_only(SensorFid::ResetPid as u16, ErrorCode::InvalidParameter);
        };
        let Some(i) = channel_index(wire.channel) else {
            return header_only(SensorFid::ResetPid as u16, ErrorCode::InvalidParameter);
        };
        let mut rt = self.runtime.lock();
        pid::reset(&mut rt.pid_state[i], self.heaters[i].as_mut());
        header_only(SensorFid::ResetPid as u16, ErrorCode::Ok)
    }

    fn set_pid_step(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = SetPidStepWire::decode(&mut r) else {
            return header_only(SensorFid::SetPidStep as u16, ErrorCode::InvalidParameter);
        };
        let Some(i) = channel_index(wire.channel) else {
            return header_only(SensorFid::SetPidStep as u16, ErrorCode::InvalidParameter);
        };
        self.runtime.lock().pid_state[i].step = wire.step;
        header_only(SensorFid::SetPidStep as u16, ErrorCode::Ok)
    }

    fn set_pid_method(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = SetPidMethodWire::decode(&mut r) else {
            return header_only(SensorFid::SetPidMethod as u16, ErrorCode::InvalidParameter);
        };
        let (Some(i), Some(method)) = (channel_index(wire.channel), AntiWindup::from_u8(wire.method)) else {
            return header_only(SensorFid::SetPidMethod as u16, ErrorCode::InvalidParameter);
        };
        self.runtime.lock().pid_state[i].anti_windup = method;
        header_only(SensorFid::SetPidMethod as u16, ErrorCode::Ok)
    }

    fn set_pid_limit(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = SetPidLimitWire::decode(&mut r) else {
            return header_only(SensorFid::SetPidLimit as u16, ErrorCode::InvalidParameter);
        };
        let Some(i) = channel_index(wire.channel) else {
            return header_only(SensorFid::SetPidLimit as u16, ErrorCode::InvalidParameter);
        };
        if wire.limit <= 0.0 || wire.limit > 1.0 {
            return header_only(SensorFid::SetPidLimit as u16, ErrorCode::InvalidParameter);
        }
        self.runtime.lock().pid_state[i].limit = wire.limit;
        header_only(SensorFid::SetPidLimit as u16, ErrorCode::Ok)
    }

    fn get_pid_limit(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = ChannelRequestWire::decode(&mut r) else {
            return header_only(SensorFid::GetPidLimit as u16, ErrorCode::InvalidParameter);
        };
        let Some(i) = channel_index(wire.channel) else {
            return header_only(SensorFid::GetPidLimit as u16, ErrorCode::InvalidParameter);
        };
        let limit = self.runtime.lock().pid_state[i].limit;
        let mut w = ByteWriter::new();
        PidLimitWire { limit }.encode(&mut w);
        frame(SensorFid::GetPidLimit as u16, ErrorCode::Ok, w)
    }

    fn set_address(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = SetAddressWire::decode(&mut r) else {
            return header_only(SensorFid::SetAddress as u16, ErrorCode::InvalidParameter);
        };
        let Some(probe) = ProbeSelect::from_u8(wire.probe) else {
            return header_only(SensorFid::SetAddress as u16, ErrorCode::InvalidParameter);
        };
        let result = ezo::set_address(self.probe_mut(probe), wire.address);
        ezo_reply(SensorFid::SetAddress, result)
    }

    fn calibrate(&mut self, body: &[u8], fid: SensorFid) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = CalibrateWire::decode(&mut r) else {
            return header_only(fid as u16, ErrorCode::InvalidParameter);
        };
        let Some(probe) = ProbeSelect::from_u8(wire.probe) else {
            return header_only(fid as u16, ErrorCode::InvalidParameter);
        };
        let target = self.probe_mut(probe);
        let result = match fid {
            SensorFid::CalibrateLow => ezo::calibrate_low(target, wire.value),
            SensorFid::CalibrateMid => ezo::calibrate_mid(target, wire.value),
            SensorFid::CalibrateHigh => ezo::calibrate_high(target, wire.value),
            _ => unreachable!("calibrate dispatched with a non-calibration fid"),
        };
        ezo_reply(fid, result)
    }

    fn factory_reset_ezo(&mut self, body: &[u8]) -> Vec<u8> {
        let mut r = ByteReader::new(body);
        let Ok(wire) = ProbeSelectWire::decode(&mut r) else {
            return header_only(SensorFid::FactoryResetEzo as u16, ErrorCode::InvalidParameter);
        };
        let Some(probe) = ProbeSelect::from_u8(wire.probe) else {
            return header_only(SensorFid::FactoryResetEzo as u16, ErrorCode::InvalidParameter);
        };
        let result = ezo::factory_reset(self.probe_mut(probe));
        match &result {
            Ok(true) => {}
            _ => warn!(?probe, "factory reset did not confirm"),
        }
        ezo_reply(SensorFid::FactoryResetEzo, result)
    }
}

fn channel_index(raw: u8) -> Option<usize> {
    let i = raw as usize;
    (i < PID_CHANNEL_COUNT).then_some(i)
}

fn params_from_wire(wire: PidParamsWire) -> PidParams {
    PidParams {
        dt: wire.dt,
        max: wire.max,
        min: wire.min,
        kp: wire.kp,
        kd: wire.kd,
        ki: wire.ki,
        kf: wire.kf,
    }
}

fn wire_from_params(params: PidParams) -> PidParamsWire {
    PidParamsWire {
        dt: params.dt,
        max: params.max,
        min: params.min,
        kp: params.kp,
        kd: params.kd,
        ki: params.ki,
        kf: params.kf,
    }
}

fn text_or_empty(reply: Result<ezo::EzoTextReply, HalError>) -> String {
    match reply {
        Ok(ezo::EzoTextReply::Ok(s)) => s,
        _ => String::new(),
    }
}

fn ezo_reply(fid: SensorFid, result: Result<bool, HalError>) -> Vec<u8> {
    match result {
        Ok(true) => header_only(fid as u16, ErrorCode::Ok),
        _ => header_only(fid as u16, ErrorCode::SensorDisconnected),
    }
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
    use std::collections::VecDeque;

    struct FakeProbe {
        responses: VecDeque<Vec<u8>>,
        last_command: Option<String>,
        address: u8,
    }

    impl FakeProbe {
        fn with(responses: Vec<Vec<u8>>) -> Self {
            Self {
                responses: VecDeque::from(responses),
                last_command: None,
                address: 0,
            }
        }
    }

    impl I2cProbe for FakeProbe {
        fn command(&mut self, cmd: &str, _delay_ms: u32) -> Result<Vec<u8>, HalError> {
            self.last_command = Some(cmd.to_string());
            Ok(self.responses.pop_front().unwrap_or_default())
        }
        fn write_only(&mut self, cmd: &str) -> Result<(), HalError> {
            self.last_command = Some(cmd.to_string());
            Ok(())
        }
        fn read_only(&mut self) -> Result<Vec<u8>, HalError> {
            Ok(self.responses.pop_front().unwrap_or_default())
        }
        fn set_bus_address(&mut self, address: u8) {
            self.address = address;
        }
    }

    struct FakePwm {
        duty: f32,
    }
    impl PwmOutput for FakePwm {
        fn set_duty(&mut self, duty: f32) {
            self.duty = duty;
        }
    }

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

    #[derive(Default)]
    struct FakeTimer {
        armed_micros: Option<u32>,
        cancelled: bool,
    }
    impl MicrosecondTimer for FakeTimer {
        fn schedule_after(&mut self, micros: u32) {
            self.armed_micros = Some(micros);
        }
        fn cancel(&mut self) {
            self.cancelled = true;
        }
    }

    fn ok_response(payload: &str) -> Vec<u8> {
        let mut v = vec![1u8];
        v.extend_from_slice(payload.as_bytes());
        v.push(0);
        v
    }

    fn controller() -> SensorController<FakeTimer> {
        SensorController::new(
            Box::new(FakeProbe::with(vec![])),
            [
                Box::new(FakeProbe::with(vec![])),
                Box::new(FakeProbe::with(vec![])),
                Box::new(FakeProbe::with(vec![])),
            ],
            [
                Box::new(FakePwm { duty: 0.0 }),
                Box::new(FakePwm { duty: 0.0 }),
                Box::new(FakePwm { duty: 0.0 }),
            ],
            Box::new(FakePin::default()),
            Box::new(FakePin::default()),
            FakeTimer::default(),
            [PidParams::default(); PID_CHANNEL_COUNT],
            SysInfo {
                fw_version: "1.0.0".into(),
                board_id: "sensor-test".into(),
                ip_addr: "10.0.0.6".into(),
                mac_addr: "00:11:22:33:44:66".into(),
            },
        )
    }

    fn request(fid: SensorFid, body: &[u8]) -> Vec<u8> {
        let header = FrameHeader::new(fid as u16, body.len() as u16);
        let mut out = header.encode().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn get_status_reports_disconnected_before_first_read_cycle() {
        let mut sc = controller();
        let reply = sc.dispatch(&request(SensorFid::GetStatus, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::SensorDisconnected.code());
    }

    #[test]
    fn send_read_cmd_arms_timer_and_rejects_while_pending() {
        let mut sc = controller();
        let reply = sc.dispatch(&request(SensorFid::SendReadCmd, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());
        assert_eq!(sc.timer.armed_micros, Some(READ_CYCLE_TIMEOUT_MS * 1_000));

        let reply = sc.dispatch(&request(SensorFid::SendReadCmd, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::ReadingPending.code());
    }

    #[test]
    fn get_sensor_data_blocks_while_reading_pending() {
        let mut sc = controller();
        sc.dispatch(&request(SensorFid::SendReadCmd, &[]));
        let reply = sc.dispatch(&request(SensorFid::GetSensorData, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::ReadingPending.code());
    }

    #[test]
    fn get_sensor_data_refreshes_readings_once_deadline_fires() {
        let mut sc = controller();
        sc.ph_probe = Box::new(FakeProbe::with(vec![ok_response("7.20")]));
        sc.temp_probes[0] = Box::new(FakeProbe::with(vec![ok_response("25.50")]));

        sc.dispatch(&request(SensorFid::SendReadCmd, &[]));
        sc.on_read_deadline();
        let reply = sc.dispatch(&request(SensorFid::GetSensorData, &[]));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());
        assert_eq!(sc.runtime.lock().ph_reading, Some(7.20));
        assert_eq!(sc.runtime.lock().temp_readings[0], Some(25.50));
    }

    #[test]
    fn set_pid_then_get_pid_round_trips_channel_params() {
        let mut sc = controller();
        let params = PidParamsWire {
            dt: 0.5,
            max: 100.0,
            min: 0.0,
            kp: 12.0,
            kd: 0.0,
            ki: 0.01,
            kf: 0.0,
        };
        let mut w = ByteWriter::new();
        w.u8(1);
        params.encode(&mut w);
        let reply = sc.dispatch(&request(SensorFid::SetPid, &w.finish()));
        assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());

        let mut w = ByteWriter::new();
        w.u8(1);
        let reply = sc.dispatch(&request(SensorFid::GetPid, &w.finish()));
        let header = FrameHeader::decode(&reply).unwrap();
        assert_eq!(header.error, ErrorCode::Ok.code());
        let mut r = ByteReader::new(&reply[HEADER_LEN..]);
        let decoded = PidParamsWire::decode(&mut r).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn reset_pid_zeroes_integral_and_drives_heater_to_zero() {
        let mut sc = controller();
        sc.runtime.lock().pid_state[2].integral = 9.0;
        let mut w = ByteWriter::new();
        w.u8(2);
        let reply = sc.dispatch(&request(SensorFid::ResetPid, &w.finish()));
        assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());
        assert_eq!(sc.runtime.lock().pid_state[2].integral, 0.0);
    }

    #[test]
    fn set_pid_method_rejects_out_of_range_channel() {
        let mut sc = controller();
        let mut w = ByteWriter::new();
        w.u8(9).u8(AntiWindup::None as u8);
        let reply = sc.dispatch(&request(SensorFid::SetPidMethod, &w.finish()));
        assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::InvalidParameter.code());
    }

    #[test]
    fn set_pid_limit_rejects_value_outside_unit_interval() {
        let mut sc = controller();
        let mut w = ByteWriter::new();
        w.u8(0).f32(1.5);
        let reply = sc.dispatch(&request(SensorFid::SetPidLimit, &w.finish()));
        assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::InvalidParameter.code());
    }

    #[test]
    fn calibrate_low_forwards_command_to_selected_temp_probe() {
        let mut sc = controller();
        sc.temp_probes[1] = Box::new(FakeProbe::with(vec![vec![1]]));
        let mut w = ByteWriter::new();
        w.u8(ProbeSelect::Temp1 as u8).f32(25.0);
        let reply = sc.dispatch(&request(SensorFid::CalibrateLow, &w.finish()));
        assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());
    }

    #[test]
    fn out_of_range_sensor_fid_is_not_supported() {
        let mut sc = controller();
        let header = FrameHeader::new(999, 0);
        let reply = sc.dispatch(&header.encode());
        assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::NotSupported.code());
    }
}
