//! Wire protocol: frame header, FID tables, error codes, request/reply bodies.
//!
//! Little-endian, packed. Every frame begins with [`FrameHeader`]; request and
//! reply bodies are fixed-size trailing fields (no variable-length strings,
//! only null-padded fixed buffers), per the protocol design in the firmware
//! specification.
//!
//! Structs are defined `#[repr(C)]` to pin field order and [`static_assertions`]
//! checks their logical wire size, but encoding/decoding is done field-by-field
//! through [`ByteReader`]/[`ByteWriter`] rather than a raw transmute, since a
//! packed `repr(C)` layout is not itself a portable wire format across
//! architectures with different alignment rules.

use static_assertions::const_assert_eq;

/// Size in bytes of [`FrameHeader`] on the wire.
pub const HEADER_LEN: usize = 8;

/// Maximum frame size accepted by the dispatcher (header + largest body).
pub const MAX_FRAME_LEN: usize = 256;

/// Error produced while decoding a wire frame or body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Buffer was shorter than the structure being decoded.
    #[error("short buffer: need {need} bytes, have {have}")]
    ShortBuffer {
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },
    /// `packetLength` field was smaller than the header itself.
    #[error("packet length {0} shorter than header")]
    PacketTooShort(u16),
    /// `packetLength` field exceeded [`MAX_FRAME_LEN`].
    #[error("packet length {0} exceeds maximum frame size")]
    PacketTooLong(u16),
}

// ─── Byte cursor helpers ─────────────────────────────────────────────

/// Minimal little-endian byte cursor used by every wire struct's decoder.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Wrap a buffer for sequential little-endian reads.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.pos + n > self.buf.len() {
            return Err(ProtocolError::ShortBuffer {
                need: self.pos + n,
                have: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read one byte.
    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u16`.
    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    /// Read a little-endian `i16`.
    pub fn i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    /// Read a little-endian `u32`.
    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Read a little-endian `f32`.
    pub fn f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Read a fixed-size null-padded ASCII buffer into an owned array.
    pub fn bytes<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// Minimal little-endian byte writer used by every wire struct's encoder.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte.
    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    /// Append a little-endian `u16`.
    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Append a little-endian `i16`.
    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Append a little-endian `u32`.
    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Append a little-endian `f32`.
    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Append a fixed-size buffer verbatim.
    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    /// Consume the writer, returning the assembled bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Pack a Rust string into a fixed-size null-padded ASCII buffer.
pub fn pack_str<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = s.as_bytes();
    let n = bytes.len().min(N - 1);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Unpack a fixed-size null-padded ASCII buffer into a Rust string, stopping
/// at the first nul byte (or the end of the buffer if unterminated).
pub fn unpack_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

// ─── Frame header ────────────────────────────────────────────────────

/// Common frame header: `{u16 packetLength; u16 fid; i16 error; u16 pad}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FrameHeader {
    /// Total length of this frame in bytes, including the header.
    pub packet_length: u16,
    /// Function identifier.
    pub fid: u16,
    /// Reply error code (request frames leave this `0`).
    pub error: i16,
    /// Padding to a whole machine word; always `0` on the wire.
    pub _reserved: u16,
}

const_assert_eq!(core::mem::size_of::<FrameHeader>(), HEADER_LEN);

impl FrameHeader {
    /// Build a request/reply header for `fid` with the given body length.
    pub const fn new(fid: u16, body_len: u16) -> Self {
        Self {
            packet_length: HEADER_LEN as u16 + body_len,
            fid,
            error: 0,
            _reserved: 0,
        }
    }

    /// Build a header-only reply carrying an error/status code.
    pub const fn reply(fid: u16, error: i16) -> Self {
        Self {
            packet_length: HEADER_LEN as u16,
            fid,
            error,
            _reserved: 0,
        }
    }

    /// Encode to the wire representation.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut w = ByteWriter::new();
        w.u16(self.packet_length).u16(self.fid).i16(self.error).u16(0);
        let bytes = w.finish();
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&bytes);
        out
    }

    /// Decode from a buffer of at least [`HEADER_LEN`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = ByteReader::new(buf);
        let packet_length = r.u16()?;
        let fid = r.u16()?;
        let error = r.i16()?;
        let _reserved = r.u16()?;
        if packet_length < HEADER_LEN as u16 {
            return Err(ProtocolError::PacketTooShort(packet_length));
        }
        if packet_length as usize > MAX_FRAME_LEN {
            return Err(ProtocolError::PacketTooLong(packet_length));
        }
        Ok(Self {
            packet_length,
            fid,
            error,
            _reserved,
        })
    }
}

// ─── Error codes (§6) ───────────────────────────────────────────────

/// Reply status codes carried in [`FrameHeader::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum ErrorCode {
    /// Success.
    Ok = 0,
    /// Unknown or out-of-range FID.
    NotSupported = 1,
    /// A request parameter failed validation.
    InvalidParameter = 2,
    /// `startPump` issued before a flow config was set.
    FlowNotConfigured = 3,
    /// Commanded direction's limit switch is asserted.
    LimitSwActive = 4,
    /// Stepper driver reports a latched fault.
    StepDrvErr = 5,
    /// Stepper driver failed register verification after config apply.
    StepDrvNotConfigured = 6,
    /// Requested motion profile is infeasible (`c_min < 10 µs`).
    SwitchingOverMax = 7,
    /// Command rejected by the admission policy while pumping.
    PumpRunning = 8,
    /// A probe did not answer its identification query.
    SensorDisconnected = 9,
    /// A commanded read is still outstanding.
    ReadingPending = 10,
}

impl ErrorCode {
    /// Convert to the `i16` carried on the wire.
    pub const fn code(self) -> i16 {
        self as i16
    }
}

// ─── Pump FIDs ───────────────────────────────────────────────────────

/// Function identifiers served by the pump board dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PumpFid {
    /// Query pump state, error bits and instantaneous flow.
    GetStatus = 0,
    /// Stop motion and return to `IDLE`.
    StopPump = 1,
    /// Begin a pumping move from the current flow config.
    StartPump = 2,
    /// Replace the hardware configuration.
    SetHardwareConfig = 3,
    /// Replace the flow configuration.
    SetFlowConfig = 4,
    /// Read back the hardware configuration.
    GetHardwareConfig = 5,
    /// Run to the pull-side limit switch at max speed.
    MaxPull = 6,
    /// Run to the push-side limit switch at max speed.
    MaxPush = 7,
    /// Disable stepper holding torque.
    DisableMotorHold = 8,
    /// Read the latched stepper driver fault register.
    GetStepDrvError = 9,
    /// Read back the flow configuration.
    GetFlowConfig = 10,
    /// Clear all latched pump errors.
    ResetPump = 11,
    /// Read the pump error bitset.
    GetPumpError = 12,
    /// Read firmware/board identification.
    GetSysInfo = 13,
    /// Blink the status LED to visually identify the board.
    IdentifyItself = 14,
}

/// Number of pump FIDs; FIDs `>= PUMP_FID_COUNT` are rejected.
pub const PUMP_FID_COUNT: u16 = 15;

impl PumpFid {
    /// Convert a raw FID value decoded from the wire.
    pub const fn from_u16(v: u16) -> Option<Self> {
        use PumpFid::*;
        Some(match v {
            0 => GetStatus,
            1 => StopPump,
            2 => StartPump,
            3 => SetHardwareConfig,
            4 => SetFlowConfig,
            5 => GetHardwareConfig,
            6 => MaxPull,
            7 => MaxPush,
            8 => DisableMotorHold,
            9 => GetStepDrvError,
            10 => GetFlowConfig,
            11 => ResetPump,
            12 => GetPumpError,
            13 => GetSysInfo,
            14 => IdentifyItself,
            _ => return None,
        })
    }
}

// ─── Sensor FIDs ─────────────────────────────────────────────────────

/// Function identifiers served by the sensor board dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SensorFid {
    /// Query board state and probe connectivity.
    GetStatus = 0,
    /// Broadcast a read command to both probes.
    SendReadCmd = 1,
    /// Read cached pH/temperature values and step the PID loops.
    GetSensorData = 2,
    /// Query probe device information strings.
    GetSensorInfo = 3,
    /// Query probe device status strings.
    GetSensorStatus = 4,
    /// Read firmware/board identification.
    GetSystemInfo = 5,
    /// Set a channel's ramped target temperature.
    SetTempSetpoint = 6,
    /// Set a channel's PID gains.
    SetPid = 7,
    /// Read back a channel's PID gains.
    GetPid = 8,
    /// Reset a channel's PID integrator/setpoint.
    ResetPid = 9,
    /// Set a channel's setpoint ramp rate.
    SetPidStep = 10,
    /// Set a channel's anti-windup method.
    SetPidMethod = 11,
    /// Reassign a probe's I²C address.
    SetAddress = 12,
    /// Set a channel's output limit factor.
    SetPidLimit = 13,
    /// Read back a channel's output limit factor.
    GetPidLimit = 14,
    /// Issue a low-point calibration to a probe.
    CalibrateLow = 15,
    /// Issue a mid-point calibration to a probe.
    CalibrateMid = 16,
    /// Issue a high-point calibration to a probe.
    CalibrateHigh = 17,
    /// Factory-reset a probe.
    FactoryResetEzo = 18,
}

/// Number of sensor FIDs; FIDs `>= SENSOR_FID_COUNT` are rejected.
pub const SENSOR_FID_COUNT: u16 = 19;

impl SensorFid {
    /// Convert a raw FID value decoded from the wire.
    pub const fn from_u16(v: u16) -> Option<Self> {
        use SensorFid::*;
        Some(match v {
            0 => GetStatus,
            1 => SendReadCmd,
            2 => GetSensorData,
            3 => GetSensorInfo,
            4 => GetSensorStatus,
            5 => GetSystemInfo,
            6 => SetTempSetpoint,
            7 => SetPid,
            8 => GetPid,
            9 => ResetPid,
            10 => SetPidStep,
            11 => SetPidMethod,
            12 => SetAddress,
            13 => SetPidLimit,
            14 => GetPidLimit,
            15 => CalibrateLow,
            16 => CalibrateMid,
            17 => CalibrateHigh,
            18 => FactoryResetEzo,
            _ => return None,
        })
    }
}

// ─── Pump payload bodies ─────────────────────────────────────────────

/// Wire representation of `HardwareConfig` (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareConfigWire {
    /// Microstep mode ∈ {1,2,4,8,16,32,64,128}.
    pub step_mode: u8,
    /// Full steps per revolution.
    pub steps_per_rev: u16,
    /// Lead screw pitch [mm].
    pub lead_screw_pitch_mm: f32,
    /// Max driver current [mA].
    pub max_driver_current_ma: u16,
    /// PWM frequency flag: 0 = default, 1 = doubled.
    pub pwm_frequency: u8,
    /// PWM slope ∈ {0..3}.
    pub pwm_slope: u8,
    /// PWM jitter flag: 0 = off, 1 = on.
    pub pwm_jitter: u8,
    /// Max pull/push acceleration [rev/s²].
    pub max_pull_push_acc: f32,
    /// Max pull/push velocity [rev/s].
    pub max_pull_push_vel: f32,
    /// Pumping acceleration [rev/s²].
    pub pump_acc: f32,
    /// Pumping deceleration [rev/s²].
    pub pump_dec: f32,
}

/// Wire size of [`HardwareConfigWire`] in bytes.
pub const HARDWARE_CONFIG_WIRE_LEN: usize = 1 + 2 + 4 + 2 + 1 + 1 + 1 + 4 + 4 + 4 + 4;

impl HardwareConfigWire {
    /// Encode into the writer.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.u8(self.step_mode)
            .u16(self.steps_per_rev)
            .f32(self.lead_screw_pitch_mm)
            .u16(self.max_driver_current_ma)
            .u8(self.pwm_frequency)
            .u8(self.pwm_slope)
            .u8(self.pwm_jitter)
            .f32(self.max_pull_push_acc)
            .f32(self.max_pull_push_vel)
            .f32(self.pump_acc)
            .f32(self.pump_dec);
    }

    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            step_mode: r.u8()?,
            steps_per_rev: r.u16()?,
            lead_screw_pitch_mm: r.f32()?,
            max_driver_current_ma: r.u16()?,
            pwm_frequency: r.u8()?,
            pwm_slope: r.u8()?,
            pwm_jitter: r.u8()?,
            max_pull_push_acc: r.f32()?,
            max_pull_push_vel: r.f32()?,
            pump_acc: r.f32()?,
            pump_dec: r.f32()?,
        })
    }
}

/// Wire representation of `FlowConfig` (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowConfigWire {
    /// Target volume [ml].
    pub target_volume_ml: f32,
    /// Target flow rate [ml/min].
    pub target_flow_rate_mlmin: f32,
    /// Syringe inner diameter [mm].
    pub syringe_diameter_mm: f32,
    /// Direction: 0 = pull, 1 = push.
    pub direction: u8,
}

impl FlowConfigWire {
    /// Encode into the writer.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.f32(self.target_volume_ml)
            .f32(self.target_flow_rate_mlmin)
            .f32(self.syringe_diameter_mm)
            .u8(self.direction);
    }

    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            target_volume_ml: r.f32()?,
            target_flow_rate_mlmin: r.f32()?,
            syringe_diameter_mm: r.f32()?,
            direction: r.u8()?,
        })
    }
}

/// `GET_STATUS` reply body (pump board).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpStatusWire {
    /// Current `PumpState` as raw `u8`.
    pub pump_state: u8,
    /// Current `PumpError` bitset as raw `u8`.
    pub pump_error: u8,
    /// Volume delivered so far this run [ml].
    pub supplied_volume_ml: f32,
    /// Instantaneous flow rate [ml/min] (`0` unless `PUMP_RUNNING`).
    pub flow_rate_mlmin: f32,
}

impl PumpStatusWire {
    /// Encode into the writer.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.u8(self.pump_state)
            .u8(self.pump_error)
            .f32(self.supplied_volume_ml)
            .f32(self.flow_rate_mlmin);
    }
}

/// `GET_SYS_INFO` reply body.
#[derive(Debug, Clone, PartialEq)]
pub struct SysInfoWire {
    /// Firmware semantic version string.
    pub fw_version: String,
    /// Board identification string.
    pub board_id: String,
    /// IPv4 address as dotted-decimal string.
    pub ip_addr: String,
    /// MAC address string.
    pub mac_addr: String,
}

impl SysInfoWire {
    /// Encode into the writer using fixed-size null-padded buffers.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.bytes(&pack_str::<16>(&self.fw_version))
            .bytes(&pack_str::<16>(&self.board_id))
            .bytes(&pack_str::<16>(&self.ip_addr))
            .bytes(&pack_str::<18>(&self.mac_addr));
    }
}

/// Wire size of [`SysInfoWire`] in bytes.
pub const SYS_INFO_WIRE_LEN: usize = 16 + 16 + 16 + 18;

// ─── Sensor payload bodies ───────────────────────────────────────────

/// Number of independent PID-controlled heater channels / temperature
/// probes on the sensor board (§3's "three PID states and four probe
/// clients": one shared pH probe plus one temperature probe per channel).
pub const PID_CHANNEL_COUNT: usize = 3;

/// `GET_STATUS` reply body (sensor board).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorStatusHeaderWire {
    /// Raw `SensorBoardState`.
    pub board_state: u8,
    /// `true` if the pH probe answered its last identification query.
    pub ph_connected: bool,
    /// `true` per channel if that temperature probe answered its last
    /// identification query.
    pub temp_connected: [bool; PID_CHANNEL_COUNT],
}

impl SensorStatusHeaderWire {
    /// Encode into the writer.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.u8(self.board_state).u8(self.ph_connected as u8);
        for c in self.temp_connected {
            w.u8(c as u8);
        }
    }
}

/// `GET_SENSOR_DATA` reply body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDataWire {
    /// Cached pH reading.
    pub ph: f32,
    /// Cached temperature reading per channel [°C].
    pub temp: [f32; PID_CHANNEL_COUNT],
}

impl SensorDataWire {
    /// Encode into the writer.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.f32(self.ph);
        for t in self.temp {
            w.f32(t);
        }
    }
}

/// Selects which probe a `SET_ADDRESS`/`CALIBRATE_*`/`FACTORY_RESET_EZO`
/// command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProbeSelect {
    /// The shared pH probe.
    Ph = 0,
    /// Temperature probe feeding PID channel 0.
    Temp0 = 1,
    /// Temperature probe feeding PID channel 1.
    Temp1 = 2,
    /// Temperature probe feeding PID channel 2.
    Temp2 = 3,
}

impl ProbeSelect {
    /// Convert from the raw wire byte.
    pub const fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Ph,
            1 => Self::Temp0,
            2 => Self::Temp1,
            3 => Self::Temp2,
            _ => return None,
        })
    }
}

/// Request body naming a single PID channel: `SET_TEMP_SETPOINT`,
/// `GET_PID`, `RESET_PID`, `SET_PID_STEP`, `SET_PID_METHOD`,
/// `SET_PID_LIMIT`, `GET_PID_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRequestWire {
    /// Target PID channel.
    pub channel: u8,
}

impl ChannelRequestWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self { channel: r.u8()? })
    }
}

/// `SET_TEMP_SETPOINT` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetTempSetpointWire {
    /// Target PID channel.
    pub channel: u8,
    /// Ramped target temperature [°C].
    pub target: f32,
}

impl SetTempSetpointWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            channel: r.u8()?,
            target: r.f32()?,
        })
    }
}

/// `SET_PID` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPidWire {
    /// Target PID channel.
    pub channel: u8,
    /// New tuning parameters.
    pub params: PidParamsWire,
}

impl SetPidWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            channel: r.u8()?,
            params: PidParamsWire::decode(r)?,
        })
    }
}

/// `SET_PID_STEP` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPidStepWire {
    /// Target PID channel.
    pub channel: u8,
    /// New setpoint ramp rate per call.
    pub step: f32,
}

impl SetPidStepWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            channel: r.u8()?,
            step: r.f32()?,
        })
    }
}

/// `SET_PID_METHOD` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPidMethodWire {
    /// Target PID channel.
    pub channel: u8,
    /// Raw `AntiWindup` value.
    pub method: u8,
}

impl SetPidMethodWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            channel: r.u8()?,
            method: r.u8()?,
        })
    }
}

/// `SET_PID_LIMIT` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPidLimitWire {
    /// Target PID channel.
    pub channel: u8,
    /// New output limit factor ∈ (0,1].
    pub limit: f32,
}

impl SetPidLimitWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            channel: r.u8()?,
            limit: r.f32()?,
        })
    }
}

/// `GET_PID_LIMIT` reply body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidLimitWire {
    /// Current output limit factor.
    pub limit: f32,
}

impl PidLimitWire {
    /// Encode into the writer.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.f32(self.limit);
    }
}

/// `SET_ADDRESS` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetAddressWire {
    /// Probe to reassign.
    pub probe: u8,
    /// New I²C bus address.
    pub address: u8,
}

impl SetAddressWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            probe: r.u8()?,
            address: r.u8()?,
        })
    }
}

/// `CALIBRATE_LOW`/`CALIBRATE_MID`/`CALIBRATE_HIGH` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrateWire {
    /// Probe to calibrate.
    pub probe: u8,
    /// Reference value for this calibration point.
    pub value: f32,
}

impl CalibrateWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            probe: r.u8()?,
            value: r.f32()?,
        })
    }
}

/// `FACTORY_RESET_EZO` request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSelectWire {
    /// Probe to factory-reset.
    pub probe: u8,
}

impl ProbeSelectWire {
    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self { probe: r.u8()? })
    }
}

/// `GET_SENSOR_INFO`/`GET_SENSOR_STATUS` reply body: one ASCII string per
/// probe, null-padded into fixed 32-byte buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorTextWire {
    /// pH probe text.
    pub ph: String,
    /// Per-channel temperature probe text.
    pub temp: [String; PID_CHANNEL_COUNT],
}

/// Wire size in bytes of one [`SensorTextWire`] field.
pub const SENSOR_TEXT_FIELD_LEN: usize = 32;

impl SensorTextWire {
    /// Encode into the writer using fixed-size null-padded buffers.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.bytes(&pack_str::<SENSOR_TEXT_FIELD_LEN>(&self.ph));
        for t in &self.temp {
            w.bytes(&pack_str::<SENSOR_TEXT_FIELD_LEN>(t));
        }
    }
}

/// Wire representation of [`crate::state::PidParams`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidParamsWire {
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

impl PidParamsWire {
    /// Encode into the writer.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.f32(self.dt)
            .f32(self.max)
            .f32(self.min)
            .f32(self.kp)
            .f32(self.kd)
            .f32(self.ki)
            .f32(self.kf);
    }

    /// Decode from the reader.
    pub fn decode(r: &mut ByteReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            dt: r.f32()?,
            max: r.f32()?,
            min: r.f32()?,
            kp: r.f32()?,
            kd: r.f32()?,
            ki: r.f32()?,
            kf: r.f32()?,
        })
    }
}

/// `GET_STEPDRV_ERROR` reply body: decoded AMIS30543 fault bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverFaultWire {
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

/// Wire size of [`DriverFaultWire`] in bytes.
pub const DRIVER_FAULT_WIRE_LEN: usize = 8;

impl DriverFaultWire {
    /// Encode into the writer, one byte per flag.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.u8(self.openx as u8)
            .u8(self.openy as u8)
            .u8(self.wd as u8)
            .u8(self.cpfail as u8)
            .u8(self.tw as u8)
            .u8(self.ovcx as u8)
            .u8(self.ovcy as u8)
            .u8(self.tsd as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = FrameHeader::new(PumpFid::GetStatus as u16, 10);
        let bytes = h.encode();
        let decoded = FrameHeader::decode(&bytes).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn reply_header_carries_error_code() {
        let h = FrameHeader::reply(PumpFid::StartPump as u16, ErrorCode::PumpRunning.code());
        assert_eq!(h.packet_length, HEADER_LEN as u16);
        assert_eq!(h.error, ErrorCode::PumpRunning.code());
    }

    #[test]
    fn short_buffer_rejected() {
        let err = FrameHeader::decode(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortBuffer { .. }));
    }

    #[test]
    fn packet_too_short_rejected() {
        let mut w = ByteWriter::new();
        w.u16(4).u16(0).i16(0).u16(0);
        let bytes = w.finish();
        let err = FrameHeader::decode(&bytes).unwrap_err();
        assert_eq!(err, ProtocolError::PacketTooShort(4));
    }

    #[test]
    fn fid_table_bounds() {
        assert!(PumpFid::from_u16(14).is_some());
        assert!(PumpFid::from_u16(15).is_none());
        assert!(SensorFid::from_u16(18).is_some());
        assert!(SensorFid::from_u16(19).is_none());
    }

    #[test]
    fn pack_unpack_str_round_trips() {
        let packed = pack_str::<16>("v1.2.3");
        assert_eq!(unpack_str(&packed), "v1.2.3");
    }

    #[test]
    fn pack_str_truncates_to_buffer() {
        let packed = pack_str::<4>("abcdef");
        assert_eq!(unpack_str(&packed), "abc");
    }

    #[test]
    fn hardware_config_wire_round_trips() {
        let cfg = HardwareConfigWire {
            step_mode: 32,
            steps_per_rev: 400,
            lead_screw_pitch_mm: 1.5,
            max_driver_current_ma: 1000,
            pwm_frequency: 0,
            pwm_slope: 2,
            pwm_jitter: 1,
            max_pull_push_acc: 5.0,
            max_pull_push_vel: 5.0,
            pump_acc: 2.0,
            pump_dec: 2.0,
        };
        let mut w = ByteWriter::new();
        cfg.encode(&mut w);
        let bytes = w.finish();
        assert_eq!(bytes.len(), HARDWARE_CONFIG_WIRE_LEN);
        let mut r = ByteReader::new(&bytes);
        let decoded = HardwareConfigWire::decode(&mut r).unwrap();
        assert_eq!(cfg, decoded);
    }

    #[test]
    fn sensor_status_header_wire_encodes_per_channel_connectivity() {
        let h = SensorStatusHeaderWire {
            board_state: 2,
            ph_connected: true,
            temp_connected: [true, false, true],
        };
        let mut w = ByteWriter::new();
        h.encode(&mut w);
        let bytes = w.finish();
        assert_eq!(bytes, vec![2, 1, 1, 0, 1]);
    }

    #[test]
    fn sensor_data_wire_encodes_one_reading_per_channel() {
        let d = SensorDataWire {
            ph: 7.2,
            temp: [20.0, 21.5, 19.25],
        };
        let mut w = ByteWriter::new();
        d.encode(&mut w);
        let bytes = w.finish();
        assert_eq!(bytes.len(), 4 + 3 * 4);
    }

    #[test]
    fn probe_select_from_u8_covers_ph_and_three_channels() {
        assert_eq!(ProbeSelect::from_u8(0), Some(ProbeSelect::Ph));
        assert_eq!(ProbeSelect::from_u8(1), Some(ProbeSelect::Temp0));
        assert_eq!(ProbeSelect::from_u8(2), Some(ProbeSelect::Temp1));
        assert_eq!(ProbeSelect::from_u8(3), Some(ProbeSelect::Temp2));
        assert_eq!(ProbeSelect::from_u8(4), None);
    }

    #[test]
    fn set_pid_wire_round_trips_channel_and_params() {
        let params = PidParamsWire {
            dt: 0.5,
            max: 1.0,
            min: 0.0,
            kp: 9.0,
            kd: 0.0,
            ki: 0.006,
            kf: 0.0,
        };
        let mut w = ByteWriter::new();
        w.u8(2);
        params.encode(&mut w);
        let bytes = w.finish();
        let mut r = ByteReader::new(&bytes);
        let decoded = SetPidWire::decode(&mut r).unwrap();
        assert_eq!(decoded.channel, 2);
        assert_eq!(decoded.params, params);
    }

    #[test]
    fn set_temp_setpoint_wire_decodes_channel_and_target() {
        let mut w = ByteWriter::new();
        w.u8(1).f32(36.5);
        let bytes = w.finish();
        let mut r = ByteReader::new(&bytes);
        let decoded = SetTempSetpointWire::decode(&mut r).unwrap();
        assert_eq!(decoded.channel, 1);
        assert_eq!(decoded.target, 36.5);
    }

    #[test]
    fn calibrate_wire_decodes_probe_and_value() {
        let mut w = ByteWriter::new();
        w.u8(3).f32(7.0);
        let bytes = w.finish();
        let mut r = ByteReader::new(&bytes);
        let decoded = CalibrateWire::decode(&mut r).unwrap();
        assert_eq!(decoded.probe, 3);
        assert_eq!(decoded.value, 7.0);
    }

    #[test]
    fn sensor_text_wire_encodes_fixed_width_fields() {
        let t = SensorTextWire {
            ph: "?I,pH,1.98,e".to_string(),
            temp: [
                "?I,RTD,1.2,e".to_string(),
                "?I,RTD,1.2,e".to_string(),
                "?I,RTD,1.2,e".to_string(),
            ],
        };
        let mut w = ByteWriter::new();
        t.encode(&mut w);
        let bytes = w.finish();
        assert_eq!(bytes.len(), SENSOR_TEXT_FIELD_LEN * 4);
    }
}
