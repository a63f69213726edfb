//! Convenient re-exports for consumers of this crate.
//!
//! ```rust
//! use pump_common::prelude::*;
//! ```

pub use crate::config::{BoardConfig, ConfigError, LogLevel};
pub use crate::consts::{FIRST_STEP_CORRECTION, MIN_STEP_INTERVAL_US};
pub use crate::error::{ProbeConnection, PumpError};
pub use crate::hal::{
    DigitalInputPin, DigitalOutputPin, DriverFaultStatus, EzoStatus, HalError, I2cProbe,
    MicrosecondTimer, PwmOutput, StepperDriver,
};
pub use crate::protocol::{
    ByteReader, ByteWriter, CalibrateWire, ChannelRequestWire, DriverFaultWire, ErrorCode,
    FlowConfigWire, FrameHeader, HardwareConfigWire, PidLimitWire, PidParamsWire, ProbeSelect,
    ProbeSelectWire, PumpFid, PumpStatusWire, SENSOR_TEXT_FIELD_LEN, SensorDataWire, SensorFid,
    SensorStatusHeaderWire, SensorTextWire, SetAddressWire, SetPidLimitWire, SetPidMethodWire,
    SetPidStepWire, SetPidWire, SetTempSetpointWire, SysInfoWire, PID_CHANNEL_COUNT,
};
pub use crate::state::{
    AntiWindup, Direction, FlowConfig, HardwareConfig, MotionProfile, PidParams, PidState,
    PumpState, RampState, SensorBoardState,
};
