//! End-to-end sensor board read cycle, driving `SensorController::dispatch`
//! against the real, wall-clock-firing `pump_core::sim::SimReadTimer` rather
//! than a test-only timer that fires on demand.

use std::sync::mpsc;
use std::time::Duration;

use pump_common::hal::{I2cProbe, PwmOutput};
use pump_common::protocol::{
    ByteReader, ErrorCode, FrameHeader, SensorFid, HEADER_LEN, PID_CHANNEL_COUNT,
};
use pump_common::state::PidParams;
use pump_core::sensor::{SensorController, SysInfo};
use pump_core::sim::{SimOutputPin, SimProbe, SimPwm, SimReadTimer};

fn request(fid: SensorFid, body: &[u8]) -> Vec<u8> {
    let header = FrameHeader::new(fid as u16, body.len() as u16);
    let mut out = header.encode().to_vec();
    out.extend_from_slice(body);
    out
}

fn pid_params() -> PidParams {
    PidParams {
        dt: 0.5,
        max: 100.0,
        min: 0.0,
        kp: 9.0,
        kd: 0.4,
        ki: 0.006,
        kf: 0.0,
    }
}

#[test]
fn send_read_cmd_then_real_deadline_unblocks_get_sensor_data() {
    let (tx, rx) = mpsc::channel();

    let temp_probes: [Box<dyn I2cProbe>; PID_CHANNEL_COUNT] = std::array::from_fn(|i| {
        Box::new(SimProbe::new(0x66 + i as u8, 22.0 + i as f32)) as Box<dyn I2cProbe>
    });
    let heaters: [Box<dyn PwmOutput>; PID_CHANNEL_COUNT] =
        std::array::from_fn(|_| Box::new(SimPwm::default()) as Box<dyn PwmOutput>);
    let pid_defaults: [PidParams; PID_CHANNEL_COUNT] = std::array::from_fn(|_| pid_params());

    let mut sc = SensorController::new(
        Box::new(SimProbe::new(0x63, 7.2)),
        temp_probes,
        heaters,
        Box::new(SimOutputPin::new("status_led")),
        Box::new(SimOutputPin::new("fault_led")),
        SimReadTimer::new(tx),
        pid_defaults,
        SysInfo {
            fw_version: "1.0.0".into(),
            board_id: "sensor-it".into(),
            ip_addr: "10.0.0.7".into(),
            mac_addr: "00:11:22:33:44:77".into(),
        },
    );
    sc.init_hardware();
    sc.on_client_connected();

    let reply = sc.dispatch(&request(SensorFid::SendReadCmd, &[]));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());

    let reply = sc.dispatch(&request(SensorFid::SendReadCmd, &[]));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::ReadingPending.code());

    let reply = sc.dispatch(&request(SensorFid::GetSensorData, &[]));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::ReadingPending.code());

    rx.recv_timeout(Duration::from_secs(3)).expect("read-cycle deadline never fired");
    sc.on_read_deadline();

    let reply = sc.dispatch(&request(SensorFid::GetSensorData, &[]));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());

    let mut r = ByteReader::new(&reply[HEADER_LEN..]);
    let ph = r.f32().unwrap();
    assert!((ph - 7.2).abs() < 0.01);
    for i in 0..PID_CHANNEL_COUNT {
        let temp = r.f32().unwrap();
        assert!((temp - (22.0 + i as f32)).abs() < 0.01);
    }
}
