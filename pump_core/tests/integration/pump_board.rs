//! End-to-end pump board scenarios, driving `PumpController::dispatch`
//! through the public wire protocol and the public `pump_core::sim` fakes
//! rather than the private fixtures in `pump_core::pump`'s own unit tests.

use pump_common::protocol::{
    ByteReader, ByteWriter, ErrorCode, FlowConfigWire, FrameHeader, HardwareConfigWire, PumpFid,
    HEADER_LEN,
};
use pump_common::state::{HardwareConfig, PumpState};
use pump_core::pump::{PumpController, SysInfo};
use pump_core::sim::{SimInputPin, SimOutputPin, SimStepperDriver, SimTimer};

fn request(fid: PumpFid, body: &[u8]) -> Vec<u8> {
    let header = FrameHeader::new(fid as u16, body.len() as u16);
    let mut out = header.encode().to_vec();
    out.extend_from_slice(body);
    out
}

fn controller() -> PumpController<SimOutputPin, SimTimer, SimStepperDriver> {
    PumpController::new(
        SimOutputPin::new("step"),
        SimTimer::default(),
        SimStepperDriver::default(),
        Box::new(SimInputPin),
        Box::new(SimInputPin),
        Box::new(SimInputPin),
        Box::new(SimOutputPin::new("green_led")),
        Box::new(SimOutputPin::new("yellow_led")),
        Box::new(SimOutputPin::new("red_led")),
        HardwareConfig::default(),
        SysInfo {
            fw_version: "1.0.0".into(),
            board_id: "pump-it".into(),
            ip_addr: "10.0.0.6".into(),
            mac_addr: "00:11:22:33:44:66".into(),
        },
    )
}

fn status(reply: &[u8]) -> (PumpState, f32) {
    let header = FrameHeader::decode(reply).unwrap();
    assert_eq!(header.error, ErrorCode::Ok.code());
    let mut r = ByteReader::new(&reply[HEADER_LEN..]);
    let state = PumpState::from_u8(r.u8().unwrap()).unwrap();
    let _pump_error = r.u8().unwrap();
    let supplied_volume_ml = r.f32().unwrap();
    (state, supplied_volume_ml)
}

fn valid_flow() -> FlowConfigWire {
    FlowConfigWire {
        target_volume_ml: 0.01,
        target_flow_rate_mlmin: 60.0,
        syringe_diameter_mm: 50.0,
        direction: 1,
    }
}

#[test]
fn client_connect_admits_idle_then_full_run_returns_to_idle() {
    let mut pc = controller();
    pc.init_hardware();
    pc.on_client_connected();

    let (state, _) = status(&pc.dispatch(&request(PumpFid::GetStatus, &[])));
    assert_eq!(state, PumpState::Idle);

    let mut w = ByteWriter::new();
    valid_flow().encode(&mut w);
    let reply = pc.dispatch(&request(PumpFid::SetFlowConfig, &w.finish()));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());

    let reply = pc.dispatch(&request(PumpFid::StartPump, &[]));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());

    let (state, _) = status(&pc.dispatch(&request(PumpFid::GetStatus, &[])));
    assert_eq!(state, PumpState::PumpRunning);

    for _ in 0..100_000 {
        let (state, _) = status(&pc.dispatch(&request(PumpFid::GetStatus, &[])));
        if state == PumpState::Idle {
            break;
        }
        pc.tick();
    }

    let (state, supplied_volume_ml) = status(&pc.dispatch(&request(PumpFid::GetStatus, &[])));
    assert_eq!(state, PumpState::Idle);
    assert!(supplied_volume_ml > 0.0, "motion should have delivered some volume");
}

#[test]
fn admission_policy_gates_configuration_fids_while_running_but_admits_stop() {
    let mut pc = controller();
    pc.init_hardware();
    pc.on_client_connected();

    let mut w = ByteWriter::new();
    valid_flow().encode(&mut w);
    pc.dispatch(&request(PumpFid::SetFlowConfig, &w.finish()));
    pc.dispatch(&request(PumpFid::StartPump, &[]));

    let reply = pc.dispatch(&request(PumpFid::SetHardwareConfig, &{
        let mut w = ByteWriter::new();
        HardwareConfigWire {
            step_mode: 16,
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
        }
        .encode(&mut w);
        w.finish()
    }));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::PumpRunning.code());

    let reply = pc.dispatch(&request(PumpFid::StopPump, &[]));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());

    let (state, _) = status(&pc.dispatch(&request(PumpFid::GetStatus, &[])));
    assert_eq!(state, PumpState::Idle);

    let reply = pc.dispatch(&request(PumpFid::GetHardwareConfig, &[]));
    assert_eq!(FrameHeader::decode(&reply).unwrap().error, ErrorCode::Ok.code());
}
