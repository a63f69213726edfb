//! # Sensor Board Firmware
//!
//! TCP-attached water-chemistry sensor controller: one pH probe shared for
//! monitoring and three independent temperature probes, each driving its own
//! PID-tuned heater channel. Accepts one client connection at a time and
//! dispatches length-prefixed binary command frames to a
//! [`pump_core::sensor::SensorController`].
//!
//! ```bash
//! sensor_board --config /etc/pump/sensor_board.toml
//! ```

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use pump_common::config::BoardConfig;
use pump_common::hal::{I2cProbe, PwmOutput};
use pump_common::protocol::{HEADER_LEN, PID_CHANNEL_COUNT};
use pump_common::state::PidParams;
use pump_core::sensor::{SensorController, SysInfo};
use pump_core::sim::{SimOutputPin, SimProbe, SimPwm, SimReadTimer};

/// Sensor board firmware entry point.
#[derive(Parser, Debug)]
#[command(name = "sensor_board")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Networked water-chemistry sensor controller")]
struct Args {
    /// Path to the board configuration file.
    #[arg(short, long, default_value = "sensor_board.toml")]
    config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(&args) {
        error!("sensor board startup failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("sensor board firmware v{} starting", env!("CARGO_PKG_VERSION"));

    let config = BoardConfig::load(&args.config)?;

    let sys_info = SysInfo {
        fw_version: env!("CARGO_PKG_VERSION").to_string(),
        board_id: config.board_id.clone(),
        ip_addr: "0.0.0.0".to_string(),
        mac_addr: "00:00:00:00:00:00".to_string(),
    };

    let pid_defaults: [PidParams; PID_CHANNEL_COUNT] = std::array::from_fn(|i| {
        config.pid_defaults.get(i).copied().unwrap_or_default()
    });

    let (deadline_tx, deadline_rx) = mpsc::channel();

    let temp_probes: [Box<dyn I2cProbe>; PID_CHANNEL_COUNT] = std::array::from_fn(|i| {
        Box::new(SimProbe::new(config.temp_i2c_addresses[i], 22.0 + i as f32)) as Box<dyn I2cProbe>
    });
    let heaters: [Box<dyn PwmOutput>; PID_CHANNEL_COUNT] =
        std::array::from_fn(|_| Box::new(SimPwm::default()) as Box<dyn PwmOutput>);

    let mut controller = SensorController::new(
        Box::new(SimProbe::new(config.ph_i2c_address, 7.0)),
        temp_probes,
        heaters,
        Box::new(SimOutputPin::new("sensor_status_led")),
        Box::new(SimOutputPin::new("sensor_fault_led")),
        SimReadTimer::new(deadline_tx),
        pid_defaults,
        sys_info,
    );

    controller.init_hardware();

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))?;
    info!(port = config.listen_port, "listening for sensor board client");

    loop {
        let (stream, peer) = listener.accept()?;
        info!(%peer, "client connected");
        controller.on_client_connected();
        if let Err(e) = serve_client(&mut controller, stream, &deadline_rx) {
            warn!("client session ended: {}", e);
        }
        controller.on_client_disconnected();
        info!(%peer, "client disconnected");
    }
}

/// Serve one client to completion. The read-cycle deadline armed by
/// `SEND_READ_CMD` fires on its own thread (see [`SimReadTimer`]); every poll
/// of the socket's read timeout also drains that channel so a deadline isn't
/// missed while no frame is arriving.
fn serve_client(
    controller: &mut SensorController<SimReadTimer>,
    mut stream: TcpStream,
    deadline_rx: &mpsc::Receiver<()>,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_millis(10)))?;

    let mut header_buf = [0u8; HEADER_LEN];
    loop {
        while deadline_rx.try_recv().is_ok() {
            controller.on_read_deadline();
        }

        match stream.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }

        let packet_length = u16::from_le_bytes([header_buf[0], header_buf[1]]) as usize;
        let mut frame = header_buf.to_vec();
        if packet_length > HEADER_LEN {
            let mut body = vec![0u8; packet_length - HEADER_LEN];
            stream.read_exact(&mut body)?;
            frame.extend_from_slice(&body);
        }

        let reply = controller.dispatch(&frame);
        stream.write_all(&reply)?;
        controller.refresh_leds();
    }
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
