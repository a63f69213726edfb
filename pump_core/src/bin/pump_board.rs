//! # Pump Board Firmware
//!
//! TCP-attached syringe pump controller. Accepts one client connection at a
//! time and dispatches length-prefixed binary command frames to a
//! [`pump_core::pump::PumpController`].
//!
//! ```bash
//! pump_board --config /etc/pump/board.toml
//! ```

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use pump_common::config::BoardConfig;
use pump_common::protocol::HEADER_LEN;
use pump_core::pump::{PumpController, SysInfo};
use pump_core::sim::{SimInputPin, SimOutputPin, SimStepperDriver, SimTimer};

/// Pump board firmware entry point.
#[derive(Parser, Debug)]
#[command(name = "pump_board")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Networked syringe pump controller")]
struct Args {
    /// Path to the board configuration file.
    #[arg(short, long, default_value = "pump_board.toml")]
    config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(&args) {
        error!("pump board startup failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("pump board firmware v{} starting", env!("CARGO_PKG_VERSION"));

    let config = BoardConfig::load(&args.config)?;

    let sys_info = SysInfo {
        fw_version: env!("CARGO_PKG_VERSION").to_string(),
        board_id: config.board_id.clone(),
        ip_addr: "0.0.0.0".to_string(),
        mac_addr: "00:00:00:00:00:00".to_string(),
    };

    let mut controller = PumpController::new(
        SimOutputPin::new("step"),
        SimTimer::default(),
        SimStepperDriver::default(),
        Box::new(SimInputPin),
        Box::new(SimInputPin),
        Box::new(SimInputPin),
        Box::new(SimOutputPin::new("green_led")),
        Box::new(SimOutputPin::new("yellow_led")),
        Box::new(SimOutputPin::new("red_led")),
        config.hardware,
        sys_info,
    );

    controller.init_hardware();

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))?;
    info!(port = config.listen_port, "listening for pump board client");

    loop {
        let (stream, peer) = listener.accept()?;
        info!(%peer, "client connected");
        controller.on_client_connected();
        if let Err(e) = serve_client(&mut controller, stream) {
            warn!("client session ended: {}", e);
        }
        controller.on_client_disconnected();
        info!(%peer, "client disconnected");
    }
}

/// Serve one client to completion. Ticks the motion controller on every
/// read-timeout poll so a single OS thread plays both the foreground
/// dispatch role and the ISR-context motion role, matching the single-client
/// concurrency model (§5): no real hardware timer interrupt exists in this
/// simulation to drive `tick()` independently.
fn serve_client(
    controller: &mut PumpController<SimOutputPin, SimTimer, SimStepperDriver>,
    mut stream: TcpStream,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_millis(10)))?;

    let mut header_buf = [0u8; HEADER_LEN];
    loop {
        match stream.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                controller.tick();
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
