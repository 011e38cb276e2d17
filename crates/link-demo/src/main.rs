//! Host-side demo binary driving one peer of a link engine over a real
//! serial port. Grounded on the teacher workspace's own host-side link
//! tester (`dxkb-split-link-tester`), trimmed to the pieces this expanded
//! spec actually needs: open a port, register a local port number, either
//! send a run of counting sample messages or just listen and print what
//! arrives.

use clap::Parser;
use link_engine::{ClientMsg, LinkConfig, PayloadHeader, UartWriter};
use serialport::SerialPort;
use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Parser)]
#[command(about = "Drive one peer of a link-engine connection over a serial port")]
struct Args {
    /// Serial device path, e.g. /dev/ttyUSB0
    port: String,

    #[arg(long, default_value_t = 115_200)]
    baud_rate: u32,

    /// Local port number this process registers and listens on.
    #[arg(long, default_value_t = 100)]
    local_port: u16,

    /// Port number on the peer to address outgoing sends to.
    #[arg(long, default_value_t = 100)]
    peer_port: u16,

    /// Send this many counting sample messages, then keep listening. If
    /// omitted, this process only listens.
    #[arg(long)]
    send_count: Option<u32>,
}

struct SerialWriter {
    port: Mutex<Box<dyn SerialPort>>,
}

impl UartWriter for SerialWriter {
    fn write_frame(&self, bytes: &[u8]) -> std::io::Result<()> {
        self.port.lock().unwrap().write_all(bytes)
    }
}

struct SerialReader(Box<dyn SerialPort>);

impl Read for SerialReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

fn build_sample_payload(src_port: u16, dst_port: u16, counter: u32) -> Vec<u8> {
    let header = PayloadHeader {
        src_port,
        dst_port,
        pkt_type: 0,
    };
    let body = counter.to_le_bytes();
    let mut payload = vec![0u8; 5 + body.len()];
    header.write(&mut payload);
    payload[5..].copy_from_slice(&body);
    payload
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let port = serialport::new(&args.port, args.baud_rate)
        .timeout(Duration::from_millis(50))
        .open()?;
    let reader = port.try_clone()?;

    let config = LinkConfig::default();
    let handle = link_engine::init(
        config,
        Box::new(SerialWriter {
            port: Mutex::new(port),
        }),
        Box::new(SerialReader(reader)),
    );

    let endpoint = handle.register(args.local_port);

    if let Some(count) = args.send_count {
        for i in 0..count {
            let payload = build_sample_payload(args.local_port, args.peer_port, i);
            match handle.send_command(payload, 0) {
                Ok(true) => log::info!("sample {i} acknowledged"),
                Ok(false) => log::warn!("sample {i} got a reply of an unexpected kind"),
                Err(e) => log::error!("sample {i} failed: {e}"),
            }
        }
    }

    log::info!("listening on port {}", args.local_port);
    loop {
        match endpoint.receiver.recv() {
            Ok(ClientMsg::PktRdy(packet)) => {
                log::info!(
                    "received {} bytes from port {}",
                    packet.data.len(),
                    packet.header.src_port
                );
                let _ = packet.release();
            }
            Ok(other) => log::debug!("unexpected client message: {other:?}"),
            Err(_) => break,
        }
    }

    Ok(())
}
