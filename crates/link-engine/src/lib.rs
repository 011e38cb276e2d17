//! A reliable, full-duplex, stop-and-wait link-layer engine for a
//! point-to-point serial channel. See `codec` for the HDLC-derived framing,
//! `engine` for the ARQ state machine, and `client` for the blocking
//! producer helper.

pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod message;
pub mod registry;
pub mod uart;

pub use config::LinkConfig;
pub use engine::{Engine, EngineHandle};
pub use error::LinkError;
pub use handoff::HandoffPacket;
pub use message::{ClientEndpoint, ClientMailbox, ClientMsg, PayloadHeader, HEADER_LEN, MAX_PKT_SIZE};
pub use uart::UartWriter;

/// Starts the link engine on a dedicated thread and a reader pump on
/// another, and returns a handle other threads use to register ports, send
/// payloads, and receive deliveries.
pub fn init(
    config: LinkConfig,
    uart: Box<dyn UartWriter>,
    reader: Box<dyn std::io::Read + Send>,
) -> EngineHandle {
    let (engine, handle) = Engine::new(config, uart);
    uart::spawn_rx_pump(reader, handle.rx_ring(), handle.raw_mailbox());
    std::thread::spawn(move || engine.run());
    handle
}
