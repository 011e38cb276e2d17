//! Mailbox message shapes. The original firmware expressed these as a single
//! `msg_t` carrying a type tag and a `{pointer, value}` union; here each
//! direction of traffic gets its own small tagged enum instead.

use crate::error::LinkError;
use crate::handoff::HandoffPacket;
use std::time::Duration;

/// Largest payload (header included) a single data frame may carry.
pub const MAX_PKT_SIZE: usize = 64;
/// Length, in bytes, of the fixed payload header.
pub const HEADER_LEN: usize = 5;

/// `{src_port, dst_port, pkt_type}`, the first `HEADER_LEN` bytes of every
/// data payload. Everything after it is opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub pkt_type: u8,
}

impl PayloadHeader {
    pub fn parse(buf: &[u8]) -> Option<(Self, &[u8])> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let src_port = u16::from_le_bytes([buf[0], buf[1]]);
        let dst_port = u16::from_le_bytes([buf[2], buf[3]]);
        let pkt_type = buf[4];
        Some((
            Self {
                src_port,
                dst_port,
                pkt_type,
            },
            &buf[HEADER_LEN..],
        ))
    }

    pub fn write(&self, out: &mut [u8]) -> usize {
        out[0..2].copy_from_slice(&self.src_port.to_le_bytes());
        out[2..4].copy_from_slice(&self.dst_port.to_le_bytes());
        out[4] = self.pkt_type;
        HEADER_LEN
    }
}

/// A consumer or producer's own mailbox, registered on a port and also used
/// as the reply address for `Send`, matching `hdlc_send_command`'s dual use
/// of a single mailbox for both subscription and command replies.
pub type ClientMailbox = crossbeam_channel::Sender<ClientMsg>;
pub type ClientReceiver = crossbeam_channel::Receiver<ClientMsg>;

/// Engine -> client traffic.
#[derive(Debug)]
pub enum ClientMsg {
    /// The frame this client sent has been acknowledged.
    SendSuccess,
    /// The UART is currently locked by another outstanding frame; back off
    /// for the given duration and re-post `Send`.
    RetryWithTimeout(Duration),
    /// A validated data frame addressed to this client's port has arrived.
    /// The packet must be released via `HandoffPacket::release`.
    PktRdy(HandoffPacket),
    /// The engine rejected the `Send` outright; it was never put on the wire.
    SendRejected(LinkError),
}

/// Client/RX-pump -> engine traffic.
pub enum EngineMsg {
    /// The RX byte ring has at least one complete frame boundary to drain.
    Recv,
    /// Send `payload` as a new data frame; reply on `reply_to`.
    Send {
        payload: Vec<u8>,
        reply_to: ClientMailbox,
    },
}

/// A client's own (sender, receiver) pair: the sender is handed to the
/// engine as `reply_to` and registered in the port table; the receiver is
/// polled by `send_command` or the consumer's own receive loop.
pub struct ClientEndpoint {
    pub sender: ClientMailbox,
    pub receiver: ClientReceiver,
}

impl ClientEndpoint {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self { sender, receiver }
    }
}
