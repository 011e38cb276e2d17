//! The ARQ and arbitration state machine. Grounded on `_hdlc()`'s main loop
//! and `_hdlc_receive()` in the original firmware: a single event loop that
//! either services its mailbox or, while a frame is outstanding, times out
//! and retransmits.

use crate::codec::{self, DecodeOutcome, Decoder, FrameKind};
use crate::config::LinkConfig;
use crate::handoff::{Handoff, HandoffPacket};
use crate::message::{ClientEndpoint, ClientMailbox, ClientMsg, EngineMsg, PayloadHeader};
use crate::registry::PortRegistry;
use crate::uart::{RxRing, UartWriter};
use link_common::{dev_debug, dev_error, dev_warn};
use std::sync::Arc;
use std::time::Instant;

/// Shared handle producers and consumers use to talk to a running engine.
/// Cloning it is cheap; every clone refers to the same engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    mailbox: crossbeam_channel::Sender<EngineMsg>,
    registry: Arc<PortRegistry>,
    rx_ring: Arc<RxRing>,
    config: LinkConfig,
}

impl EngineHandle {
    /// Raw handle to the engine's own mailbox, for callers that want to
    /// post `EngineMsg::Send` directly instead of going through
    /// `send_command`.
    pub fn raw_mailbox(&self) -> crossbeam_channel::Sender<EngineMsg> {
        self.mailbox.clone()
    }

    /// Subscribes a fresh mailbox to `port` and returns the endpoint the
    /// caller should poll for `PktRdy` deliveries (and, if it also sends,
    /// pass to `send_command`).
    pub fn register(&self, port: u16) -> ClientEndpoint {
        let endpoint = ClientEndpoint::new(self.config.mailbox_size);
        self.registry.register(port, endpoint.sender.clone());
        endpoint
    }

    pub fn unregister(&self, port: u16) {
        self.registry.unregister(port);
    }

    /// Convenience for a one-off send: registers a scratch endpoint, sends
    /// `payload`, and waits for a conclusive reply. See
    /// [`crate::client::send_command`] for the full contract.
    pub fn send_command(
        &self,
        payload: Vec<u8>,
        expected_reply_kind: u8,
    ) -> Result<bool, crate::error::LinkError> {
        let endpoint = ClientEndpoint::new(self.config.mailbox_size);
        crate::client::send_command(&self.mailbox, &self.config, &endpoint, payload, expected_reply_kind)
    }

    pub(crate) fn rx_ring(&self) -> Arc<RxRing> {
        Arc::clone(&self.rx_ring)
    }
}

pub struct Engine {
    config: LinkConfig,
    uart: Box<dyn UartWriter>,
    rx_ring: Arc<RxRing>,
    registry: Arc<PortRegistry>,
    handoff: Arc<Handoff>,
    mailbox_rx: crossbeam_channel::Receiver<EngineMsg>,
    decoder: Decoder,
    send_seq: u32,
    recv_seq: u32,
    uart_lock: bool,
    sender_of_outstanding: Option<ClientMailbox>,
    last_send_frame: Vec<u8>,
    last_tx_time: Instant,
    retransmit_count: u32,
}

impl Engine {
    pub fn new(config: LinkConfig, uart: Box<dyn UartWriter>) -> (Self, EngineHandle) {
        let (mailbox_tx, mailbox_rx) = crossbeam_channel::bounded(config.mailbox_size);
        let rx_ring = Arc::new(RxRing::new(config.uart_ring_size));
        let registry = Arc::new(PortRegistry::new());
        let handoff = Handoff::new();
        let decoder = Decoder::new(config.max_pkt_size);

        let handle = EngineHandle {
            mailbox: mailbox_tx.clone(),
            registry: Arc::clone(&registry),
            rx_ring: Arc::clone(&rx_ring),
            config: config.clone(),
        };

        let engine = Self {
            config,
            uart,
            rx_ring,
            registry,
            handoff,
            mailbox_rx,
            decoder,
            send_seq: 0,
            recv_seq: 0,
            uart_lock: false,
            sender_of_outstanding: None,
            last_send_frame: Vec::new(),
            last_tx_time: Instant::now(),
            retransmit_count: 0,
        };

        (engine, handle)
    }

    /// Runs the event loop on the calling thread until the mailbox is
    /// disconnected (every `EngineHandle` and the RX pump have been
    /// dropped).
    pub fn run(mut self) {
        loop {
            let msg = if self.uart_lock {
                let deadline = self.last_tx_time + self.config.retransmit_timeout;
                match self.mailbox_rx.recv_deadline(deadline) {
                    Ok(msg) => msg,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        self.on_retransmit_deadline();
                        continue;
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
                }
            } else {
                match self.mailbox_rx.recv() {
                    Ok(msg) => msg,
                    Err(_) => return,
                }
            };
            self.handle(msg);
        }
    }

    fn handle(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::Recv => self.drain_rx(),
            EngineMsg::Send { payload, reply_to } => self.on_send(payload, reply_to),
        }
    }

    fn drain_rx(&mut self) {
        let mut scratch = vec![0u8; self.config.max_pkt_size];
        while let Some(byte) = self.rx_ring.pop() {
            match self.decoder.feed(byte, &mut scratch) {
                DecodeOutcome::NeedMore => {}
                DecodeOutcome::BadFrame => {
                    dev_warn!("dropping frame: bad FCS or malformed escape sequence");
                }
                DecodeOutcome::FrameReady { kind, seq, length } => {
                    let payload = scratch[..length].to_vec();
                    self.on_frame(kind, seq, &payload);
                }
            }
        }
    }

    fn on_frame(&mut self, kind: FrameKind, seq: u8, payload: &[u8]) {
        match kind {
            FrameKind::Data => self.on_data_frame(seq, payload),
            FrameKind::Ack | FrameKind::Nack => self.on_ack_frame(seq),
        }
    }

    fn on_data_frame(&mut self, seq: u8, payload: &[u8]) {
        let expected = (self.recv_seq % 8) as u8;
        let previous = (self.recv_seq.wrapping_sub(1) % 8) as u8;

        if seq == expected {
            self.emit_ack(seq);
            self.deliver(payload);
            self.recv_seq = self.recv_seq.wrapping_add(1);
        } else if seq == previous {
            dev_debug!("re-acking duplicate data frame seq {seq}");
            self.emit_ack(seq);
        } else {
            dev_warn!(
                "dropping data frame with out-of-window seq {seq} (expected {expected} or {previous})"
            );
        }
    }

    fn deliver(&mut self, payload: &[u8]) {
        let Some((header, body)) = PayloadHeader::parse(payload) else {
            dev_warn!("dropping data frame with a malformed header");
            return;
        };

        self.handoff.acquire();
        match self.registry.lookup(header.dst_port) {
            Some(mailbox) => {
                let packet = HandoffPacket::new(header, body.to_vec(), Arc::clone(&self.handoff));
                if mailbox.try_send(ClientMsg::PktRdy(packet)).is_err() {
                    dev_warn!("consumer mailbox for port {} full or gone, dropping packet", header.dst_port);
                    let _ = self.handoff.release();
                }
            }
            None => {
                dev_warn!("no consumer registered for port {}", header.dst_port);
                let _ = self.handoff.release();
            }
        }
    }

    fn on_ack_frame(&mut self, seq: u8) {
        if !self.uart_lock {
            return;
        }
        if seq != (self.send_seq % 8) as u8 {
            return;
        }
        self.uart_lock = false;
        self.send_seq = self.send_seq.wrapping_add(1);
        self.retransmit_count = 0;
        if let Some(reply_to) = self.sender_of_outstanding.take() {
            let _ = reply_to.try_send(ClientMsg::SendSuccess);
        }
    }

    fn on_send(&mut self, payload: Vec<u8>, reply_to: ClientMailbox) {
        if self.uart_lock {
            let _ = reply_to.try_send(ClientMsg::RetryWithTimeout(self.config.retry_timeout));
            return;
        }
        if payload.len() > self.config.max_pkt_size {
            dev_error!(
                "rejecting send: payload {} bytes exceeds max_pkt_size {}",
                payload.len(),
                self.config.max_pkt_size
            );
            let _ = reply_to.try_send(ClientMsg::SendRejected(crate::error::LinkError::PayloadTooLarge));
            return;
        }

        let seq = (self.send_seq % 8) as u8;
        let mut frame = vec![0u8; codec::max_frame_len(payload.len())];
        let len = codec::encode_frame(FrameKind::Data, seq, &payload, &mut frame);
        frame.truncate(len);

        self.uart_lock = true;
        self.retransmit_count = 0;
        self.sender_of_outstanding = Some(reply_to);
        self.last_send_frame = frame;
        self.transmit_outstanding();
    }

    fn on_resend(&mut self) {
        if !self.uart_lock {
            return;
        }
        dev_debug!("retransmitting seq {}", self.send_seq % 8);
        self.retransmit_count += 1;
        self.transmit_outstanding();
    }

    fn on_retransmit_deadline(&mut self) {
        if let Some(max) = self.config.max_retransmissions {
            if self.retransmit_count >= max {
                dev_error!(
                    "giving up on seq {} after {} retransmissions",
                    self.send_seq % 8,
                    self.retransmit_count
                );
                self.uart_lock = false;
                self.sender_of_outstanding = None;
                return;
            }
        }
        self.on_resend();
    }

    fn transmit_outstanding(&mut self) {
        if let Err(e) = self.uart.write_frame(&self.last_send_frame) {
            dev_error!("uart write failed: {e}");
        }
        self.last_tx_time = Instant::now();
    }

    fn emit_ack(&mut self, seq: u8) {
        let mut frame = vec![0u8; codec::max_frame_len(0)];
        let len = codec::encode_frame(FrameKind::Ack, seq, &[], &mut frame);
        frame.truncate(len);
        if let Err(e) = self.uart.write_frame(&frame) {
            dev_error!("uart write (ack) failed: {e}");
        }
    }
}
