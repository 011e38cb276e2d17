//! HDLC-derived framing: 0x7E flag, 0x7D/0x20 byte stuffing, FCS-16 (CCITT).
//!
//! The FCS is computed with `crc::CRC_16_IBM_SDLC`, which is the bit-reversed
//! form of the classic CCITT-16 (poly 0x8408 reflected, init 0xFFFF) used by
//! yahdlc and the rest of the HDLC family.

use crc::{Crc, Table};

pub const FLAG: u8 = 0x7E;
pub const ESC: u8 = 0x7D;
pub const ESC_MASK: u8 = 0x20;

static FCS_16: Crc<u16, Table<1>> = Crc::<u16, Table<1>>::new(&crc::CRC_16_IBM_SDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Data,
    Ack,
    Nack,
}

impl FrameKind {
    fn to_bits(self) -> u8 {
        match self {
            FrameKind::Data => 0,
            FrameKind::Ack => 1,
            FrameKind::Nack => 2,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(FrameKind::Data),
            1 => Some(FrameKind::Ack),
            2 => Some(FrameKind::Nack),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    NeedMore,
    FrameReady {
        kind: FrameKind,
        seq: u8,
        length: usize,
    },
    BadFrame,
}

/// Worst-case encoded length for a frame carrying up to `max_pkt_size`
/// payload bytes: control byte + payload + 2-byte FCS, each byte possibly
/// escaped, bracketed by two flag bytes.
pub fn max_frame_len(max_pkt_size: usize) -> usize {
    2 * (max_pkt_size + 3) + 2
}

/// Incremental decoder. Feed it one raw (post-RX-ring) byte at a time; it
/// owns the control state (in-frame / escape-pending) across calls the same
/// way the original codec threaded state across interrupt-driven byte
/// arrivals.
pub struct Decoder {
    started: bool,
    escape_next: bool,
    buf: Vec<u8>,
    max_len: usize,
}

impl Decoder {
    pub fn new(max_pkt_size: usize) -> Self {
        Self {
            started: false,
            escape_next: false,
            buf: Vec::with_capacity(max_pkt_size + 3),
            max_len: max_pkt_size + 3,
        }
    }

    pub fn reset(&mut self) {
        self.started = false;
        self.escape_next = false;
        self.buf.clear();
    }

    pub fn feed(&mut self, byte: u8, out: &mut [u8]) -> DecodeOutcome {
        if byte == FLAG {
            if !self.started {
                self.started = true;
                return DecodeOutcome::NeedMore;
            }
            if self.buf.is_empty() {
                // Back-to-back flags between frames; stay "started".
                return DecodeOutcome::NeedMore;
            }
            let outcome = self.finish(out);
            self.reset();
            self.started = true;
            return outcome;
        }

        if !self.started {
            return DecodeOutcome::NeedMore;
        }

        if self.escape_next {
            self.escape_next = false;
            self.push_byte(byte ^ ESC_MASK)
        } else if byte == ESC {
            self.escape_next = true;
            DecodeOutcome::NeedMore
        } else {
            self.push_byte(byte)
        }
    }

    fn push_byte(&mut self, byte: u8) -> DecodeOutcome {
        if self.buf.len() >= self.max_len {
            self.reset();
            return DecodeOutcome::BadFrame;
        }
        self.buf.push(byte);
        DecodeOutcome::NeedMore
    }

    fn finish(&self, out: &mut [u8]) -> DecodeOutcome {
        if self.buf.len() < 3 {
            return DecodeOutcome::BadFrame;
        }
        let (body, fcs_bytes) = self.buf.split_at(self.buf.len() - 2);
        let received_fcs = u16::from_le_bytes([fcs_bytes[0], fcs_bytes[1]]);
        if FCS_16.checksum(body) != received_fcs {
            return DecodeOutcome::BadFrame;
        }
        let control = body[0];
        let Some(kind) = FrameKind::from_bits(control & 0x03) else {
            return DecodeOutcome::BadFrame;
        };
        let seq = (control >> 2) & 0x07;
        let payload = &body[1..];
        if payload.len() > out.len() {
            return DecodeOutcome::BadFrame;
        }
        out[..payload.len()].copy_from_slice(payload);
        DecodeOutcome::FrameReady {
            kind,
            seq,
            length: payload.len(),
        }
    }
}

/// Encodes a complete escaped frame (flags, control byte, payload, FCS) into
/// `out` and returns its length. `out` must be at least
/// `max_frame_len(payload.len())` bytes.
pub fn encode_frame(kind: FrameKind, seq: u8, payload: &[u8], out: &mut [u8]) -> usize {
    let control = kind.to_bits() | (seq << 2);
    let mut body = Vec::with_capacity(payload.len() + 3);
    body.push(control);
    body.extend_from_slice(payload);
    let fcs = FCS_16.checksum(&body);
    body.extend_from_slice(&fcs.to_le_bytes());

    let mut i = 0;
    out[i] = FLAG;
    i += 1;
    for &b in &body {
        if b == FLAG || b == ESC {
            out[i] = ESC;
            i += 1;
            out[i] = b ^ ESC_MASK;
        } else {
            out[i] = b;
        }
        i += 1;
    }
    out[i] = FLAG;
    i + 1
}
