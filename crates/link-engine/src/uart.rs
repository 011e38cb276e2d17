//! The UART boundary: a blocking writer the engine owns exclusively while a
//! frame is outstanding, and a byte-ring fed by a dedicated reader thread
//! that stands in for the original's RX interrupt handler (`rx_cb`).

use crate::codec::FLAG;
use crate::message::EngineMsg;
use link_common::dev_warn;
use ringbuffer::{AllocRingBuffer, RingBuffer};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// A blocking, exclusive-access serial transmit path. The engine is the only
/// writer, so no internal synchronization is required of implementors.
pub trait UartWriter: Send {
    fn write_frame(&self, bytes: &[u8]) -> std::io::Result<()>;
}

/// Bounded FIFO of raw RX bytes, written by the reader thread and drained by
/// the engine. Mirrors the circular buffer `rx_cb` pushes into.
pub struct RxRing {
    inner: Mutex<AllocRingBuffer<u8>>,
}

impl RxRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(AllocRingBuffer::new(capacity)),
        }
    }

    /// Pushes a byte, returning `false` (byte dropped) if the ring is full
    /// rather than evicting the oldest byte — a full ring here means the
    /// engine has fallen behind, and the in-progress frame will fail FCS
    /// regardless of which byte gets lost.
    fn push(&self, byte: u8) -> bool {
        let mut ring = self.inner.lock().unwrap();
        if ring.is_full() {
            return false;
        }
        ring.push(byte);
        true
    }

    pub fn pop(&self) -> Option<u8> {
        self.inner.lock().unwrap().dequeue()
    }
}

/// Spawns the RX pump thread: reads one byte at a time from `reader`, pushes
/// it into `ring`, and posts `EngineMsg::Recv` whenever a flag byte arrives
/// so the engine knows there's at least one frame boundary to drain.
pub fn spawn_rx_pump(
    mut reader: Box<dyn Read + Send>,
    ring: Arc<RxRing>,
    engine_tx: crossbeam_channel::Sender<EngineMsg>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut byte = [0u8; 1];
        while reader.read_exact(&mut byte).is_ok() {
            let b = byte[0];
            if !ring.push(b) {
                dev_warn!("rx ring overflow, dropping byte 0x{b:02x}");
            }
            if b == FLAG && engine_tx.try_send(EngineMsg::Recv).is_err() {
                dev_warn!("engine mailbox full, recv notification dropped");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_drops_instead_of_evicting() {
        let ring = RxRing::new(2);
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(!ring.push(3));
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), None);
    }
}
