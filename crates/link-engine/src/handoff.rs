//! RX_A/RX_H exclusive-then-shared buffer handoff.
//!
//! The original firmware copies its assembly buffer into a second buffer
//! guarded by a plain mutex, hands a pointer to it to the consumer, and
//! trusts the consumer to call `hdlc_pkt_release`. A `std::sync::MutexGuard`
//! can't be carried across a mailbox message in Rust, so `Handoff` instead
//! acts as a gate: the engine must `acquire` it before minting a fresh
//! `HandoffPacket`, and the consumer returns it by consuming the packet via
//! `release`. At most one packet is ever in flight per `Handoff`.

use crate::error::LinkError;
use crate::message::PayloadHeader;
use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug)]
pub struct Handoff {
    held: Mutex<bool>,
    cv: Condvar,
}

impl Handoff {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            held: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    /// Blocks until any previously delivered packet has been released, then
    /// marks RX_H held again. Called by the engine before copying RX_A into
    /// a fresh `HandoffPacket`.
    pub(crate) fn acquire(&self) {
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.cv.wait(held).unwrap();
        }
        *held = true;
    }

    /// Returns RX_H ownership to the engine. Errors if called while not
    /// held, which is the only way a double release can occur since
    /// `HandoffPacket::release` consumes its packet by value.
    pub(crate) fn release(&self) -> Result<(), LinkError> {
        let mut held = self.held.lock().unwrap();
        if !*held {
            return Err(LinkError::HandoffNotHeld);
        }
        *held = false;
        self.cv.notify_one();
        Ok(())
    }
}

/// A validated data frame payload, on loan from the engine's RX_H buffer.
#[derive(Debug)]
pub struct HandoffPacket {
    pub header: PayloadHeader,
    pub data: Vec<u8>,
    handoff: Arc<Handoff>,
}

impl HandoffPacket {
    pub(crate) fn new(header: PayloadHeader, data: Vec<u8>, handoff: Arc<Handoff>) -> Self {
        Self {
            header,
            data,
            handoff,
        }
    }

    /// Releases RX_H back to the engine so it may deliver the next packet.
    pub fn release(self) -> Result<(), LinkError> {
        self.handoff.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_without_hold_is_an_error() {
        let handoff = Handoff::new();
        assert_eq!(handoff.release(), Err(LinkError::HandoffNotHeld));
    }

    #[test]
    fn acquire_then_release_round_trips() {
        let handoff = Handoff::new();
        handoff.acquire();
        assert_eq!(handoff.release(), Ok(()));
    }

    #[test]
    fn double_release_is_an_error() {
        let handoff = Handoff::new();
        handoff.acquire();
        assert_eq!(handoff.release(), Ok(()));
        assert_eq!(handoff.release(), Err(LinkError::HandoffNotHeld));
    }

    #[test]
    fn second_acquire_blocks_until_release() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;
        use std::time::Duration;

        let handoff = Handoff::new();
        handoff.acquire();

        let acquired = Arc::new(AtomicBool::new(false));
        let handoff2 = Arc::clone(&handoff);
        let acquired2 = Arc::clone(&acquired);
        let t = thread::spawn(move || {
            handoff2.acquire();
            acquired2.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        handoff.release().unwrap();
        t.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
