//! `send_command`, the blocking convenience helper grounded on the original
//! `hdlc_send_command`: post a send, then loop on the caller's own mailbox
//! handling success, backoff-and-retry, and unsolicited reply packets,
//! bounded by an overall timeout.

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::message::{ClientEndpoint, ClientMsg, EngineMsg};
use std::time::Instant;

/// Sends `payload` through `engine_mailbox` and waits, within
/// `config.send_command_timeout` overall, for either a `SendSuccess` or a
/// reply packet whose `pkt_type` is compared against `expected_reply_kind`.
/// Returns `Ok(true)` on success or a matching reply, `Ok(false)` if a reply
/// arrived but its `pkt_type` didn't match, `Err(LinkError::SendTimedOut)` if
/// the overall budget expires first, and whatever `LinkError` the engine
/// rejected the send with (e.g. `PayloadTooLarge`) if it never went on the wire.
pub fn send_command(
    engine_mailbox: &crossbeam_channel::Sender<EngineMsg>,
    config: &LinkConfig,
    endpoint: &ClientEndpoint,
    payload: Vec<u8>,
    expected_reply_kind: u8,
) -> Result<bool, LinkError> {
    let deadline = Instant::now() + config.send_command_timeout;

    post_send(engine_mailbox, endpoint, payload.clone())?;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(LinkError::SendTimedOut);
        }

        match endpoint.receiver.recv_timeout(remaining) {
            Ok(ClientMsg::SendSuccess) => return Ok(true),
            Ok(ClientMsg::RetryWithTimeout(backoff)) => {
                std::thread::sleep(backoff.min(remaining));
                post_send(engine_mailbox, endpoint, payload.clone())?;
            }
            Ok(ClientMsg::PktRdy(packet)) => {
                let matched = packet.header.pkt_type == expected_reply_kind;
                let _ = packet.release();
                return Ok(matched);
            }
            Ok(ClientMsg::SendRejected(reason)) => return Err(reason),
            Err(_) => return Err(LinkError::SendTimedOut),
        }
    }
}

fn post_send(
    engine_mailbox: &crossbeam_channel::Sender<EngineMsg>,
    endpoint: &ClientEndpoint,
    payload: Vec<u8>,
) -> Result<(), LinkError> {
    engine_mailbox
        .send(EngineMsg::Send {
            payload,
            reply_to: endpoint.sender.clone(),
        })
        .map_err(|_| LinkError::EngineGone)
}
