use std::time::Duration;

/// Tunable parameters of the link engine. All default values mirror the
/// constants observed in the original firmware (`RTRY_TIMEO_USEC`,
/// `RETRANSMIT_TIMEO_USEC`, `HDLC_MAX_PKT_SIZE`, `HDLC_MAILBOX_SIZE`), but
/// unlike that firmware they're runtime-configurable so a test harness can
/// shrink timeouts instead of waiting out real hardware timing.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long a producer is told to back off after `Send` is rejected
    /// because the UART is currently locked.
    pub retry_timeout: Duration,
    /// How long the engine waits for an ACK/NACK before retransmitting the
    /// outstanding data frame.
    pub retransmit_timeout: Duration,
    /// Largest payload, header included, a single data frame may carry.
    pub max_pkt_size: usize,
    /// Bound on every mailbox the engine hands out (its own and consumers').
    pub mailbox_size: usize,
    /// Capacity of the raw RX byte ring between the UART reader thread and
    /// the engine.
    pub uart_ring_size: usize,
    /// Overall budget for `send_command`'s blocking wait, across any number
    /// of internal retries.
    pub send_command_timeout: Duration,
    /// Optional cap on retransmissions of a single outstanding frame before
    /// the engine gives up and releases the UART lock. `None` reproduces the
    /// original firmware's behavior of retrying indefinitely.
    pub max_retransmissions: Option<u32>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            retry_timeout: Duration::from_micros(100_000),
            retransmit_timeout: Duration::from_micros(50_000),
            max_pkt_size: 64,
            mailbox_size: 100,
            uart_ring_size: 512,
            send_command_timeout: Duration::from_millis(2000),
            max_retransmissions: None,
        }
    }
}
