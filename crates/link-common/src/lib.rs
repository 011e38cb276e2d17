//! Cross-cutting conventions shared by the link engine and its demo binary:
//! the `dev_*!` logging macros, feature-gated the same way as the rest of
//! this workspace so a caller that disables `dev-log` pays nothing for it.

mod devlog;

#[cfg(feature = "dev-log")]
pub use log as __log;
