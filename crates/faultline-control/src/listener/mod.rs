//! Transport listeners for the control plane.
//!
//! The named-pipe listener is the primary channel and serves one long
//! session per pipe pair, reopening on disconnect with a bounded error
//! budget. The TCP listener is opt-in and serves exactly one exchange
//! per accepted connection.

pub(crate) mod fifo;
pub(crate) mod retry;
pub(crate) mod tcp;

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::listener");
