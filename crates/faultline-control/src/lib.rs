//! Remote-control plane for the faultline fault-injection library.
//!
//! A process that links this crate can be told from the outside to turn
//! named failure points on or off while it runs. Commands arrive as
//! single text lines over one of two transports:
//!
//! * a per-process named-pipe pair (`<basename>-<pid>.in` for commands,
//!   `<basename>-<pid>.out` for replies), always created;
//! * an optional TCP listener, activated only when the
//!   `FAULTLINE_RC_PORT` environment variable is set. Each TCP
//!   connection carries exactly one command/reply exchange.
//!
//! The wire grammar is `<command> <key=value>[,key=value...]` with the
//! commands `disable`, `enable`, `enable_random` and
//! `enable_stack_by_name`; the reply is the engine's decimal result code
//! (`0` success, negative failure). Lines are capped at 512 bytes and
//! longer input is truncated, not rejected, to stay wire compatible with
//! existing clients.
//!
//! Everything here runs inside the host process's address space, so the
//! overriding rule is containment: transport errors retry with a bounded
//! budget, parse errors answer `-1` without escalating, and no failure
//! in this crate may take the host down. Control-plane threads hold a
//! [`RecursionGuard`] so a wired-up engine can exempt them from
//! interception; otherwise an armed failure point could sever the only
//! channel able to disable it.
//!
//! The crate never installs a tracing subscriber; the host owns that.

mod config;
mod dispatch;
mod guard;
mod lifecycle;
mod listener;
mod protocol;
mod session;
mod transport;

pub use config::{ADDR_ENV_VAR, ControlConfig, PORT_ENV_VAR, TcpEndpoint};
pub use dispatch::dispatch;
pub use guard::{RecursionGuard, control_plane_thread};
pub use lifecycle::{
    ControlPlane, StartupError, activate, deactivate, is_active, reinitialize_after_fork,
};
pub use protocol::{Command, ParseError, parse};
pub use session::{SessionError, SessionStatus, serve_once};
pub use transport::{MAX_LINE, read_line, write_reply};
