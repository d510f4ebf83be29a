//! One read-parse-dispatch-reply exchange over an open handle pair.

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::debug;

use faultline_engine::FaultEngine;

use crate::dispatch::dispatch;
use crate::protocol::parse;
use crate::transport::{read_line, write_reply};

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// How a completed exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// One command was read and one reply written; the payload length of
    /// the command line is carried for diagnostics.
    Served(usize),
    /// The peer hung up before sending a command.
    PeerClosed,
}

/// Handle-level failures, distinguished from a clean peer close.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading the command line failed.
    #[error("failed to read command: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
    /// Writing the reply failed.
    #[error("failed to write reply: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    /// Whether the failure is really the peer hanging up mid-exchange.
    ///
    /// A broken pipe on either side is the normal disconnect signal for
    /// FIFO clients and must not count against the listener's error
    /// budget.
    #[must_use]
    pub fn is_peer_close(&self) -> bool {
        matches!(
            self,
            Self::Read { source } | Self::Write { source }
                if source.kind() == io::ErrorKind::BrokenPipe
        )
    }
}

/// Serves exactly one command/reply exchange.
///
/// A line that fails to parse never reaches the engine; the reply is the
/// textual `-1` and the descriptive error stays local, logged at debug
/// level. An empty line reads as a hang-up, not a command — legacy
/// clients close their end by sending a bare newline and expect the
/// listener to reopen.
pub fn serve_once<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    engine: &dyn FaultEngine,
) -> Result<SessionStatus, SessionError> {
    let line = read_line(reader).map_err(|source| SessionError::Read { source })?;
    let Some(line) = line else {
        return Ok(SessionStatus::PeerClosed);
    };
    if line.is_empty() {
        return Ok(SessionStatus::PeerClosed);
    }

    let text = String::from_utf8_lossy(&line);
    let code = match parse(&text) {
        Ok(command) => {
            let code = dispatch(engine, &command);
            debug!(
                target: SESSION_TARGET,
                point = command.point_name(),
                code,
                "command dispatched"
            );
            code
        }
        Err(error) => {
            debug!(
                target: SESSION_TARGET,
                error = %error,
                line = %text,
                "rejected malformed command"
            );
            -1
        }
    };

    write_reply(writer, code).map_err(|source| SessionError::Write { source })?;
    Ok(SessionStatus::Served(line.len()))
}
