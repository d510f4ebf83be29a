//! Runtime configuration for the remote-control listeners.
//!
//! The named-pipe listener needs only a path basename from the host. The
//! TCP listener is opt-in: it starts only when the port environment
//! variable is present, and binds every interface unless an address is
//! configured. Environment lookup is injectable so tests never mutate
//! the process environment.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Environment variable holding the TCP control port. Absent means the
/// TCP listener never starts.
pub const PORT_ENV_VAR: &str = "FAULTLINE_RC_PORT";

/// Environment variable holding the TCP bind address. Optional.
pub const ADDR_ENV_VAR: &str = "FAULTLINE_RC_ADDR";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

const CONFIG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::config");

/// Address/port pair for the optional TCP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpEndpoint {
    host: String,
    port: u16,
}

impl TcpEndpoint {
    /// Builds an endpoint from an explicit address and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Reads the endpoint from the process environment.
    ///
    /// Returns `None` when [`PORT_ENV_VAR`] is unset or does not parse
    /// as a port; an unparseable value is logged and treated as absent
    /// rather than failing startup.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the endpoint through the given variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let raw_port = lookup(PORT_ENV_VAR)?;
        let Ok(port) = raw_port.trim().parse::<u16>() else {
            warn!(
                target: CONFIG_TARGET,
                value = %raw_port,
                variable = PORT_ENV_VAR,
                "ignoring unparseable control port"
            );
            return None;
        };
        let host = lookup(ADDR_ENV_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        Some(Self { host, port })
    }

    /// Bind address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bind port. Port `0` asks the kernel for an ephemeral port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for TcpEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

/// Configuration consumed by [`crate::ControlPlane::start`].
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pipe_basename: PathBuf,
    tcp: Option<TcpEndpoint>,
}

impl ControlConfig {
    /// Builds a configuration around the pipe basename, picking up the
    /// TCP endpoint from the environment.
    ///
    /// The basename is a path prefix, not a directory: the listener
    /// derives `<basename>-<pid>.in` and `<basename>-<pid>.out` from it.
    #[must_use]
    pub fn new(pipe_basename: impl Into<PathBuf>) -> Self {
        Self {
            pipe_basename: pipe_basename.into(),
            tcp: TcpEndpoint::from_env(),
        }
    }

    /// Replaces the TCP endpoint, overriding the environment.
    #[must_use]
    pub fn with_tcp(mut self, endpoint: TcpEndpoint) -> Self {
        self.tcp = Some(endpoint);
        self
    }

    /// Disables the TCP listener regardless of the environment.
    #[must_use]
    pub fn without_tcp(mut self) -> Self {
        self.tcp = None;
        self
    }

    /// Path prefix for the per-process pipe pair.
    #[must_use]
    pub fn pipe_basename(&self) -> &Path {
        &self.pipe_basename
    }

    /// TCP endpoint, when the listener should start.
    #[must_use]
    pub fn tcp(&self) -> Option<&TcpEndpoint> {
        self.tcp.as_ref()
    }
}
