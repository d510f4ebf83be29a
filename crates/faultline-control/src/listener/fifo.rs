//! Named-pipe listener: a per-process FIFO pair served forever.
//!
//! Clients write commands into `<basename>-<pid>.in` and read replies
//! from `<basename>-<pid>.out`. The serve loop is an explicit state
//! machine — open the pair, serve the session, reopen on disconnect —
//! driven by a [`RetryPolicy`] so a misbehaving transport disables the
//! listener instead of spinning. The pipe pair itself is abstracted
//! behind [`SessionTransport`], which keeps the machine testable without
//! touching the filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::{debug, error, info, warn};

use faultline_engine::FaultEngine;

use crate::guard::RecursionGuard;
use crate::lifecycle::StartupError;
use crate::session::{SessionStatus, serve_once};

use super::LISTENER_TARGET;
use super::retry::RetryPolicy;

/// The per-process pipe pair locations, derived from `(basename, pid)`.
///
/// Derived once per (re)start; after a fork the child derives a fresh
/// pair under its own pid and leaves the parent's paths alone.
#[derive(Debug, Clone)]
pub(crate) struct PipePaths {
    input: PathBuf,
    output: PathBuf,
}

impl PipePaths {
    pub(crate) fn derive(basename: &Path, pid: u32) -> Self {
        let base = basename.display();
        Self {
            input: PathBuf::from(format!("{base}-{pid}.in")),
            output: PathBuf::from(format!("{base}-{pid}.out")),
        }
    }

    /// Path clients write commands to.
    pub(crate) fn input(&self) -> &Path {
        &self.input
    }

    /// Path clients read replies from.
    pub(crate) fn output(&self) -> &Path {
        &self.output
    }

    /// Unlinks both pipes; missing files are not an error.
    pub(crate) fn remove(&self) {
        for path in [&self.input, &self.output] {
            if let Err(err) = fs::remove_file(path)
                && err.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: LISTENER_TARGET,
                    path = %path.display(),
                    error = %err,
                    "failed to remove control pipe"
                );
            }
        }
    }
}

/// Creates both FIFOs with owner-only permissions.
///
/// An existing FIFO is reused; any other failure aborts, unlinking the
/// input pipe if it was created first.
pub(crate) fn create_pipe_pair(paths: &PipePaths) -> Result<(), StartupError> {
    make_fifo(paths.input())?;
    if let Err(startup) = make_fifo(paths.output()) {
        let _ = fs::remove_file(paths.input());
        return Err(startup);
    }
    Ok(())
}

fn make_fifo(path: &Path) -> Result<(), StartupError> {
    match mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR) {
        Ok(()) | Err(Errno::EEXIST) => Ok(()),
        Err(source) => Err(StartupError::CreatePipe {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Source of connected handle pairs for the serve loop.
pub(crate) trait SessionTransport {
    type Reader: Read;
    type Writer: Write;

    /// Blocks until both sides of a session are open.
    fn open(&mut self) -> io::Result<(Self::Reader, Self::Writer)>;
}

/// The real FIFO transport.
#[derive(Debug)]
pub(crate) struct PipeTransport {
    paths: PipePaths,
}

impl PipeTransport {
    pub(crate) fn new(paths: PipePaths) -> Self {
        Self { paths }
    }
}

impl SessionTransport for PipeTransport {
    type Reader = File;
    type Writer = File;

    fn open(&mut self) -> io::Result<(File, File)> {
        // Each open blocks until the peer opens the other end.
        let reader = File::open(self.paths.input())?;
        let writer = OpenOptions::new().write(true).open(self.paths.output())?;
        Ok((reader, writer))
    }
}

/// Why the serve loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerExit {
    /// The shutdown flag was raised.
    Shutdown,
    /// The error budget ran out; the listener is permanently inactive.
    Terminated,
}

enum SessionEnd {
    Reopen,
    GiveUp,
    Shutdown,
}

/// Serves the pipe pair until shutdown or budget exhaustion.
pub(crate) fn run_pipe_listener<T: SessionTransport>(
    transport: &mut T,
    engine: &dyn FaultEngine,
    shutdown: &AtomicBool,
    policy: &mut RetryPolicy,
) -> ListenerExit {
    let _guard = RecursionGuard::enter();
    info!(target: LISTENER_TARGET, "control pipe listener active");
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return ListenerExit::Shutdown;
        }
        let (mut reader, mut writer) = match transport.open() {
            Ok(pair) => pair,
            Err(err) => {
                if shutdown.load(Ordering::SeqCst) {
                    return ListenerExit::Shutdown;
                }
                warn!(
                    target: LISTENER_TARGET,
                    error = %err,
                    "failed to open control pipe pair"
                );
                if policy.record_error() {
                    return give_up(policy);
                }
                continue;
            }
        };
        match serve_session(&mut reader, &mut writer, engine, shutdown, policy) {
            SessionEnd::Reopen => {}
            SessionEnd::GiveUp => return give_up(policy),
            SessionEnd::Shutdown => return ListenerExit::Shutdown,
        }
    }
}

fn serve_session<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    engine: &dyn FaultEngine,
    shutdown: &AtomicBool,
    policy: &mut RetryPolicy,
) -> SessionEnd {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return SessionEnd::Shutdown;
        }
        match serve_once(reader, writer, engine) {
            Ok(SessionStatus::Served(_)) => policy.reset(),
            Ok(SessionStatus::PeerClosed) => {
                policy.reset();
                debug!(target: LISTENER_TARGET, "peer closed; reopening control pipe pair");
                return SessionEnd::Reopen;
            }
            Err(err) if err.is_peer_close() => {
                policy.reset();
                debug!(target: LISTENER_TARGET, "peer hung up mid-exchange; reopening");
                return SessionEnd::Reopen;
            }
            Err(err) => {
                warn!(
                    target: LISTENER_TARGET,
                    error = %err,
                    "transport error on control pipe"
                );
                if policy.record_error() {
                    return SessionEnd::GiveUp;
                }
                return SessionEnd::Reopen;
            }
        }
    }
}

fn give_up(policy: &RetryPolicy) -> ListenerExit {
    // The single operator-visible line required when remote control
    // stops serving; the host process keeps running.
    error!(
        target: LISTENER_TARGET,
        errors = policy.consecutive(),
        "too many transport errors; control pipe listener disabled"
    );
    ListenerExit::Terminated
}
