//! Startup, shutdown and fork recovery for the listener set.
//!
//! A [`ControlPlane`] owns one live set of listeners: the named-pipe
//! pair (always) and the TCP accept loop (when configured). The global
//! [`activate`]/[`deactivate`]/[`reinitialize_after_fork`] functions keep
//! at most one set per process, which is what a host embedding the
//! library normally wants; tests and unusual hosts can drive
//! [`ControlPlane`] handles directly.
//!
//! The host owns fork detection: this module only promises that calling
//! [`reinitialize_after_fork`] exactly once in the child abandons the
//! parent's listener state (without unlinking the parent's pipes) and
//! starts a fresh set under the child's own pid.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::{info, warn};

use faultline_engine::FaultEngine;

use crate::config::ControlConfig;
use crate::guard::RecursionGuard;
use crate::listener::fifo::{PipePaths, PipeTransport, create_pipe_pair, run_pipe_listener};
use crate::listener::retry::{MAX_CONSECUTIVE_ERRORS, RetryPolicy};
use crate::listener::tcp::TcpControlListener;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Failures during listener startup. All are fatal to the affected
/// startup attempt, never to the host process.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Creating one of the control FIFOs failed for a reason other than
    /// it already existing.
    #[error("failed to create control pipe {path}: {source}")]
    CreatePipe {
        path: PathBuf,
        #[source]
        source: nix::errno::Errno,
    },
    /// Spawning a listener thread failed; any pipes already created have
    /// been removed.
    #[error("failed to spawn {listener} listener thread: {source}")]
    SpawnListener {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// [`activate`] was called while a listener set is already live.
    #[error("remote control already active in this process")]
    AlreadyActive,
}

/// One live set of control listeners.
///
/// Dropping the handle raises the shutdown flag and removes the pipe
/// paths. The pipe thread may stay blocked in a FIFO open until process
/// exit; with the paths unlinked no further client can reach it, which
/// matches the behaviour hosts have always observed at teardown.
pub struct ControlPlane {
    config: ControlConfig,
    engine: Arc<dyn FaultEngine>,
    paths: PipePaths,
    shutdown: Arc<AtomicBool>,
    tcp_addr: Option<SocketAddr>,
    cleanup: bool,
}

impl ControlPlane {
    /// Creates the pipe pair and spawns the listener threads.
    ///
    /// TCP bind failure is deliberately not fatal — the pipe pair stays
    /// the primary channel and the failure is logged. A thread-spawn
    /// failure for either listener unwinds the whole startup so the
    /// process is never left with half a listener set.
    pub fn start(
        config: ControlConfig,
        engine: Arc<dyn FaultEngine>,
    ) -> Result<Self, StartupError> {
        let _entry = RecursionGuard::enter();

        let paths = PipePaths::derive(config.pipe_basename(), std::process::id());
        create_pipe_pair(&paths)?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let pipe_engine = Arc::clone(&engine);
        let pipe_shutdown = Arc::clone(&shutdown);
        let mut transport = PipeTransport::new(paths.clone());
        let spawned = thread::Builder::new()
            .name("faultline-rc-pipe".to_string())
            .spawn(move || {
                let mut policy = RetryPolicy::new(MAX_CONSECUTIVE_ERRORS);
                run_pipe_listener(
                    &mut transport,
                    pipe_engine.as_ref(),
                    &pipe_shutdown,
                    &mut policy,
                );
            });
        if let Err(source) = spawned {
            paths.remove();
            return Err(StartupError::SpawnListener {
                listener: "pipe",
                source,
            });
        }

        let mut tcp_addr = None;
        if let Some(endpoint) = config.tcp() {
            match TcpControlListener::bind(endpoint) {
                Ok(listener) => {
                    let addr = listener.local_addr();
                    let tcp_engine = Arc::clone(&engine);
                    let tcp_shutdown = Arc::clone(&shutdown);
                    let spawned = thread::Builder::new()
                        .name("faultline-rc-tcp".to_string())
                        .spawn(move || listener.run(tcp_engine, tcp_shutdown));
                    if let Err(source) = spawned {
                        shutdown.store(true, Ordering::SeqCst);
                        paths.remove();
                        return Err(StartupError::SpawnListener {
                            listener: "tcp",
                            source,
                        });
                    }
                    tcp_addr = Some(addr);
                }
                Err(err) => {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        endpoint = %endpoint,
                        error = %err,
                        "tcp control listener not started"
                    );
                }
            }
        }

        info!(
            target: LIFECYCLE_TARGET,
            input = %paths.input().display(),
            output = %paths.output().display(),
            tcp = ?tcp_addr,
            "remote control active"
        );
        Ok(Self {
            config,
            engine,
            paths,
            shutdown,
            tcp_addr,
            cleanup: true,
        })
    }

    /// Address of the TCP listener, when it started. Useful when the
    /// configured port was `0`.
    #[must_use]
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    /// Stops the listener set and removes the pipe paths.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.cleanup {
            self.paths.remove();
            self.cleanup = false;
        }
    }

    /// Discards the handle without touching the filesystem. Used in a
    /// forked child, where the paths belong to the parent.
    fn abandon(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.cleanup = false;
    }
}

impl Drop for ControlPlane {
    fn drop(&mut self) {
        self.stop();
    }
}

static ACTIVE: Lazy<Mutex<Option<ControlPlane>>> = Lazy::new(|| Mutex::new(None));

fn active_slot() -> MutexGuard<'static, Option<ControlPlane>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Starts the process-wide listener set.
///
/// At most one set may be live per process; a second call fails with
/// [`StartupError::AlreadyActive`] until [`deactivate`] runs.
pub fn activate(config: ControlConfig, engine: Arc<dyn FaultEngine>) -> Result<(), StartupError> {
    let mut slot = active_slot();
    if slot.is_some() {
        return Err(StartupError::AlreadyActive);
    }
    *slot = Some(ControlPlane::start(config, engine)?);
    Ok(())
}

/// Stops the process-wide listener set and removes its pipe paths.
/// A no-op when nothing is active.
pub fn deactivate() {
    if let Some(plane) = active_slot().take() {
        plane.shutdown();
    }
}

/// Whether the process-wide listener set is live.
#[must_use]
pub fn is_active() -> bool {
    active_slot().is_some()
}

/// Rebuilds the listener set for a new process identity.
///
/// The host's fork handler must call this exactly once in the child.
/// The parent's handle is abandoned — its pipe paths carry the parent's
/// pid and still belong to it — and a fresh pair is created under the
/// child's pid using the same configuration and engine. A no-op when
/// the control plane was never activated.
pub fn reinitialize_after_fork() -> Result<(), StartupError> {
    let mut slot = active_slot();
    let Some(previous) = slot.take() else {
        return Ok(());
    };
    let config = previous.config.clone();
    let engine = Arc::clone(&previous.engine);
    previous.abandon();
    *slot = Some(ControlPlane::start(config, engine)?);
    Ok(())
}
