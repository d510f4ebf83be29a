//! Optional TCP listener: one command/reply exchange per connection.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use faultline_engine::FaultEngine;

use crate::config::TcpEndpoint;
use crate::guard::RecursionGuard;
use crate::session::serve_once;

use super::LISTENER_TARGET;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Bound, not-yet-running TCP control listener.
#[derive(Debug)]
pub(crate) struct TcpControlListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpControlListener {
    /// Binds the configured endpoint. The listener is left non-blocking
    /// so the accept loop can observe the shutdown flag.
    pub(crate) fn bind(endpoint: &TcpEndpoint) -> io::Result<Self> {
        let mut addrs = (endpoint.host(), endpoint.port()).to_socket_addrs()?;
        let addr = addrs.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved")
        })?;
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound, with the kernel-assigned port resolved.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until shutdown, one short-lived worker per
    /// connection. Accept errors back off and never escalate past this
    /// listener.
    pub(crate) fn run(self, engine: Arc<dyn FaultEngine>, shutdown: Arc<AtomicBool>) {
        let _guard = RecursionGuard::enter();
        debug!(target: LISTENER_TARGET, addr = %self.local_addr, "tcp control listener active");
        let mut last_error = None::<io::ErrorKind>;
        while !shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    last_error = None;
                    if let Err(err) = stream.set_nonblocking(false) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %err,
                            "failed to restore blocking mode on control connection"
                        );
                        continue;
                    }
                    debug!(target: LISTENER_TARGET, peer = %peer, "accepted control connection");
                    let engine = Arc::clone(&engine);
                    let spawned = thread::Builder::new()
                        .name("faultline-rc-conn".to_string())
                        .spawn(move || serve_connection(&stream, engine.as_ref()));
                    if let Err(err) = spawned {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %err,
                            "failed to spawn control connection worker"
                        );
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(err) => {
                    let kind = err.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %err,
                            "tcp control accept error"
                        );
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        debug!(target: LISTENER_TARGET, addr = %self.local_addr, "tcp control listener stopped");
    }
}

/// Serves exactly one exchange, then drops the connection. The socket is
/// both the read and the write handle.
fn serve_connection(stream: &TcpStream, engine: &dyn FaultEngine) {
    let _guard = RecursionGuard::enter();
    let (mut reader, mut writer) = (stream, stream);
    if let Err(err) = serve_once(&mut reader, &mut writer, engine)
        && !err.is_peer_close()
    {
        warn!(
            target: LISTENER_TARGET,
            error = %err,
            "control connection failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use faultline_engine::stub::StubEngine;

    use crate::config::TcpEndpoint;

    use super::TcpControlListener;

    fn exchange(addr: std::net::SocketAddr, line: &[u8]) -> String {
        let mut client = TcpStream::connect(addr).expect("connect control client");
        client.write_all(line).expect("send command");
        let mut reply = String::new();
        client.read_to_string(&mut reply).expect("read reply");
        reply
    }

    #[test]
    fn each_connection_serves_exactly_one_exchange() {
        let listener = TcpControlListener::bind(&TcpEndpoint::new("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr();
        let engine = Arc::new(StubEngine::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_engine = Arc::clone(&engine);
        let accept_shutdown = Arc::clone(&shutdown);
        let accept_loop = thread::spawn(move || {
            listener.run(accept_engine, accept_shutdown);
        });

        assert_eq!(exchange(addr, b"enable name=net_fault,failnum=2\n"), "0");
        assert_eq!(exchange(addr, b"enable name=x,bogus=1\n"), "-1");
        assert_eq!(engine.call_count(), 1);

        shutdown.store(true, Ordering::SeqCst);
        accept_loop.join().expect("join accept loop");
    }

    #[test]
    fn bind_failure_is_reported_to_the_caller() {
        let holder = TcpControlListener::bind(&TcpEndpoint::new("127.0.0.1", 0)).expect("bind");
        let port = holder.local_addr().port();
        assert!(TcpControlListener::bind(&TcpEndpoint::new("127.0.0.1", port)).is_err());
    }
}
