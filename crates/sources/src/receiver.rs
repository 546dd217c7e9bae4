//! Per-port socket receiver
//!
//! One `PortReceiver` owns a TCP server plus a dual UDP pair (v4 and v6) for
//! its port and broadcasts framed lines to every subscribed listener.
//!
//! # Restart discipline
//!
//! A socket error in `RUNNING` triggers a safe restart: close everything,
//! wait [`RESTART_DELAY`], reopen. At most 10 consecutive attempts; after
//! that the receiver transitions to `DESTROYED` and reports once at error
//! level. The attempt counter resets when sockets come back up.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tstream_protocol::{RawData, TransportProtocol, sender_key};

use crate::BROADCAST_CAPACITY;
use crate::error::{Result, SourceError};
use crate::framing::FragmentBuffers;
use crate::state::ReceiverState;

/// Delay between restart attempts
pub const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Consecutive restart budget before `DESTROYED`
const MAX_RESTART_ATTEMPTS: u32 = 10;

/// TCP read buffer size
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Maximum UDP datagram we accept
const UDP_BUFFER_SIZE: usize = 64 * 1024;

/// Shared TCP/UDP receiver for one port
pub struct PortReceiver {
    port: u16,
    state: Arc<Mutex<ReceiverState>>,
    frames_tx: broadcast::Sender<RawData>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PortReceiver {
    /// Create a receiver in `NEW`; sockets open on [`start`](Self::start)
    pub fn new(port: u16) -> Self {
        let (frames_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            port,
            state: Arc::new(Mutex::new(ReceiverState::New)),
            frames_tx,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// The port this receiver serves
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReceiverState {
        *self.state.lock()
    }

    /// Subscribe to framed lines from this port
    pub fn subscribe(&self) -> broadcast::Receiver<RawData> {
        self.frames_tx.subscribe()
    }

    /// Inject a frame as if it had arrived on the port (debug facility)
    pub fn inject(&self, data: Bytes) {
        let raw = RawData::new(
            data,
            format!("injection-{}", self.port),
            TransportProtocol::Tcp,
        );
        // No subscribers is fine; the frame just vanishes
        let _ = self.frames_tx.send(raw);
    }

    /// Open sockets and start serving
    ///
    /// Idempotent: a second call while not `NEW`/`STOPPED` is a no-op.
    pub fn start(self: Arc<Self>) {
        {
            let mut state = self.state.lock();
            if !state.can_transition_to(ReceiverState::Starting) {
                return;
            }
            *state = ReceiverState::Starting;
        }

        let receiver = Arc::clone(&self);
        let task = tokio::spawn(async move {
            receiver.run().await;
        });
        *self.task.lock() = Some(task);
    }

    /// Stop the receiver and close its sockets
    ///
    /// A receiver that was never started transitions straight to `STOPPED`.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                ReceiverState::New => {
                    *state = ReceiverState::Stopped;
                    return;
                }
                ReceiverState::Stopped | ReceiverState::Destroyed => return,
                _ => {
                    *state = ReceiverState::Stopping;
                }
            }
        }

        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        let mut state = self.state.lock();
        if *state != ReceiverState::Destroyed {
            *state = ReceiverState::Stopped;
        }
        tracing::info!(port = self.port, "receiver stopped");
    }

    fn set_state(&self, next: ReceiverState) {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            *state = next;
        }
    }

    /// Bind/serve loop with the bounded restart policy
    async fn run(&self) {
        let mut attempts = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            match self.bind_sockets().await {
                Ok((tcp, udp4, udp6)) => {
                    attempts = 0;
                    self.set_state(ReceiverState::Running);
                    tracing::info!(port = self.port, "receiver listening (tcp, udp, udp6)");

                    if let Err(e) = self.serve(tcp, udp4, udp6).await {
                        if self.cancel.is_cancelled() {
                            return;
                        }
                        tracing::warn!(port = self.port, error = %e, "receiver error, restarting");
                    } else {
                        // Clean exit only happens on cancellation
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(port = self.port, error = %e, "receiver failed to bind");
                }
            }

            attempts += 1;
            if attempts >= MAX_RESTART_ATTEMPTS {
                self.set_state(ReceiverState::Destroyed);
                tracing::error!(
                    port = self.port,
                    attempts,
                    "receiver restart budget exhausted, destroyed"
                );
                return;
            }

            self.set_state(ReceiverState::Starting);
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(RESTART_DELAY) => {}
            }
        }
    }

    async fn bind_sockets(&self) -> Result<(TcpListener, UdpSocket, UdpSocket)> {
        let tcp_addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, self.port).into();
        let tcp = TcpListener::bind(tcp_addr)
            .await
            .map_err(|e| SourceError::Bind {
                protocol: "tcp",
                address: tcp_addr.to_string(),
                source: e,
            })?;

        let udp4 = bind_udp(self.port, false)?;
        let udp6 = bind_udp(self.port, true)?;
        Ok((tcp, udp4, udp6))
    }

    /// Serve until cancellation or the first socket error
    async fn serve(&self, tcp: TcpListener, udp4: UdpSocket, udp6: UdpSocket) -> Result<()> {
        // Child token scopes the per-connection tasks to this socket epoch
        let epoch = self.cancel.child_token();
        let result = tokio::try_join!(
            self.tcp_accept_loop(&tcp, &epoch),
            self.udp_loop(udp4, TransportProtocol::Udp, &epoch),
            self.udp_loop(udp6, TransportProtocol::Udp6, &epoch),
        );
        // Tear down connection handlers from this epoch
        epoch.cancel();
        result.map(|_| ())
    }

    async fn tcp_accept_loop(&self, tcp: &TcpListener, epoch: &CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                accepted = tcp.accept() => {
                    let (stream, peer) = accepted?;
                    let frames_tx = self.frames_tx.clone();
                    let connection_cancel = epoch.child_token();
                    tokio::spawn(async move {
                        handle_tcp_connection(stream, peer, frames_tx, connection_cancel).await;
                    });
                }
            }
        }
    }

    async fn udp_loop(
        &self,
        socket: UdpSocket,
        protocol: TransportProtocol,
        _epoch: &CancellationToken,
    ) -> Result<()> {
        let mut buf = vec![0u8; UDP_BUFFER_SIZE];
        let mut buffers = FragmentBuffers::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                received = socket.recv_from(&mut buf) => {
                    let (len, peer) = received?;
                    let key = sender_key(protocol, &peer);
                    for frame in buffers.push(&key, &buf[..len]) {
                        let raw = RawData::new(frame, key.clone(), protocol);
                        let _ = self.frames_tx.send(raw);
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for PortReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortReceiver")
            .field("port", &self.port)
            .field("state", &self.state())
            .finish()
    }
}

/// Read one TCP connection, framing lines and broadcasting them
///
/// The connection's buffered remainder is discarded when it closes.
async fn handle_tcp_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    frames_tx: broadcast::Sender<RawData>,
    cancel: CancellationToken,
) {
    let key = sender_key(TransportProtocol::Tcp, &peer);
    let mut buffers = FragmentBuffers::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(len) => {
                        for frame in buffers.push(&key, &buf[..len]) {
                            let raw = RawData::new(frame, key.clone(), TransportProtocol::Tcp);
                            let _ = frames_tx.send(raw);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(peer = %peer, error = %e, "tcp read error");
                        break;
                    }
                }
            }
        }
    }
    // Partial trailing fragment dies with the connection
    buffers.close(&key);
}

/// Bind one half of the dual UDP pair
///
/// The v6 socket is v6-only so the pair covers both families without the
/// platform-dependent dual-stack flag.
fn bind_udp(port: u16, v6: bool) -> Result<UdpSocket> {
    let domain = if v6 { Domain::IPV6 } else { Domain::IPV4 };
    let protocol_name = if v6 { "udp6" } else { "udp" };

    let make = || -> std::io::Result<UdpSocket> {
        let socket = Socket::new(domain, Type::DGRAM, Some(SockProtocol::UDP))?;
        socket.set_reuse_address(true)?;
        if v6 {
            socket.set_only_v6(true)?;
        }
        socket.set_nonblocking(true)?;
        let addr: SocketAddr = if v6 {
            (Ipv6Addr::UNSPECIFIED, port).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, port).into()
        };
        socket.bind(&addr.into())?;
        UdpSocket::from_std(socket.into())
    };

    make().map_err(|e| SourceError::Bind {
        protocol: protocol_name,
        address: format!("port {port}"),
        source: e,
    })
}

#[cfg(test)]
#[path = "receiver_test.rs"]
mod tests;
