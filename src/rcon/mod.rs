//! # Remote console (RCON) client
//!
//! Implements the client side of the Valve Source RCON protocol as spoken by
//! Minecraft, Factorio, Rust and most Source-engine servers.
//!
//! Every [RconClient::execute] call is a complete, short-lived exchange:
//!
//! 1. open a TCP connection to the profile's `host:port`
//! 2. authenticate with the profile credential
//! 3. send one command and collect its (possibly fragmented) response
//! 4. close the connection
//!
//! The whole exchange is bounded by a single timeout. The connection is a
//! scoped value: it is shut down explicitly on every exit path and dropped
//! (closing the socket) if the surrounding future is cancelled. No retries
//! are made; failures are returned to the caller as [RconError].
//!
//! ```rust,no_run
//! use rconbot::profile::ConnectionProfile;
//! use rconbot::rcon::RconClient;
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let client = RconClient::new(Duration::from_secs(5));
//! let profile = ConnectionProfile::new("Survival", "127.0.0.1", 25575, "secret");
//! match client.execute(&profile, "list").await {
//!     Ok(text) => println!("{}", text),
//!     Err(e) => eprintln!("{}: {}", e.kind(), e),
//! }
//! # }
//! ```
pub mod packet;

use async_trait::async_trait;
use log::{debug, info};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::logutil::{escape_log, COMMAND_PREVIEW};
use crate::metrics;
use crate::profile::ConnectionProfile;
use packet::{packet_type, PacketKind, RconFramer, RconPacket, AUTH_FAILED_ID, MAX_FRAGMENT_BODY};

/// Packets with an unexpected request id tolerated before giving up.
const MAX_STRAY_PACKETS: usize = 8;

/// Failures of a single remote console exchange.
#[derive(Debug, Error)]
pub enum RconError {
    /// The host could not be reached or refused the connection.
    #[error("cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// The server rejected the RCON password.
    #[error("authentication rejected (check the RCON password)")]
    Auth,

    /// The server sent something that is not valid RCON.
    #[error("{0}")]
    Protocol(String),

    /// The exchange did not complete within the configured bound.
    #[error("no response within {}s", .0.as_secs_f32())]
    Timeout(Duration),

    /// The connection dropped in the middle of the exchange.
    #[error("connection lost: {0}")]
    Network(String),
}

impl RconError {
    /// Short tag used in user-visible messages and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            RconError::Connect { .. } => "ConnectError",
            RconError::Auth => "AuthError",
            RconError::Protocol(_) => "ProtocolError",
            RconError::Timeout(_) => "TimeoutError",
            RconError::Network(_) => "NetworkError",
        }
    }
}

/// Outcome of one remote command: response text or a failure, never both.
pub type CommandResult = Result<String, RconError>;

/// Anything that can run a command against a stored profile.
///
/// The router only depends on this trait, so flows can be exercised
/// without a game server.
#[async_trait]
pub trait RemoteConsole: Send + Sync {
    async fn execute(&self, profile: &ConnectionProfile, command: &str) -> CommandResult;
}

/// Stateless RCON client. The only shared state is the request id counter.
pub struct RconClient {
    timeout: Duration,
    fragment_grace: Duration,
    next_id: AtomicI32,
}

impl RconClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_fragment_grace(timeout, Duration::from_millis(100))
    }

    /// `fragment_grace` is how long to wait for a continuation packet after a
    /// full-size response fragment.
    pub fn with_fragment_grace(timeout: Duration, fragment_grace: Duration) -> Self {
        Self {
            timeout,
            fragment_grace,
            next_id: AtomicI32::new(1),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Positive, non-zero ids; wraps long before reaching the auth failure marker.
    fn next_request_id(&self) -> i32 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) & i32::MAX;
        if id == 0 {
            1
        } else {
            id
        }
    }

    /// Run one command against `profile`. See the module docs for the exchange.
    pub async fn execute(&self, profile: &ConnectionProfile, command: &str) -> CommandResult {
        let started = Instant::now();
        let outcome = self.execute_scoped(profile, command, started).await;
        match &outcome {
            Ok(body) => debug!(
                "rcon {} ok in {}ms ({} bytes)",
                profile.address(),
                started.elapsed().as_millis(),
                body.len()
            ),
            Err(e) => info!(
                "rcon {} failed after {}ms: {}: {}",
                profile.address(),
                started.elapsed().as_millis(),
                e.kind(),
                e
            ),
        }
        metrics::record_rcon_outcome(outcome.as_ref().err().map(RconError::kind));
        outcome
    }

    async fn execute_scoped(
        &self,
        profile: &ConnectionProfile,
        command: &str,
        started: Instant,
    ) -> CommandResult {
        let mut conn = match timeout(self.timeout, RconConnection::open(profile)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(RconError::Timeout(self.timeout)),
        };

        let remaining = self.timeout.saturating_sub(started.elapsed());
        let outcome = match timeout(remaining, self.exchange(&mut conn, &profile.credential, command)).await {
            Ok(result) => result,
            Err(_) => Err(RconError::Timeout(self.timeout)),
        };
        conn.close().await;
        outcome
    }

    async fn exchange<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        conn: &mut RconConnection<S>,
        credential: &str,
        command: &str,
    ) -> CommandResult {
        let auth_id = self.next_request_id();
        conn.send(&RconPacket::new(auth_id, PacketKind::Auth, credential))
            .await?;
        self.await_auth(conn, auth_id).await?;

        let cmd_id = self.next_request_id();
        debug!("rcon exec id={} cmd={}", cmd_id, escape_log(command, COMMAND_PREVIEW));
        conn.send(&RconPacket::new(cmd_id, PacketKind::ExecCommand, command))
            .await?;

        let first = self.await_correlated(conn, cmd_id).await?;
        let mut last_len = first.body.len();
        let mut body = first.body;

        // Responses longer than one packet arrive as consecutive packets with the same id.
        loop {
            let grace = if last_len >= MAX_FRAGMENT_BODY {
                self.fragment_grace
            } else {
                Duration::ZERO
            };
            match timeout(grace, conn.recv()).await {
                Ok(Ok(p)) if p.id == cmd_id && p.kind == packet_type::RESPONSE_VALUE => {
                    last_len = p.body.len();
                    body.push_str(&p.body);
                }
                Ok(Ok(p)) => {
                    debug!("rcon ignoring trailing packet id={} type={}", p.id, p.kind);
                    break;
                }
                Ok(Err(RconError::Network(_))) | Err(_) => break,
                Ok(Err(e)) => return Err(e),
            }
        }

        Ok(strip_formatting(&body))
    }

    async fn await_auth<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        conn: &mut RconConnection<S>,
        auth_id: i32,
    ) -> Result<(), RconError> {
        for _ in 0..MAX_STRAY_PACKETS {
            let p = conn.recv().await?;
            if p.id == AUTH_FAILED_ID {
                return Err(RconError::Auth);
            }
            match p.kind {
                packet_type::AUTH_RESPONSE if p.id == auth_id => return Ok(()),
                // Source servers send an empty RESPONSE_VALUE ahead of the verdict.
                packet_type::RESPONSE_VALUE => continue,
                other => {
                    return Err(RconError::Protocol(format!(
                        "unexpected packet during login (id={}, type={})",
                        p.id, other
                    )))
                }
            }
        }
        Err(RconError::Protocol("no login verdict from server".to_string()))
    }

    async fn await_correlated<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        conn: &mut RconConnection<S>,
        cmd_id: i32,
    ) -> Result<RconPacket, RconError> {
        for _ in 0..MAX_STRAY_PACKETS {
            let p = conn.recv().await?;
            if p.id == AUTH_FAILED_ID {
                return Err(RconError::Auth);
            }
            if p.id == cmd_id && p.kind == packet_type::RESPONSE_VALUE {
                return Ok(p);
            }
            debug!(
                "rcon skipping uncorrelated packet id={} type={} (want {})",
                p.id, p.kind, cmd_id
            );
        }
        Err(RconError::Protocol(format!(
            "no response for request {} after {} packets",
            cmd_id, MAX_STRAY_PACKETS
        )))
    }
}

#[async_trait]
impl RemoteConsole for RconClient {
    async fn execute(&self, profile: &ConnectionProfile, command: &str) -> CommandResult {
        RconClient::execute(self, profile, command).await
    }
}

/// One open RCON socket. Lives for exactly one `execute` call.
struct RconConnection<S = TcpStream> {
    stream: S,
    framer: RconFramer,
}

impl RconConnection<TcpStream> {
    async fn open(profile: &ConnectionProfile) -> Result<Self, RconError> {
        let stream = TcpStream::connect((profile.host.as_str(), profile.port))
            .await
            .map_err(|e| RconError::Connect {
                address: profile.address(),
                reason: e.to_string(),
            })?;
        let _ = stream.set_nodelay(true);
        Ok(Self::from_stream(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> RconConnection<S> {
    fn from_stream(stream: S) -> Self {
        Self {
            stream,
            framer: RconFramer::new(),
        }
    }

    async fn send(&mut self, packet: &RconPacket) -> Result<(), RconError> {
        let bytes = packet.to_bytes()?;
        self.stream
            .write_all(&bytes)
            .await
            .map_err(|e| RconError::Network(format!("send failed: {}", e)))
    }

    /// Cancel safe: partial reads stay in the framer buffer.
    async fn recv(&mut self) -> Result<RconPacket, RconError> {
        loop {
            if let Some(packet) = self.framer.next_packet()? {
                return Ok(packet);
            }
            let n = self
                .stream
                .read_buf(self.framer.buffer_mut())
                .await
                .map_err(|e| RconError::Network(format!("receive failed: {}", e)))?;
            if n == 0 {
                return Err(RconError::Network("closed by server".to_string()));
            }
        }
    }

    async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Remove Minecraft `§x` formatting codes and ANSI colour escapes.
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '§' => {
                chars.next();
            }
            '\u{1b}' if chars.peek() == Some(&'[') => {
                chars.next();
                // CSI sequence ends with a byte in 0x40..=0x7E
                for n in chars.by_ref() {
                    if ('@'..='~').contains(&n) {
                        break;
                    }
                }
            }
            c => out.push(c),
        }
    }
    out
}
