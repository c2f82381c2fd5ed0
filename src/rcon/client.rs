//! RCON client owning a single authenticated connection
//!
//! Two protocol quirks live here. During authentication the server echoes
//! an empty SERVERDATA_RESPONSE_VALUE before the real auth verdict, so the
//! client discards packets until an auth response arrives. Command output
//! can be split across multiple packets with no continuation marker, so
//! the client sends a dummy probe packet right after each command and
//! treats the probe's echo as the end of the response.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::Mutex;

use super::{RconError, RconResult};
use crate::protocol::{encode_packet, Packet, PacketDecoder, PacketType};

/// How many packets matching neither the command nor the probe id are
/// tolerated before a response is declared runaway
const MAX_STRAY_PACKETS: usize = 8;

/// Authentication state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Connected, password not yet offered
    Unauthenticated,
    /// Auth request sent, verdict pending
    Authenticating,
    /// Server accepted the password
    Authenticated,
    /// Server rejected the password or the handshake broke
    Failed,
    /// Connection released
    Closed,
}

struct Session {
    stream: Option<TcpStream>,
    read_buf: BytesMut,
    decoder: PacketDecoder,
    auth: AuthState,
    next_id: i32,
}

impl Session {
    /// Next request id. Monotonic and always positive, since -1 is the
    /// server's authentication-failure sentinel.
    fn fresh_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if self.next_id == i32::MAX {
            1
        } else {
            self.next_id + 1
        };
        id
    }

    fn stream_mut(&mut self) -> RconResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(RconError::SessionClosed)
    }

    async fn send_packet(&mut self, packet: &Packet) -> RconResult<()> {
        let mut buf = BytesMut::with_capacity(packet.wire_size() as usize + 4);
        encode_packet(packet, &mut buf)?;

        let stream = self.stream_mut()?;
        stream.write_all(&buf).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_packet(&mut self) -> RconResult<Packet> {
        loop {
            if let Some(packet) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(packet);
            }

            let mut chunk = [0u8; 4096];
            let n = self.stream_mut()?.read(&mut chunk).await?;
            if n == 0 {
                return Err(RconError::ConnectionClosed);
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Client side of one RCON connection
///
/// The client assumes one outstanding command at a time: a call made while
/// a previous response is still being drained fails with
/// [`RconError::CommandInProgress`] instead of interleaving reads.
pub struct RconClient {
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    session: Mutex<Session>,
}

impl RconClient {
    /// Open a TCP connection to the server, without authenticating yet
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> RconResult<Self> {
        let addr = resolve_host(host, port).await?;
        tracing::info!("Connecting to RCON server at {}", addr);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(RconError::Io(e)),
            Err(_) => return Err(RconError::Timeout),
        };

        let local_addr = stream.local_addr()?;
        Ok(Self {
            local_addr,
            peer_addr: addr,
            session: Mutex::new(Session {
                stream: Some(stream),
                read_buf: BytesMut::with_capacity(4096),
                decoder: PacketDecoder::new(),
                auth: AuthState::Unauthenticated,
                next_id: 1,
            }),
        })
    }

    /// Local address of the connection, as seen by the server. Used to tell
    /// the server where to forward its log stream.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remote server address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Current authentication state
    pub async fn auth_state(&self) -> AuthState {
        self.session.lock().await.auth
    }

    /// Authenticate with the server. Must be called exactly once, before
    /// any command execution.
    pub async fn authenticate(&self, password: &str) -> RconResult<()> {
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| RconError::CommandInProgress)?;

        match session.auth {
            AuthState::Unauthenticated => {}
            AuthState::Authenticating | AuthState::Authenticated => {
                return Err(RconError::AlreadyAuthenticated)
            }
            AuthState::Failed => return Err(RconError::AuthenticationFailed),
            AuthState::Closed => return Err(RconError::SessionClosed),
        }

        session.auth = AuthState::Authenticating;
        let result = Self::do_authenticate(&mut session, password).await;
        match &result {
            Ok(()) => {
                session.auth = AuthState::Authenticated;
                tracing::info!("Authenticated with {}", self.peer_addr);
            }
            Err(_) => session.auth = AuthState::Failed,
        }
        result
    }

    async fn do_authenticate(session: &mut Session, password: &str) -> RconResult<()> {
        let auth_id = session.fresh_id();
        session
            .send_packet(&Packet::new(auth_id, PacketType::Auth, password))
            .await?;

        // The server first mirrors the request as an empty RESPONSE_VALUE;
        // only the AUTH_RESPONSE carries the verdict.
        let mut discarded = 0;
        let response = loop {
            let packet = session.read_packet().await?;
            if packet.packet_type == PacketType::AuthResponse {
                break packet;
            }

            discarded += 1;
            if discarded > MAX_STRAY_PACKETS {
                return Err(RconError::Protocol(format!(
                    "no auth response after {} packets",
                    discarded
                )));
            }
        };

        if response.request_id == -1 {
            return Err(RconError::AuthenticationFailed);
        }
        if response.request_id != auth_id {
            return Err(RconError::Protocol(format!(
                "auth response for unknown request id {}",
                response.request_id
            )));
        }
        Ok(())
    }

    /// Execute a command and return its complete output, reassembled from
    /// however many packets the server split it across
    pub async fn execute_command(&self, command: &str) -> RconResult<Vec<u8>> {
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| RconError::CommandInProgress)?;

        match session.auth {
            AuthState::Authenticated => {}
            AuthState::Closed => return Err(RconError::SessionClosed),
            _ => return Err(RconError::NotAuthenticated),
        }

        tracing::debug!("Executing command: {}", command);
        let result = Self::do_execute(&mut session, command).await;

        // A broken stream mid-command is unrecoverable; the session is done.
        if matches!(result, Err(RconError::Io(_) | RconError::ConnectionClosed)) {
            session.auth = AuthState::Closed;
            session.stream = None;
        }
        result
    }

    async fn do_execute(session: &mut Session, command: &str) -> RconResult<Vec<u8>> {
        let command_id = session.fresh_id();
        session
            .send_packet(&Packet::new(command_id, PacketType::ExecCommand, command))
            .await?;

        // The probe: an empty RESPONSE_VALUE the server mirrors back after
        // the last response fragment, marking the end of the output.
        let probe_id = session.fresh_id();
        session
            .send_packet(&Packet::new(probe_id, PacketType::ResponseValue, ""))
            .await?;

        let mut body = Vec::new();
        let mut strays = 0;
        loop {
            let packet = session.read_packet().await?;
            if packet.request_id == command_id {
                body.extend_from_slice(&packet.body);
            } else if packet.request_id == probe_id {
                break;
            } else {
                strays += 1;
                if strays > MAX_STRAY_PACKETS {
                    return Err(RconError::Protocol(format!(
                        "runaway response: {} packets matched neither request id {} nor probe id {}",
                        strays, command_id, probe_id
                    )));
                }
                tracing::debug!(
                    "Discarding stray packet with request id {}",
                    packet.request_id
                );
            }
        }

        // The server answers the probe with two packets; the second carries
        // junk bytes and is dropped here so it cannot pollute the next
        // command's response.
        session.read_packet().await?;

        Ok(body)
    }

    /// Release the underlying connection. Idempotent.
    pub async fn close(&self) -> RconResult<()> {
        let mut session = self.session.lock().await;
        if let Some(mut stream) = session.stream.take() {
            let _ = stream.shutdown().await;
            tracing::info!("Closed RCON connection to {}", self.peer_addr);
        }
        session.auth = AuthState::Closed;
        Ok(())
    }
}

async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    let mut addrs = lookup_host((host, port)).await?;
    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
