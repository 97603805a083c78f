//! RCON session state machine: handshake, keepalive, send/receive.
//!
//! States: `Idle -> Handshaking -> Authenticating -> LoggedIn ->
//! Disconnecting -> Idle`.

use crate::frame::RconFrame;
use crate::socket::RconSocket;
use luk_core::wire::{
    client_header, server_header, update_kind, DEFAULT_LOGIN_RETRIES, DEFAULT_SELECT_TIMEOUT_SECS,
    KEEPALIVE_INTERVAL_SECS, LOGIN_PROTOCOL_VERSION,
};
use luk_core::{LukError, Result};
use md5::{Digest, Md5};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The session's position in the handshake/lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Handshaking,
    Authenticating,
    LoggedIn,
    Disconnecting,
}

/// A parsed `UPDATE` sub-message, received either inside the initial
/// `LOGGED_IN` blob or at any later point in the session.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// New current map name.
    Map(String),
    /// Player data list; contents are not consumed by any handler, so we
    /// only retain the count.
    PlayerData { total_players: u8 },
    /// Current admin count.
    AdminCount(u8),
}

/// The body of the `LOGGED_IN` message: protocol byte, hostname, and the
/// initial batch of update records.
#[derive(Debug, Clone)]
pub struct InitialState {
    pub protocol: u8,
    pub hostname: String,
    pub updates: Vec<UpdateEvent>,
}

impl InitialState {
    pub fn map_name(&self) -> Option<&str> {
        self.updates.iter().find_map(|u| match u {
            UpdateEvent::Map(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A server message the event loop must react to once logged in.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Carries a query capsule (or other server console chatter) destined
    /// for the query parser.
    Message(Vec<u8>),
    /// A later in-session update, e.g. a map change.
    Update(UpdateEvent),
}

/// A live RCON session with a single remote peer.
pub struct RconSession {
    socket: RconSocket,
    password: String,
    state: SessionState,
    last_keepalive: Instant,
    select_timeout: Duration,
    login_retries: u32,
}

impl RconSession {
    /// Connect the underlying socket; does not perform the handshake yet.
    pub async fn new(peer: SocketAddr, password: impl Into<String>) -> Result<Self> {
        let socket = RconSocket::connect(peer).await?;
        Ok(Self {
            socket,
            password: password.into(),
            state: SessionState::Idle,
            last_keepalive: Instant::now(),
            select_timeout: Duration::from_secs(DEFAULT_SELECT_TIMEOUT_SECS),
            login_retries: DEFAULT_LOGIN_RETRIES,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the full login handshake, retrying transient (timeout/decode)
    /// failures up to `login_retries` times. Fatal failures (banned,
    /// invalid password, old protocol) are returned immediately.
    pub async fn login(&mut self) -> Result<InitialState> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.login_once().await {
                Ok(initial) => {
                    self.state = SessionState::LoggedIn;
                    self.last_keepalive = Instant::now();
                    return Ok(initial);
                }
                Err(e) if e.is_retryable() && attempt < self.login_retries => {
                    warn!(attempt, error = %e, "login attempt failed, retrying");
                    self.state = SessionState::Idle;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn login_once(&mut self) -> Result<InitialState> {
        self.state = SessionState::Handshaking;
        let begin = RconFrame::new(client_header::BEGIN_CONNECTION, &[LOGIN_PROTOCOL_VERSION])?;
        self.socket.send(&begin.encode_wire()).await?;

        let reply = self.await_reply().await?;
        let salt = match reply.header {
            server_header::OLD_PROTOCOL => {
                return Err(LukError::NetworkFatal("server reported OLD_PROTOCOL".to_string()));
            }
            server_header::BANNED => {
                return Err(LukError::NetworkFatal("client is banned from this server".to_string()));
            }
            server_header::SALT => reply.body().to_vec(),
            other => {
                return Err(LukError::NetworkTransient(format!(
                    "unexpected header {other} while awaiting SALT"
                )));
            }
        };

        self.state = SessionState::Authenticating;
        let hash = hash_password(&salt, self.password.as_bytes());
        let mut password_body = hash.into_bytes();
        password_body.push(0);
        let password_frame = RconFrame::new(client_header::PASSWORD, &password_body)?;
        self.socket.send(&password_frame.encode_wire()).await?;

        let reply = self.await_reply().await?;
        match reply.header {
            server_header::INVALID_PASSWORD => {
                Err(LukError::NetworkFatal("invalid RCON password".to_string()))
            }
            server_header::LOGGED_IN => parse_initial_state(reply.body()),
            other => Err(LukError::NetworkTransient(format!(
                "unexpected header {other} while awaiting LOGGED_IN"
            ))),
        }
    }

    async fn await_reply(&self) -> Result<RconFrame> {
        let datagram = self
            .socket
            .recv(self.select_timeout)
            .await?
            .ok_or_else(|| LukError::NetworkTransient("timed out waiting for server reply".to_string()))?;
        RconFrame::decode_wire(&datagram)
    }

    /// Send a client `COMMAND` frame (the channel reply text and
    /// operator-visible console commands both travel this way).
    pub async fn send_command(&self, body: &[u8]) -> Result<()> {
        let frame = RconFrame::new(client_header::COMMAND, body)?;
        self.socket.send(&frame.encode_wire()).await
    }

    /// Wait up to the configured `select` timeout for the next server
    /// message, decoding `MESSAGE`/`UPDATE` frames. Any other header is
    /// logged and treated as no message this tick.
    pub async fn recv_message(&self) -> Result<Option<ServerMessage>> {
        let Some(datagram) = self.socket.recv(self.select_timeout).await? else {
            return Ok(None);
        };
        let frame = RconFrame::decode_wire(&datagram)?;
        match frame.header {
            server_header::MESSAGE => Ok(Some(ServerMessage::Message(frame.body().to_vec()))),
            server_header::UPDATE => {
                let event = parse_update(frame.body())?;
                Ok(Some(ServerMessage::Update(event)))
            }
            other => {
                debug!(header = other, "ignoring unhandled server header");
                Ok(None)
            }
        }
    }

    /// Send a `PONG` keepalive if at least `KEEPALIVE_INTERVAL_SECS`
    /// elapsed since the last one.
    pub async fn maybe_keepalive(&mut self) -> Result<()> {
        if self.last_keepalive.elapsed() < Duration::from_secs(KEEPALIVE_INTERVAL_SECS) {
            return Ok(());
        }
        let frame = RconFrame::new(client_header::PONG, &[])?;
        self.socket.send(&frame.encode_wire()).await?;
        self.last_keepalive = Instant::now();
        Ok(())
    }

    /// Send the `DISCONNECT` frame and move to `Idle`.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.state = SessionState::Disconnecting;
        let frame = RconFrame::new(client_header::DISCONNECT, &[])?;
        self.socket.send(&frame.encode_wire()).await?;
        self.state = SessionState::Idle;
        info!("RCON session disconnected");
        Ok(())
    }
}

/// `hex(md5(salt || password))`, lowercase, 32 hex characters.
pub fn hash_password(salt: &[u8], password: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(salt);
    hasher.update(password);
    let digest = hasher.finalize();
    hex::encode(digest)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| LukError::Protocol("unexpected end of update payload".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_cstr(&mut self) -> Result<String> {
        let start = self.pos;
        let nul = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| LukError::Protocol("unterminated string in update payload".to_string()))?;
        let s = String::from_utf8_lossy(&self.data[start..start + nul]).into_owned();
        self.pos = start + nul + 1;
        Ok(s)
    }
}

fn parse_update(body: &[u8]) -> Result<UpdateEvent> {
    let mut cursor = Cursor::new(body);
    let sub_kind = cursor.read_u8()?;
    match sub_kind {
        update_kind::MAP => Ok(UpdateEvent::Map(cursor.read_cstr()?)),
        update_kind::ADMINCOUNT => Ok(UpdateEvent::AdminCount(cursor.read_u8()?)),
        update_kind::PLAYERDATA => {
            let total_players = cursor.read_u8()?;
            for _ in 0..total_players {
                let _ = cursor.read_cstr()?;
            }
            Ok(UpdateEvent::PlayerData { total_players })
        }
        other => Err(LukError::Protocol(format!("unknown update sub-kind {other}"))),
    }
}

fn parse_initial_state(body: &[u8]) -> Result<InitialState> {
    let mut cursor = Cursor::new(body);
    let protocol = cursor.read_u8()?;
    let hostname = cursor.read_cstr()?;
    let total_updates = cursor.read_u8()?;

    let mut updates = Vec::with_capacity(total_updates as usize);
    for _ in 0..total_updates {
        let sub_kind = cursor.read_u8()?;
        let event = match sub_kind {
            update_kind::MAP => UpdateEvent::Map(cursor.read_cstr()?),
            update_kind::ADMINCOUNT => UpdateEvent::AdminCount(cursor.read_u8()?),
            update_kind::PLAYERDATA => {
                let total_players = cursor.read_u8()?;
                for _ in 0..total_players {
                    let _ = cursor.read_cstr()?;
                }
                UpdateEvent::PlayerData { total_players }
            }
            other => return Err(LukError::Protocol(format!("unknown update sub-kind {other}"))),
        };
        updates.push(event);
    }

    Ok(InitialState {
        protocol,
        hostname,
        updates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_is_lowercase_hex_md5() {
        let hash = hash_password(b"abc123", b"hunter2");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn parses_initial_state_with_map_update() {
        let mut body = vec![3u8]; // protocol
        body.extend_from_slice(b"myserver\0"); // hostname
        body.push(1); // totalUpdates
        body.push(update_kind::MAP);
        body.extend_from_slice(b"map01\0");

        let initial = parse_initial_state(&body).unwrap();
        assert_eq!(initial.protocol, 3);
        assert_eq!(initial.hostname, "myserver");
        assert_eq!(initial.map_name(), Some("map01"));
    }

    #[test]
    fn parses_playerdata_update() {
        let mut body = vec![update_kind::PLAYERDATA, 2];
        body.extend_from_slice(b"alice\0");
        body.extend_from_slice(b"bob\0");

        let event = parse_update(&body).unwrap();
        assert!(matches!(event, UpdateEvent::PlayerData { total_players: 2 }));
    }

    #[test]
    fn parses_admincount_update() {
        let body = vec![update_kind::ADMINCOUNT, 4];
        let event = parse_update(&body).unwrap();
        assert!(matches!(event, UpdateEvent::AdminCount(4)));
    }
}
