//! Wire-level constants shared between the RCON session and the protocol
//! layer: header byte values, update sub-kinds, and the query capsule
//! delimiter.

/// Client -> server header byte values.
pub mod client_header {
    pub const BEGIN_CONNECTION: u8 = 52;
    pub const PASSWORD: u8 = 53;
    pub const COMMAND: u8 = 54;
    pub const PONG: u8 = 55;
    pub const DISCONNECT: u8 = 56;
}

/// Server -> client header byte values.
pub mod server_header {
    pub const OLD_PROTOCOL: u8 = 32;
    pub const BANNED: u8 = 33;
    pub const SALT: u8 = 34;
    pub const LOGGED_IN: u8 = 35;
    pub const INVALID_PASSWORD: u8 = 36;
    pub const MESSAGE: u8 = 37;
    pub const UPDATE: u8 = 38;
}

/// Sub-kinds carried by an `UPDATE` message, both in the initial
/// `LOGGED_IN` state blob and in any later `UPDATE` sent during a session.
pub mod update_kind {
    pub const PLAYERDATA: u8 = 0;
    pub const ADMINCOUNT: u8 = 1;
    pub const MAP: u8 = 2;
}

/// Login protocol version sent in `BEGIN_CONNECTION`.
pub const LOGIN_PROTOCOL_VERSION: u8 = 3;

/// Maximum pre-encoding RCON frame size (header + body).
pub const MAX_FRAME_SIZE: usize = 8192;

/// Maximum reply data payload, in bytes.
pub const MAX_REPLY_DATA: usize = 10;

/// Query capsule delimiter (`\x08`, BS).
pub const QUERY_DELIMITER: u8 = 0x08;

/// Lowercased query prefix, checked case-insensitively.
pub const QUERY_PREFIX: &str = "luk";

/// Maximum number of decimal digits accepted for a query ID.
pub const QUERY_ID_MAX_DIGITS: usize = 9;

/// Maximum number of arguments retained by the command parser.
pub const COMMAND_MAX_ARGS: usize = 5;

/// Default `select`-equivalent receive timeout.
pub const DEFAULT_SELECT_TIMEOUT_SECS: u64 = 1;

/// Default number of login retries before giving up.
pub const DEFAULT_LOGIN_RETRIES: u32 = 3;

/// Keepalive interval: at most one PONG per this many seconds.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 5;

/// Maximum length, in bytes, of a persisted map name.
pub const MAX_MAP_NAME_LEN: usize = 8;

/// Bytes packed per chunked string-transmission segment.
pub const STRING_SEGMENT_MAX_BYTES: usize = 3;

/// Added to every byte before packing, so each byte occupies exactly
/// three base-1000 digits.
pub const STRING_SEGMENT_ASCII_BIAS: i64 = 100;
