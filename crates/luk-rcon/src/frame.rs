//! On-wire RCON frame: a header byte followed by a body, Huffman-coded as
//! a single unit.
//!
//! The reference client sends `bodyLength + 1` bytes of body (one byte
//! past the caller's logical length) and, on receive, reports
//! `bodyLength = decodedLen - 1` while writing a NUL sentinel one byte
//! past the declared end for safe text reads. This module preserves that
//! convention exactly rather than normalizing it away, since diverging
//! here would desynchronize with the server.

use crate::huffman;
use luk_core::wire::MAX_FRAME_SIZE;
use luk_core::{LukError, Result};

/// A decoded or to-be-encoded RCON message.
#[derive(Debug, Clone)]
pub struct RconFrame {
    pub header: u8,
    /// `body_length + 1` bytes: the caller-supplied body followed by one
    /// sentinel/padding byte, per the wire convention above.
    buf: Vec<u8>,
    pub body_length: u32,
}

impl RconFrame {
    /// Build a frame from a header and a logical body. The frame gains a
    /// trailing NUL byte beyond `body.len()`, matching the reference's
    /// `bodyLength + 1` wire convention.
    pub fn new(header: u8, body: &[u8]) -> Result<Self> {
        if body.len() + 2 > MAX_FRAME_SIZE {
            return Err(LukError::Protocol(format!(
                "body of {} bytes exceeds max frame size",
                body.len()
            )));
        }
        let mut buf = Vec::with_capacity(body.len() + 1);
        buf.extend_from_slice(body);
        buf.push(0);
        Ok(Self {
            header,
            buf,
            body_length: body.len() as u32,
        })
    }

    /// The logical body, excluding the trailing sentinel byte.
    pub fn body(&self) -> &[u8] {
        &self.buf[..self.body_length as usize]
    }

    /// The logical body interpreted as a NUL-terminated C-style string, up
    /// to (but not including) the first NUL byte.
    pub fn body_as_str(&self) -> std::borrow::Cow<'_, str> {
        let nul_pos = self.buf.iter().position(|&b| b == 0).unwrap_or(self.buf.len());
        String::from_utf8_lossy(&self.buf[..nul_pos])
    }

    /// Serialize `header || body[0..body_length+1]` and Huffman-encode it
    /// for transmission.
    pub fn encode_wire(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(1 + self.buf.len());
        raw.push(self.header);
        raw.extend_from_slice(&self.buf);
        huffman::encode(&raw)
    }

    /// Huffman-decode a received datagram into a frame. A zero decoded
    /// length is a hard failure for that packet.
    pub fn decode_wire(encoded: &[u8]) -> Result<Self> {
        let raw = huffman::decode(encoded)?;
        if raw.is_empty() {
            return Err(LukError::NetworkTransient(
                "decoded RCON frame was empty".to_string(),
            ));
        }
        if raw.len() > MAX_FRAME_SIZE {
            return Err(LukError::Protocol(format!(
                "decoded RCON frame of {} bytes exceeds max frame size",
                raw.len()
            )));
        }

        let header = raw[0];
        let mut buf = raw[1..].to_vec();
        let body_length = buf.len() as u32;
        // Guarantee the sentinel byte even if the peer's encoder omitted
        // it, so downstream text reads never run past the logical body.
        if buf.last().copied() != Some(0) {
            buf.push(0);
        }

        Ok(Self {
            header,
            buf,
            body_length,
        })
    }
}
