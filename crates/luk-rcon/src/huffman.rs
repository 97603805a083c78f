//! Stateless Huffman codec for RCON datagrams.
//!
//! The wire protocol treats the Huffman codec as an external collaborator,
//! available as a byte-in/byte-out stateless pair. This is a self-contained
//! static-table coder: both ends share the same fixed frequency table, so
//! encode/decode never need to exchange a tree.

use luk_core::{LukError, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A static order-0 byte frequency table, biased toward ASCII text (the
/// capsule/command grammar is all printable ASCII plus the `\x08`
/// delimiter), so common bytes get short codes.
const STATIC_FREQUENCIES: [u32; 256] = build_static_frequencies();

const fn build_static_frequencies() -> [u32; 256] {
    let mut freq = [1u32; 256];
    // Printable ASCII and whitespace are by far the most common bytes in
    // this protocol's payloads (capsules, console commands).
    let mut b = 0x20usize;
    while b <= 0x7e {
        freq[b] = 64;
        b += 1;
    }
    freq[b'a' as usize] = 200;
    freq[b' ' as usize] = 180;
    freq[b'e' as usize] = 190;
    freq[0x08] = 96; // the query capsule delimiter
    freq[0] = 40; // NUL terminator convention
    freq
}

#[derive(Debug, Eq, PartialEq)]
struct HeapNode {
    freq: u32,
    node: Node,
}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for a min-heap via BinaryHeap (which is a max-heap).
        other.freq.cmp(&self.freq)
    }
}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Node {
    Leaf(u8),
    Internal(Box<Node>, Box<Node>),
}

/// A code: the low `len` bits of `bits`, read/written most-significant-bit
/// first.
#[derive(Debug, Clone, Copy, Default)]
struct Code {
    bits: u32,
    len: u8,
}

struct Tree {
    root: Node,
    codes: [Code; 256],
}

fn build_tree() -> Tree {
    let mut heap = BinaryHeap::new();
    for (byte, &freq) in STATIC_FREQUENCIES.iter().enumerate() {
        heap.push(HeapNode {
            freq,
            node: Node::Leaf(byte as u8),
        });
    }

    while heap.len() > 1 {
        let a = heap.pop().expect("heap has >1 element");
        let b = heap.pop().expect("heap has >1 element");
        heap.push(HeapNode {
            freq: a.freq + b.freq,
            node: Node::Internal(Box::new(a.node), Box::new(b.node)),
        });
    }

    let root = heap.pop().expect("heap is non-empty for 256 symbols").node;

    let mut codes = [Code::default(); 256];
    assign_codes(&root, 0, 0, &mut codes);

    Tree { root, codes }
}

fn assign_codes(node: &Node, bits: u32, len: u8, codes: &mut [Code; 256]) {
    match node {
        Node::Leaf(byte) => {
            codes[*byte as usize] = Code { bits, len: len.max(1) };
        }
        Node::Internal(left, right) => {
            assign_codes(left, bits << 1, len + 1, codes);
            assign_codes(right, (bits << 1) | 1, len + 1, codes);
        }
    }
}

struct BitWriter {
    bytes: Vec<u8>,
    cur: u8,
    filled: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            cur: 0,
            filled: 0,
        }
    }

    fn push_code(&mut self, code: Code) {
        for i in (0..code.len).rev() {
            let bit = (code.bits >> i) & 1;
            self.cur = (self.cur << 1) | bit as u8;
            self.filled += 1;
            if self.filled == 8 {
                self.bytes.push(self.cur);
                self.cur = 0;
                self.filled = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.cur <<= 8 - self.filled;
            self.bytes.push(self.cur);
        }
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn next_bit(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.byte_pos)?;
        let bit = (byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Some(bit)
    }
}

/// Encode `src` into a Huffman-compressed frame, self-describing so
/// [`decode`] recovers the exact original length.
pub fn encode(src: &[u8]) -> Vec<u8> {
    let tree = build_tree();

    let mut out = Vec::with_capacity(4 + src.len());
    out.extend_from_slice(&(src.len() as u32).to_le_bytes());

    let mut writer = BitWriter::new();
    for &byte in src {
        writer.push_code(tree.codes[byte as usize]);
    }
    out.extend_from_slice(&writer.finish());
    out
}

/// Decode a frame produced by [`encode`]. A declared length of zero is a
/// hard failure for that packet
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>> {
    if encoded.len() < 4 {
        return Err(LukError::NetworkTransient(
            "huffman frame shorter than length prefix".to_string(),
        ));
    }
    let declared_len = u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
    if declared_len == 0 {
        return Err(LukError::NetworkTransient(
            "huffman frame decoded to zero length".to_string(),
        ));
    }

    let tree = build_tree();
    let mut reader = BitReader::new(&encoded[4..]);
    let mut out = Vec::with_capacity(declared_len);

    while out.len() < declared_len {
        let mut node = &tree.root;
        loop {
            match node {
                Node::Leaf(byte) => {
                    out.push(*byte);
                    break;
                }
                Node::Internal(left, right) => {
                    let bit = reader.next_bit().ok_or_else(|| {
                        LukError::NetworkTransient("huffman stream truncated".to_string())
                    })?;
                    node = if bit == 0 { left } else { right };
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_command() {
        let src = b"\x08luk 1 STORE foo {bar baz}\x08";
        let encoded = encode(src);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn round_trips_empty_payload_is_rejected_on_decode() {
        let encoded = encode(b"");
        let err = decode(&encoded).unwrap_err();
        assert!(matches!(err, LukError::NetworkTransient(_)));
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let encoded = encode(b"hello world");
        let truncated = &encoded[..encoded.len() - 1];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn decode_rejects_too_short_input() {
        assert!(decode(&[1, 2]).is_err());
    }
}
