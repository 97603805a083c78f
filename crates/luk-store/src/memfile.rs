//! Growable byte buffer with a position cursor — the staging area for
//! database (de)serialization.
//!
//! Grounded on `original_source/lib/memfile.c`: a single contiguous
//! buffer plus a cursor, used both to stage exports before a single
//! `write` syscall and to hold an entire imported file in memory for
//! random-access reads.

use luk_core::{LukError, Result};
use std::path::Path;

/// An in-memory file: a byte buffer with a read/write position cursor.
#[derive(Debug, Default, Clone)]
pub struct MemFile {
    data: Vec<u8>,
    pos: usize,
}

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an entire file into memory. An empty file is not an error: it
    /// is treated as "no data yet", not corruption.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self { data, pos: 0 })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(LukError::DatabaseCorrupt(format!(
                "seek to {pos} past end of {}-byte buffer",
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Append bytes at the end of the buffer (does not move the cursor).
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Read exactly `len` bytes from the current position, advancing the
    /// cursor. Fails if fewer than `len` bytes remain.
    pub fn read(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| LukError::DatabaseCorrupt("length overflow while reading".to_string()))?;
        if end > self.data.len() {
            return Err(LukError::DatabaseCorrupt(format!(
                "attempted to read {len} bytes at offset {} of {}-byte buffer",
                self.pos,
                self.data.len()
            )));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u32_native(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.read(4)?.try_into().expect("checked length above");
        Ok(u32::from_ne_bytes(bytes))
    }

    pub fn write_u32_native(&mut self, value: u32) {
        self.append(&value.to_ne_bytes());
    }

    /// Overwrite 4 bytes at `pos` with a native-endian `u32`, without
    /// moving the cursor (used to backfill the main-table offset once it
    /// is known).
    pub fn patch_u32_native(&mut self, pos: usize, value: u32) -> Result<()> {
        if pos + 4 > self.data.len() {
            return Err(LukError::Resource("patch position out of range".to_string()));
        }
        self.data[pos..pos + 4].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_write_round_trip_native_u32() {
        let mut mf = MemFile::new();
        mf.write_u32_native(0xdead_beef);
        mf.set_position(0).unwrap();
        assert_eq!(mf.read_u32_native().unwrap(), 0xdead_beef);
    }

    #[test]
    fn patch_rewrites_without_moving_cursor() {
        let mut mf = MemFile::new();
        mf.write_u32_native(0);
        mf.append(b"payload");
        mf.set_position(3).unwrap();
        mf.patch_u32_native(0, 42).unwrap();
        assert_eq!(mf.position(), 3);
        mf.set_position(0).unwrap();
        assert_eq!(mf.read_u32_native().unwrap(), 42);
    }

    #[test]
    fn read_past_end_is_database_corrupt() {
        let mut mf = MemFile::from_bytes(vec![1, 2, 3]);
        assert!(mf.read(10).is_err());
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let mut mf = MemFile::from_bytes(vec![1, 2, 3]);
        assert!(mf.set_position(4).is_err());
        assert!(mf.set_position(3).is_ok());
    }
}
