//! In-memory database: map entries, current-map pointer, dirty counter.

use crate::record::MapEntry;
use luk_core::{LukError, Result};
use std::collections::HashMap;
use tracing::info;

/// Collection of map partitions plus a designated current map.
///
/// Invariants maintained by this type:
/// - `total_records() == sum(entry.total_records())`.
/// - `current_map`, if set, names an entry present in `entries`.
/// - STORE, DELETE and LOAD are the only mutators; STORE/DELETE increment
///   `updates_since_last_save`; loading resets it to zero.
#[derive(Debug, Default)]
pub struct Database {
    entries: Vec<MapEntry>,
    index: HashMap<String, usize>,
    current_map: Option<String>,
    updates_since_last_save: u64,
    operational: bool,
}

impl Database {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            current_map: None,
            updates_since_last_save: 0,
            operational: true,
        }
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn current_map(&self) -> Option<&str> {
        self.current_map.as_deref()
    }

    pub fn total_maps(&self) -> usize {
        self.entries.len()
    }

    pub fn total_records(&self) -> usize {
        self.entries.iter().map(MapEntry::total_records).sum()
    }

    pub fn updates_since_last_save(&self) -> u64 {
        self.updates_since_last_save
    }

    pub fn save_needed(&self) -> bool {
        self.updates_since_last_save > 0
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn find_map(&self, name: &str) -> Option<&MapEntry> {
        let lower = name.to_lowercase();
        self.index.get(&lower).map(|&i| &self.entries[i])
    }

    /// Switch the current map, creating a new (empty) entry if one with
    /// this name doesn't already exist. Returns `false` if the requested
    /// map is already current (matching the reference's early-out).
    pub fn change_map(&mut self, name: &str) -> bool {
        let lower = name.to_lowercase();
        if self.current_map.as_deref() == Some(lower.as_str()) {
            return false;
        }

        if !self.index.contains_key(&lower) {
            self.index.insert(lower.clone(), self.entries.len());
            self.entries.push(MapEntry::new(lower.clone()));
        }

        self.current_map = Some(lower);
        true
    }

    fn current_entry_mut(&mut self) -> Result<&mut MapEntry> {
        let name = self
            .current_map
            .clone()
            .ok_or_else(|| LukError::Command("no current map selected".to_string()))?;
        let &slot = self.index.get(&name).expect("current_map always indexed");
        Ok(&mut self.entries[slot])
    }

    fn current_entry(&self) -> Result<&MapEntry> {
        let name = self
            .current_map
            .as_deref()
            .ok_or_else(|| LukError::Command("no current map selected".to_string()))?;
        let &slot = self.index.get(name).expect("current_map always indexed");
        Ok(&self.entries[slot])
    }

    /// Store a value under `key` in the current map, overwriting any
    /// existing value for that key. Key validation (non-empty, alphabetic
    /// first byte) is the caller's responsibility, enforced at the STORE
    /// handler, not here.
    pub fn store(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.current_entry_mut()?.store(key, value);
        self.updates_since_last_save += 1;
        Ok(())
    }

    pub fn retrieve(&self, key: &str) -> Result<Option<&[u8]>> {
        Ok(self.current_entry()?.retrieve(key))
    }

    /// Remove an entire map entry by name, wherever the database's
    /// current map pointer is (used by the `-d <map>` CLI flag; not
    /// reachable from the query/command pipeline).
    pub fn delete_map(&mut self, name: &str) -> bool {
        let lower = name.to_lowercase();
        let Some(&slot) = self.index.get(&lower) else {
            return false;
        };

        self.entries.remove(slot);
        self.index.remove(&lower);
        for idx in self.index.values_mut() {
            if *idx > slot {
                *idx -= 1;
            }
        }

        if self.current_map.as_deref() == Some(lower.as_str()) {
            self.current_map = None;
        }

        self.updates_since_last_save += 1;
        true
    }

    /// Replace the in-memory state wholesale (used by the codec after a
    /// successful import) and reset the dirty counter to zero: loading
    /// from file means there are no unsaved changes yet.
    pub fn load_entries(&mut self, entries: Vec<MapEntry>) {
        self.index.clear();
        for (i, entry) in entries.iter().enumerate() {
            self.index.insert(entry.name().to_string(), i);
        }
        self.entries = entries;
        self.current_map = None;
        self.updates_since_last_save = 0;
    }

    pub fn mark_saved(&mut self) {
        self.updates_since_last_save = 0;
    }

    pub fn shutdown(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.current_map = None;
        self.updates_since_last_save = 0;
        self.operational = false;
        info!("database shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_retrieve_round_trip() {
        let mut db = Database::new();
        db.change_map("map01");
        db.store("foo", b"bar baz".to_vec()).unwrap();
        assert_eq!(db.retrieve("foo").unwrap(), Some(b"bar baz".as_slice()));
    }

    #[test]
    fn store_increments_dirty_counter() {
        let mut db = Database::new();
        db.change_map("map01");
        assert_eq!(db.updates_since_last_save(), 0);
        db.store("foo", b"1".to_vec()).unwrap();
        assert_eq!(db.updates_since_last_save(), 1);
        db.store("foo", b"2".to_vec()).unwrap();
        assert_eq!(db.updates_since_last_save(), 2);
    }

    #[test]
    fn mark_saved_resets_dirty_counter() {
        let mut db = Database::new();
        db.change_map("map01");
        db.store("foo", b"1".to_vec()).unwrap();
        db.mark_saved();
        assert_eq!(db.updates_since_last_save(), 0);
    }

    #[test]
    fn total_records_matches_sum_across_maps() {
        let mut db = Database::new();
        db.change_map("a");
        db.store("k1", b"v1".to_vec()).unwrap();
        db.change_map("b");
        db.store("k2", b"v2".to_vec()).unwrap();
        db.store("k3", b"v3".to_vec()).unwrap();

        assert_eq!(db.total_records(), 3);
        assert_eq!(
            db.entries().iter().map(|e| e.total_records()).sum::<usize>(),
            3
        );
    }

    #[test]
    fn change_map_is_case_insensitive() {
        let mut db = Database::new();
        db.change_map("MapOne");
        db.store("k", b"v".to_vec()).unwrap();
        db.change_map("mapone");
        assert_eq!(db.retrieve("k").unwrap(), Some(b"v".as_slice()));
    }

    #[test]
    fn delete_map_removes_entry_and_records() {
        let mut db = Database::new();
        db.change_map("a");
        db.store("k", b"v".to_vec()).unwrap();
        assert!(db.delete_map("a"));
        assert_eq!(db.total_maps(), 0);
        assert_eq!(db.total_records(), 0);
    }

    #[test]
    fn delete_map_missing_entry_returns_false() {
        let mut db = Database::new();
        assert!(!db.delete_map("nope"));
    }

    #[test]
    fn store_without_current_map_is_a_command_error() {
        let mut db = Database::new();
        let err = db.store("k", b"v".to_vec()).unwrap_err();
        assert!(matches!(err, LukError::Command(_)));
    }
}
