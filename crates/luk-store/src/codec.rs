//! Binary database file codec: import (with a validation chain) and
//! two-pass export with offset backfilling.
//!
//! Grounded on `original_source/src/lukd.c`. File layout, in order:
//!
//! ```text
//! [0..4)    main table offset (u32, native endian)
//! records   one run per map entry: { keySize u32, valueSize u32, key, value }*
//! directory one LukdMapEntry per map with records: { name[8], totalRecords u32, firstRecord u32 }
//! table     { totalMapEntries u32, firstMapEntry u32, publishDate i32 }, pointed to by offset 0
//! ```
//!
//! The main table sits at the *end* of the file; the offset word at the
//! very start is backfilled once its position is known, which is why
//! export is a two-pass process (§9 decision: host-native byte order,
//! migration to a portable little-endian format with a magic/version
//! pair deferred as a design-review item).

use crate::database::Database;
use crate::memfile::MemFile;
use crate::record::MapEntry;
use luk_core::{LukError, Result};
use std::path::Path;
use tracing::{info, warn};

const MAIN_TABLE_OFFSET_SIZE: usize = 4;
const MAIN_TABLE_SIZE: usize = 4 + 4 + 4; // totalMapEntries, firstMapEntry, publishDate
const MAP_ENTRY_SIZE: usize = 8 + 4 + 4; // name[8], totalRecords, firstRecord
const RECORD_HEADER_SIZE: usize = 4 + 4; // keySize, valueSize
const MAX_MAP_NAME_LEN: usize = luk_core::wire::MAX_MAP_NAME_LEN;
const BACKUP_EXT: &str = ".backup";

struct MainTable {
    total_map_entries: u32,
    first_map_entry: u32,
    publish_date: i32,
}

struct RawMapEntry {
    name: [u8; MAX_MAP_NAME_LEN],
    total_records: u32,
    first_record: u32,
}

/// Load a database file from `path` into `db`, replacing its contents.
///
/// An empty or missing-on-disk-but-present-as-zero-length file is treated
/// as "no data yet" and succeeds with an empty database,
/// matching the reference's `bytesAdded == 0` branch. On success, a
/// `<path>.backup` copy of the raw bytes is written alongside it.
pub fn import_database(db: &mut Database, path: &Path) -> Result<()> {
    info!(path = %path.display(), "importing database file");
    let mut file = MemFile::from_path(path)?;

    if file.size() == 0 {
        info!("database file is empty");
        db.load_entries(Vec::new());
        return Ok(());
    }

    let entries = import(&mut file)?;
    db.load_entries(entries);
    backup_file(&file, path);
    Ok(())
}

fn backup_file(file: &MemFile, path: &Path) {
    let backup_path = format!("{}{}", path.display(), BACKUP_EXT);
    info!(path = %backup_path, "creating backup database file");
    if let Err(err) = file.save(Path::new(&backup_path)) {
        warn!(%err, "failed to create backup database file");
    }
}

fn import(file: &mut MemFile) -> Result<Vec<MapEntry>> {
    let file_size = file.size();

    file.rewind();
    let main_table_offset = file.read_u32_native()?;
    if !is_valid_main_table_offset(main_table_offset, file_size) {
        return Err(LukError::DatabaseCorrupt(format!(
            "bad main table offset in file: {main_table_offset}"
        )));
    }

    file.set_position(main_table_offset as usize)?;
    let table = read_main_table(file)?;
    if !is_valid_main_table(&table, file_size) {
        return Err(LukError::DatabaseCorrupt(
            "corrupt main table in database file".to_string(),
        ));
    }

    let (entries, total_records) = import_map_entries(file, &table, file_size)?;
    log_import_summary(table.total_map_entries, total_records);
    Ok(entries)
}

/// Debug summary of a successful import, grounded on the reference's
/// `LukdPrintFileInfo`.
pub fn log_import_summary(total_map_entries: u32, total_records: u32) {
    info!(total_map_entries, total_records, "database file imported");
}

fn read_main_table(file: &mut MemFile) -> Result<MainTable> {
    let total_map_entries = file.read_u32_native()?;
    let first_map_entry = file.read_u32_native()?;
    let publish_date = file.read_u32_native()? as i32;
    Ok(MainTable {
        total_map_entries,
        first_map_entry,
        publish_date,
    })
}

fn read_map_entry(file: &mut MemFile) -> Result<RawMapEntry> {
    let name_bytes = file.read(MAX_MAP_NAME_LEN)?;
    let mut name = [0u8; MAX_MAP_NAME_LEN];
    name.copy_from_slice(name_bytes);
    let total_records = file.read_u32_native()?;
    let first_record = file.read_u32_native()?;
    Ok(RawMapEntry {
        name,
        total_records,
        first_record,
    })
}

fn import_map_entries(
    file: &mut MemFile,
    table: &MainTable,
    file_size: usize,
) -> Result<(Vec<MapEntry>, u32)> {
    file.set_position(table.first_map_entry as usize)?;

    let mut entries = Vec::new();
    let mut total_records = 0u32;

    for _ in 0..table.total_map_entries {
        let raw = read_map_entry(file)?;
        if !is_valid_map_entry(&raw, file_size) {
            return Err(LukError::DatabaseCorrupt(
                "corrupt map entry encountered in database file".to_string(),
            ));
        }

        let name_end = raw.name.iter().position(|&b| b == 0).unwrap_or(raw.name.len());
        let name = String::from_utf8_lossy(&raw.name[..name_end]).to_string();
        let mut entry = MapEntry::new(name);

        let next_entry_position = file.position();
        import_records(file, &raw, file_size, &mut entry)?;
        total_records += raw.total_records;
        file.set_position(next_entry_position)?;

        entries.push(entry);
    }

    Ok((entries, total_records))
}

fn import_records(
    file: &mut MemFile,
    raw: &RawMapEntry,
    file_size: usize,
    entry: &mut MapEntry,
) -> Result<()> {
    file.set_position(raw.first_record as usize)?;

    for _ in 0..raw.total_records {
        let key_size = file.read_u32_native()? as usize;
        let value_size = file.read_u32_native()? as usize;
        if !is_valid_record_header(key_size, value_size, file_size, file.position()) {
            return Err(LukError::DatabaseCorrupt(
                "malformed record found in database file".to_string(),
            ));
        }

        let key = String::from_utf8_lossy(file.read(key_size)?).to_string();
        let value = file.read(value_size)?.to_vec();
        entry.store(&key, value);
    }

    Ok(())
}

fn is_valid_main_table_offset(offset: u32, file_size: usize) -> bool {
    match file_size.checked_sub(MAIN_TABLE_SIZE) {
        Some(max_offset) => (offset as usize) <= max_offset,
        None => false,
    }
}

fn is_valid_main_table(table: &MainTable, file_size: usize) -> bool {
    if table.total_map_entries == 0 {
        return true;
    }

    let lower_limit = MAIN_TABLE_SIZE;
    let Some(upper_limit) = file_size.checked_sub(MAP_ENTRY_SIZE) else {
        return false;
    };
    let first = table.first_map_entry as usize;
    if first < lower_limit || first > upper_limit {
        warn!("first map entry is not within valid limits");
        return false;
    }

    let directory_size = table.total_map_entries as usize * MAP_ENTRY_SIZE;
    if directory_size > file_size.saturating_sub(first) {
        warn!("total size of entries is too big for given file");
        return false;
    }

    true
}

fn is_valid_map_entry(entry: &RawMapEntry, file_size: usize) -> bool {
    if entry.total_records == 0 {
        return true;
    }

    let lower_limit = MAIN_TABLE_OFFSET_SIZE;
    let Some(upper_limit) = file_size.checked_sub(RECORD_HEADER_SIZE) else {
        return false;
    };
    let first = entry.first_record as usize;
    if first < lower_limit || first > upper_limit {
        return false;
    }

    if entry.total_records as usize >= file_size {
        return false;
    }

    true
}

fn is_valid_record_header(
    key_size: usize,
    value_size: usize,
    file_size: usize,
    position: usize,
) -> bool {
    let max_body_size = file_size
        .saturating_sub(MAIN_TABLE_SIZE)
        .saturating_sub(position);
    key_size + value_size <= max_body_size
}

/// Serialize `db` to `path` using the two-pass layout described above.
pub fn export_database(db: &Database, path: &Path) -> Result<()> {
    info!(path = %path.display(), "saving database to file");

    let mut out = MemFile::new();
    let placeholder: u32 = 0;
    out.write_u32_native(placeholder);

    let (total_map_entries, first_map_entry) = export_entries(&mut out, db)?;
    let main_table_offset = out.position() as u32;
    export_main_table(&mut out, total_map_entries, first_map_entry)?;

    out.set_position(0)?;
    out.patch_u32_native(0, main_table_offset)?;

    out.save(path)?;
    Ok(())
}

fn export_entries(out: &mut MemFile, db: &Database) -> Result<(u32, u32)> {
    let mut directory = MemFile::new();
    let mut exported = 0u32;

    for entry in db.entries() {
        if entry.total_records() == 0 {
            continue;
        }

        let first_record_position = out.position() as u32;
        export_records(out, entry);

        let mut name_bytes = [0u8; MAX_MAP_NAME_LEN];
        let raw = entry.name().as_bytes();
        let copy_len = raw.len().min(MAX_MAP_NAME_LEN);
        name_bytes[..copy_len].copy_from_slice(&raw[..copy_len]);

        directory.append(&name_bytes);
        directory.write_u32_native(entry.total_records() as u32);
        directory.write_u32_native(first_record_position);
        exported += 1;
    }

    let first_map_entry = out.position() as u32;
    out.append(directory.as_slice());

    Ok((exported, first_map_entry))
}

fn export_records(out: &mut MemFile, entry: &MapEntry) {
    for record in entry.records() {
        out.write_u32_native(record.key.len() as u32);
        out.write_u32_native(record.value.len() as u32);
        out.append(record.key.as_bytes());
        out.append(&record.value);
    }
}

fn export_main_table(out: &mut MemFile, total_map_entries: u32, first_map_entry: u32) -> Result<()> {
    out.write_u32_native(total_map_entries);
    out.write_u32_native(first_map_entry);
    let publish_date = chrono::Utc::now().timestamp() as u32;
    out.write_u32_native(publish_date);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn export_then_import_round_trips_records() {
        let mut db = Database::new();
        db.change_map("map01");
        db.store("foo", b"bar".to_vec()).unwrap();
        db.change_map("map02");
        db.store("baz", b"quux".to_vec()).unwrap();
        db.store("long_key_name", b"another value".to_vec()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("test.lukd");
        export_database(&db, &path).unwrap();

        let mut loaded = Database::new();
        import_database(&mut loaded, &path).unwrap();

        loaded.change_map("map01");
        assert_eq!(loaded.retrieve("foo").unwrap(), Some(b"bar".as_slice()));
        loaded.change_map("map02");
        assert_eq!(loaded.retrieve("baz").unwrap(), Some(b"quux".as_slice()));
        assert_eq!(
            loaded.retrieve("long_key_name").unwrap(),
            Some(b"another value".as_slice())
        );
        assert_eq!(loaded.total_records(), 3);
    }

    #[test]
    fn export_skips_empty_map_entries() {
        let mut db = Database::new();
        db.change_map("empty");
        db.change_map("nonempty");
        db.store("k", b"v".to_vec()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("test.lukd");
        export_database(&db, &path).unwrap();

        let mut loaded = Database::new();
        import_database(&mut loaded, &path).unwrap();
        assert_eq!(loaded.total_maps(), 1);
        assert!(loaded.find_map("empty").is_none());
    }

    #[test]
    fn import_of_empty_file_succeeds_with_no_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.lukd");
        std::fs::write(&path, []).unwrap();

        let mut db = Database::new();
        import_database(&mut db, &path).unwrap();
        assert_eq!(db.total_maps(), 0);
    }

    #[test]
    fn import_creates_backup_file() {
        let mut db = Database::new();
        db.change_map("m");
        db.store("k", b"v".to_vec()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("test.lukd");
        export_database(&db, &path).unwrap();

        let mut loaded = Database::new();
        import_database(&mut loaded, &path).unwrap();

        let backup_path = dir.path().join("test.lukd.backup");
        assert!(backup_path.exists());
    }

    #[test]
    fn import_rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.lukd");
        std::fs::write(&path, [1, 2, 3]).unwrap();

        let mut db = Database::new();
        let err = import_database(&mut db, &path).unwrap_err();
        assert!(matches!(err, LukError::DatabaseCorrupt(_)));
    }

    #[test]
    fn import_rejects_bad_main_table_offset() {
        let mut raw = vec![0xffu8; 4];
        raw.extend_from_slice(&[0u8; 20]);

        let dir = tempdir().unwrap();
        let path = dir.path().join("bad_offset.lukd");
        std::fs::write(&path, &raw).unwrap();

        let mut db = Database::new();
        let err = import_database(&mut db, &path).unwrap_err();
        assert!(matches!(err, LukError::DatabaseCorrupt(_)));
    }
}
