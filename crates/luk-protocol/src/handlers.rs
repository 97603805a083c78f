//! Query action handlers.
//!
//! Grounded on `original_source/src/handler.c`. Each handler reads its
//! arguments from a parsed [`Command`], talks to the [`Database`], and
//! optionally produces a [`Reply`] — STORE, STORE_DATE, PRINT and
//! PRINT_DATABASE never reply at all, matching the reference's handlers
//! that never touch the reply struct.

use crate::command::{Action, Command};
use crate::reply::{Reply, QueryResult};
use chrono::{Datelike, Local, TimeZone, Utc};
use luk_core::wire::{STRING_SEGMENT_ASCII_BIAS, STRING_SEGMENT_MAX_BYTES};
use luk_store::Database;
use tracing::{info, warn};

/// State for a chunked RETRIEVE_STRING_INITIATE/SEGMENT transfer. Owned by
/// the caller's per-session context, not a process-wide static.
#[derive(Debug)]
pub struct StringTransmission {
    value: Vec<u8>,
    queries_needed: i64,
    offset: usize,
    chars_left: usize,
}

impl StringTransmission {
    fn new(value: Vec<u8>) -> Self {
        let len = value.len();
        let mut queries_needed = (len / STRING_SEGMENT_MAX_BYTES) as i64;
        if len % STRING_SEGMENT_MAX_BYTES != 0 {
            queries_needed += 1;
        }
        Self {
            value,
            queries_needed,
            offset: 0,
            chars_left: len,
        }
    }

    pub fn queries_needed(&self) -> i64 {
        self.queries_needed
    }
}

/// Run `command` against `db`, using and updating `string_tx` for the
/// chunked string-retrieval actions. Returns the reply to send back, or
/// `None` for actions that never reply.
pub fn dispatch(
    command: &Command,
    db: &mut Database,
    string_tx: &mut Option<StringTransmission>,
    query_id: u32,
) -> Option<Reply> {
    match command.action {
        Action::Store => handle_store(command, db),
        Action::StoreDate => handle_store_date(command, db),
        Action::Retrieve => handle_retrieve(command, db, query_id),
        Action::RetrieveDate => handle_retrieve_date(command, db, query_id),
        Action::RetrieveStringInitiate => {
            handle_retrieve_string_initiate(command, db, string_tx, query_id)
        }
        Action::RetrieveStringSegment => handle_retrieve_string_segment(string_tx, query_id),
        Action::Print => handle_print(command),
        Action::PrintDatabase => handle_print_database(command, db),
    }
}

fn handle_store(command: &Command, db: &mut Database) -> Option<Reply> {
    if command.args.len() < 2 {
        warn!("missing arguments for STORE command, dropping command");
        return None;
    }

    let key = &command.args[0];
    let value = &command.args[1];

    if !key.as_bytes().first().is_some_and(u8::is_ascii_alphabetic) {
        warn!("record names should begin with a letter");
        return None;
    }

    match db.store(key, value.clone().into_bytes()) {
        Ok(()) => info!(%key, %value, "storing value"),
        Err(err) => warn!(%err, "failed to store record"),
    }

    None
}

fn handle_store_date(command: &Command, db: &mut Database) -> Option<Reply> {
    if command.args.is_empty() {
        warn!("no date key was passed to STORE_DATE command");
        return None;
    }

    let timestamp = Utc::now().timestamp();
    if let Err(err) = db.store(&command.args[0], timestamp.to_string().into_bytes()) {
        warn!(%err, "failed to store date record");
    }
    None
}

fn handle_retrieve(command: &Command, db: &Database, query_id: u32) -> Option<Reply> {
    let Some(key) = command.args.first() else {
        warn!("missing key for retrieve command");
        return None;
    };

    match db.retrieve(key) {
        Ok(Some(value)) => {
            let text = String::from_utf8_lossy(value);
            Some(Reply::new(query_id, QueryResult::RetrieveOk, text))
        }
        Ok(None) => {
            warn!(%key, "asked for a non-existent record");
            Some(Reply::new(query_id, QueryResult::RetrieveFail, "0"))
        }
        Err(err) => {
            warn!(%err, "failed to retrieve record");
            Some(Reply::new(query_id, QueryResult::RetrieveFail, "0"))
        }
    }
}

fn handle_retrieve_date(command: &Command, db: &Database, query_id: u32) -> Option<Reply> {
    let Some(key) = command.args.first() else {
        warn!("missing date key for RETRIEVE_DATE command");
        return None;
    };

    let stored = db.retrieve(key).ok().flatten();
    let Some(value) = stored else {
        warn!(%key, "asked for a non-existent date record");
        return Some(Reply::new(query_id, QueryResult::RetrieveFail, "0"));
    };

    let timestamp: i64 = match String::from_utf8_lossy(value).parse() {
        Ok(t) => t,
        Err(_) => 0,
    };

    let Some(date) = Local.timestamp_opt(timestamp, 0).single() else {
        return Some(Reply::new(query_id, QueryResult::RetrieveFail, "0"));
    };

    let encoded = date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32;
    Some(Reply::new(query_id, QueryResult::RetrieveOk, encoded.to_string()))
}

fn handle_retrieve_string_initiate(
    command: &Command,
    db: &Database,
    string_tx: &mut Option<StringTransmission>,
    query_id: u32,
) -> Option<Reply> {
    let Some(key) = command.args.first() else {
        warn!("missing record key for string retrieval, aborting operation");
        return None;
    };

    match db.retrieve(key) {
        Ok(Some(value)) => {
            info!(%key, "starting string transmission for record");
            if string_tx.is_some() {
                warn!("terminating active string transmission to start a new one");
            }

            let transmission = StringTransmission::new(value.to_vec());
            let queries_needed = transmission.queries_needed();
            *string_tx = Some(transmission);

            Some(Reply::new(
                query_id,
                QueryResult::RetrieveOk,
                queries_needed.to_string(),
            ))
        }
        _ => {
            warn!(%key, "asked for a non-existent string record");
            Some(Reply::new(query_id, QueryResult::RetrieveFail, "0"))
        }
    }
}

fn handle_retrieve_string_segment(
    string_tx: &mut Option<StringTransmission>,
    query_id: u32,
) -> Option<Reply> {
    let Some(st) = string_tx else {
        warn!("a string transmission is not open, failed to get segment");
        return Some(Reply::new(query_id, QueryResult::RetrieveFail, "0"));
    };

    let segment_length = STRING_SEGMENT_MAX_BYTES.min(st.chars_left);
    let segment = &st.value[st.offset..st.offset + segment_length];
    let package = encode_value_in_ascii(segment);

    st.offset += segment_length;
    st.chars_left -= segment_length;
    st.queries_needed -= 1;

    info!(package, "sending string segment");

    if st.queries_needed <= 0 {
        info!("closing string transmission");
        *string_tx = None;
    }

    Some(Reply::new(query_id, QueryResult::RetrieveOk, package.to_string()))
}

/// Base-1000 packing with a +100 bias per byte, so each byte always
/// occupies exactly three decimal digits.
fn encode_value_in_ascii(segment: &[u8]) -> i64 {
    let mut package: i64 = 0;
    let mut separator: i64 = 1;
    for &byte in segment.iter().rev() {
        package += (byte as i64 + STRING_SEGMENT_ASCII_BIAS) * separator;
        separator *= 1000;
    }
    package
}

fn handle_print(command: &Command) -> Option<Reply> {
    if let Some(message) = command.args.first() {
        info!("{message}");
    }
    None
}

fn handle_print_database(command: &Command, db: &Database) -> Option<Reply> {
    match command.args.first() {
        Some(map_name) => match db.find_map(map_name) {
            Some(entry) => {
                info!(map = entry.name(), records = entry.total_records(), "map entry");
                for record in entry.records() {
                    info!(key = %record.key, value_len = record.value.len(), "record");
                }
            }
            None => warn!(map = %map_name, "no such map entry to print"),
        },
        None => {
            info!(total_maps = db.total_maps(), total_records = db.total_records(), "database");
            for entry in db.entries() {
                info!(map = entry.name(), records = entry.total_records(), "map entry");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse;

    fn setup_db() -> Database {
        let mut db = Database::new();
        db.change_map("map01");
        db
    }

    #[test]
    fn store_requires_alphabetic_key() {
        let mut db = setup_db();
        let cmd = parse("STORE 1bad value").unwrap();
        assert!(dispatch(&cmd, &mut db, &mut None, 1).is_none());
        assert_eq!(db.retrieve("1bad").unwrap(), None);
    }

    #[test]
    fn store_then_retrieve_round_trip() {
        let mut db = setup_db();
        let store = parse("STORE foo bar").unwrap();
        dispatch(&store, &mut db, &mut None, 1);

        let retrieve = parse("RETRIEVE foo").unwrap();
        let reply = dispatch(&retrieve, &mut db, &mut None, 2).unwrap();
        assert_eq!(reply.build_command(), "set luk_d \"bar\"; set luk_qid \"2\"; set luk_qr \"0\"");
    }

    #[test]
    fn retrieve_missing_key_fails() {
        let mut db = setup_db();
        let retrieve = parse("RETRIEVE missing").unwrap();
        let reply = dispatch(&retrieve, &mut db, &mut None, 3).unwrap();
        assert_eq!(reply.build_command(), "set luk_d \"0\"; set luk_qid \"3\"; set luk_qr \"1\"");
    }

    #[test]
    fn string_transmission_chunks_value_and_closes() {
        let mut db = setup_db();
        let store = parse("STORE foo {hello world}").unwrap();
        dispatch(&store, &mut db, &mut None, 1);

        let mut string_tx = None;
        let initiate = parse("RETRIEVE_STRING_INITIATE foo").unwrap();
        let reply = dispatch(&initiate, &mut db, &mut string_tx, 2).unwrap();
        // "hello world" is 11 bytes -> ceil(11/3) = 4 segments.
        assert_eq!(reply.build_command(), "set luk_d \"4\"; set luk_qid \"2\"; set luk_qr \"0\"");
        assert!(string_tx.is_some());

        let segment = parse("RETRIEVE_STRING_SEGMENT").unwrap();
        for _ in 0..4 {
            let reply = dispatch(&segment, &mut db, &mut string_tx, 3).unwrap();
            assert_eq!(reply.build_command().contains("luk_qr \"0\""), true);
        }
        assert!(string_tx.is_none());
    }

    #[test]
    fn string_segment_without_active_transmission_fails() {
        let mut db = setup_db();
        let mut string_tx = None;
        let segment = parse("RETRIEVE_STRING_SEGMENT").unwrap();
        let reply = dispatch(&segment, &mut db, &mut string_tx, 1).unwrap();
        assert_eq!(reply.build_command(), "set luk_d \"0\"; set luk_qid \"1\"; set luk_qr \"1\"");
    }

    #[test]
    fn store_date_then_retrieve_date_round_trips_to_todays_date() {
        let mut db = setup_db();
        let store_date = parse("STORE_DATE today").unwrap();
        dispatch(&store_date, &mut db, &mut None, 1);

        let retrieve_date = parse("RETRIEVE_DATE today").unwrap();
        let reply = dispatch(&retrieve_date, &mut db, &mut None, 2).unwrap();
        assert!(reply.build_command().contains("luk_qr \"0\""));
    }

    #[test]
    fn print_and_print_database_never_reply() {
        let mut db = setup_db();
        let print = parse("PRINT hello").unwrap();
        assert!(dispatch(&print, &mut db, &mut None, 1).is_none());

        let print_db = parse("PRINT_DATABASE").unwrap();
        assert!(dispatch(&print_db, &mut db, &mut None, 2).is_none());
    }
}
