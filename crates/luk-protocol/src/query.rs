//! Query capsule parsing.
//!
//! Grounded on `original_source/src/query.c`. A capsule is server chat
//! output delimited on both ends by the `\x08` byte, a byte that a
//! player cannot inject. Inside the capsule: a case-insensitive `luk`
//! identifier, a separator, a strictly increasing decimal query ID (or
//! the debug ID `0`), another separator, then the command cargo.

use luk_core::wire::{QUERY_DELIMITER, QUERY_ID_MAX_DIGITS, QUERY_PREFIX};
use tracing::{debug, warn};

/// Tracks the last accepted query ID so stale/duplicate queries can be
/// rejected. Owned by the caller's session context rather than a
/// process-wide global.
#[derive(Debug, Default)]
pub struct QueryState {
    last_id: u32,
}

impl QueryState {
    pub fn new() -> Self {
        Self { last_id: 0 }
    }

    pub fn last_id(&self) -> u32 {
        self.last_id
    }

    /// Called when the current map changes: query IDs start fresh per map.
    pub fn reset(&mut self) {
        self.last_id = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub id: u32,
    pub cargo: String,
}

/// A capsule is valid if it's at least as long as the prefix and is
/// wrapped on both ends by the delimiter byte.
pub fn is_valid_capsule(capsule: &[u8]) -> bool {
    if capsule.len() < QUERY_PREFIX.len() {
        return false;
    }
    capsule.first() == Some(&QUERY_DELIMITER) && capsule.last() == Some(&QUERY_DELIMITER)
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.trim().chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                out.push(' ');
            }
            prev_was_space = true;
        } else {
            out.push(ch);
            prev_was_space = false;
        }
    }
    out
}

/// Strip the capsule delimiters, collapse internal whitespace, check the
/// `luk` prefix, parse the query ID and apply the ordering policy, and
/// split off the remaining cargo. Returns `Ok(None)` for a capsule that
/// fails validation for a reason that isn't itself an error (bad prefix,
/// malformed ID, stale ID) - those are notices, not protocol errors.
pub fn unpack(capsule: &[u8], state: &mut QueryState) -> Option<Query> {
    if !is_valid_capsule(capsule) {
        return None;
    }

    let inner = &capsule[1..capsule.len() - 1];
    let inner = String::from_utf8_lossy(inner);
    let cleaned = collapse_whitespace(&inner);

    let mut chars = cleaned.char_indices();
    let prefix_matches = cleaned
        .get(..QUERY_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(QUERY_PREFIX));
    if !prefix_matches {
        return None;
    }
    for _ in 0..QUERY_PREFIX.len() {
        chars.next();
    }

    // Skip the separator between the prefix and the query ID.
    let (sep_pos, sep_char) = chars.next()?;
    let start = sep_pos + sep_char.len_utf8();

    let bytes = cleaned.as_bytes();
    let mut digits = String::new();
    let mut cursor = start;
    let mut invalid = false;

    // Mirrors a do-while: a digit (or lack of one) is always consumed at
    // the current position first, then the loop continues only while the
    // new current byte is neither whitespace nor already invalid.
    loop {
        match bytes.get(cursor) {
            Some(&b) if b.is_ascii_digit() && digits.len() < QUERY_ID_MAX_DIGITS => {
                digits.push(b as char);
                cursor += 1;
            }
            _ => invalid = true,
        }

        let at_whitespace = bytes.get(cursor).is_none_or(|&b| b.is_ascii_whitespace());
        if invalid || at_whitespace {
            break;
        }
    }

    if invalid || digits.is_empty() {
        debug!("invalid query ID given in received query");
        return None;
    }

    let new_id: u32 = digits.parse().ok()?;
    if !(new_id > state.last_id || new_id == 0) {
        warn!(new_id, old_id = state.last_id, "stale query ID received");
        return None;
    }

    // Skip the separator after the ID.
    let cargo_start = (cursor + 1).min(bytes.len());
    let cargo = cleaned.get(cargo_start..).unwrap_or("").to_string();

    state.last_id = new_id;
    Some(Query { id: new_id, cargo })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capsule(inner: &str) -> Vec<u8> {
        let mut v = vec![QUERY_DELIMITER];
        v.extend_from_slice(inner.as_bytes());
        v.push(QUERY_DELIMITER);
        v
    }

    #[test]
    fn accepts_well_formed_capsule() {
        let mut state = QueryState::new();
        let q = unpack(&capsule("luk 1 STORE foo bar"), &mut state).unwrap();
        assert_eq!(q.id, 1);
        assert_eq!(q.cargo, "STORE foo bar");
    }

    #[test]
    fn prefix_is_case_insensitive() {
        let mut state = QueryState::new();
        let q = unpack(&capsule("LuK 1 PRINT hi"), &mut state).unwrap();
        assert_eq!(q.id, 1);
    }

    #[test]
    fn rejects_capsule_missing_trailing_delimiter() {
        let mut bad = capsule("luk 1 STORE foo bar");
        bad.pop();
        assert!(!is_valid_capsule(&bad));
    }

    #[test]
    fn rejects_out_of_order_id() {
        let mut state = QueryState::new();
        assert!(unpack(&capsule("luk 5 PRINT a"), &mut state).is_some());
        assert!(unpack(&capsule("luk 3 PRINT b"), &mut state).is_none());
        assert_eq!(state.last_id(), 5);
    }

    #[test]
    fn debug_id_zero_is_always_accepted() {
        let mut state = QueryState::new();
        unpack(&capsule("luk 5 PRINT a"), &mut state).unwrap();
        assert!(unpack(&capsule("luk 0 PRINT debug"), &mut state).is_some());
    }

    #[test]
    fn reset_allows_ids_to_restart() {
        let mut state = QueryState::new();
        unpack(&capsule("luk 5 PRINT a"), &mut state).unwrap();
        state.reset();
        assert!(unpack(&capsule("luk 1 PRINT b"), &mut state).is_some());
    }

    #[test]
    fn collapses_repeated_whitespace() {
        let mut state = QueryState::new();
        let q = unpack(&capsule("luk   7    STORE  foo   bar"), &mut state).unwrap();
        assert_eq!(q.cargo, "STORE foo bar");
    }
}
