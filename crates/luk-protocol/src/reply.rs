//! Reply command assembly.
//!
//! Grounded on `original_source/src/reply.c`/`reply.h`: a reply sets up to
//! ten bytes of data, a query ID, and a result code, then renders them
//! into a single `set luk_d "..."; set luk_qid "..."; set luk_qr "..."`
//! console command. A reply is only meaningful — and only ever sent —
//! when its data is non-empty.

use luk_core::wire::MAX_REPLY_DATA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    RetrieveOk = 0,
    RetrieveFail = 1,
}

#[derive(Debug, Clone)]
pub struct Reply {
    query_id: u32,
    result: QueryResult,
    data: String,
}

impl Reply {
    pub fn new(query_id: u32, result: QueryResult, data: impl AsRef<str>) -> Self {
        Self {
            query_id,
            result,
            data: truncate_to_max_bytes(data.as_ref(), MAX_REPLY_DATA),
        }
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    #[cfg(test)]
    fn data(&self) -> &str {
        &self.data
    }

    /// Render the `set luk_d ...` console command this reply becomes on
    /// the wire. Matches `REPLY_COMMAND_LAYOUT` exactly.
    pub fn build_command(&self) -> String {
        format!(
            "set luk_d \"{}\"; set luk_qid \"{}\"; set luk_qr \"{}\"",
            self.data, self.query_id, self.result as i32
        )
    }
}

fn truncate_to_max_bytes(s: &str, max: usize) -> String {
    let mut out = String::new();
    for ch in s.chars() {
        if out.len() + ch.len_utf8() > max {
            break;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_command_layout() {
        let reply = Reply::new(7, QueryResult::RetrieveOk, "42");
        assert_eq!(
            reply.build_command(),
            "set luk_d \"42\"; set luk_qid \"7\"; set luk_qr \"0\""
        );
    }

    #[test]
    fn fail_result_renders_as_one() {
        let reply = Reply::new(1, QueryResult::RetrieveFail, "0");
        assert_eq!(
            reply.build_command(),
            "set luk_d \"0\"; set luk_qid \"1\"; set luk_qr \"1\""
        );
    }

    #[test]
    fn data_is_truncated_to_ten_bytes() {
        let reply = Reply::new(1, QueryResult::RetrieveOk, "this value is far too long");
        assert_eq!(reply.data_size(), MAX_REPLY_DATA);
        assert_eq!(reply.data(), "this value");
    }
}
