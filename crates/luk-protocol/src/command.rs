//! Command cargo tokenizer and the closed action table.
//!
//! Grounded on `original_source/src/command.c`: the action token is the
//! leading run of letters/underscores, looked up case-insensitively
//! against a fixed table; arguments follow as whitespace-separated words
//! or `{brace-quoted}` runs, capped at five.

use luk_core::wire::COMMAND_MAX_ARGS;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Store,
    StoreDate,
    Retrieve,
    RetrieveDate,
    RetrieveStringInitiate,
    RetrieveStringSegment,
    Print,
    PrintDatabase,
}

impl Action {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "STORE" => Some(Action::Store),
            "STORE_DATE" => Some(Action::StoreDate),
            "RETRIEVE" => Some(Action::Retrieve),
            "RETRIEVE_DATE" => Some(Action::RetrieveDate),
            "RETRIEVE_STRING_INITIATE" => Some(Action::RetrieveStringInitiate),
            "RETRIEVE_STRING_SEGMENT" => Some(Action::RetrieveStringSegment),
            "PRINT_DATABASE" => Some(Action::PrintDatabase),
            "PRINT" => Some(Action::Print),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub args: Vec<String>,
}

/// Parse a command out of query cargo. Returns `None` for an unrecognized
/// action, which the caller should treat as a silently dropped command,
/// not a protocol error.
pub fn parse(cargo: &str) -> Option<Command> {
    let action_end = cargo
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '_'))
        .unwrap_or(cargo.len());
    let action_name = &cargo[..action_end];
    let action = Action::from_name(action_name)?;

    let args = parse_arguments(&cargo[action_end..], action_name);
    Some(Command { action, args })
}

fn parse_arguments(rest: &str, action_name: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = rest.char_indices().peekable();

    while let Some(&(idx, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if args.len() >= COMMAND_MAX_ARGS {
            warn!(
                max = COMMAND_MAX_ARGS,
                action = action_name,
                "maximum arguments reached for command, skipping the rest"
            );
            break;
        }

        if ch == '{' {
            chars.next();
            let start = idx + ch.len_utf8();
            let mut end = rest.len();
            let mut closed = false;
            while let Some(&(j, c)) = chars.peek() {
                if c == '}' {
                    end = j;
                    closed = true;
                    chars.next();
                    break;
                }
                chars.next();
            }
            if !closed {
                warn!(action = action_name, "brace argument was not closed properly");
                end = rest.len();
            }
            args.push(rest[start..end].to_string());
        } else {
            let start = idx;
            let mut end = rest.len();
            while let Some(&(j, c)) = chars.peek() {
                if c.is_whitespace() {
                    end = j;
                    break;
                }
                chars.next();
            }
            args.push(rest[start..end].to_string());
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_and_plain_args() {
        let cmd = parse("STORE foo bar").unwrap();
        assert_eq!(cmd.action, Action::Store);
        assert_eq!(cmd.args, vec!["foo", "bar"]);
    }

    #[test]
    fn action_lookup_is_case_insensitive() {
        let cmd = parse("store foo bar").unwrap();
        assert_eq!(cmd.action, Action::Store);
    }

    #[test]
    fn parses_brace_quoted_argument_with_embedded_spaces() {
        let cmd = parse("STORE foo {bar baz}").unwrap();
        assert_eq!(cmd.args, vec!["foo", "bar baz"]);
    }

    #[test]
    fn unterminated_brace_consumes_to_end() {
        let cmd = parse("STORE foo {bar baz").unwrap();
        assert_eq!(cmd.args, vec!["foo", "bar baz"]);
    }

    #[test]
    fn caps_at_five_arguments() {
        let cmd = parse("PRINT a b c d e f").unwrap();
        assert_eq!(cmd.args.len(), 5);
        assert_eq!(cmd.args, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn unknown_action_returns_none() {
        assert!(parse("NONSENSE a b").is_none());
    }

    #[test]
    fn action_with_no_arguments() {
        let cmd = parse("PRINT_DATABASE").unwrap();
        assert_eq!(cmd.action, Action::PrintDatabase);
        assert!(cmd.args.is_empty());
    }
}
