//! Configuration file bridge.
//!
//! Grounded on `original_source/lib/conf/conf_scanner.c` and
//! `original_source/src/config.c`: a small hand-rolled scanner (not a
//! generic INI crate — the bespoke quoting/comment rules would change
//! subtly under a general-purpose parser) over `key = "value"` lines,
//! `#` comments running to end of line, tokenized exactly like the
//! reference scanner's four states.

use luk_core::{LukError, Result};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub server_port: String,
    pub server_password: String,
    pub database_path: String,
    pub database_save_on_store: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Keyword(&'a str),
    Assign,
    String(&'a str),
}

fn scan(contents: &str) -> Result<Vec<Token<'_>>> {
    let bytes = contents.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let b = bytes[pos];
        if b.is_ascii_whitespace() {
            pos += 1;
        } else if b == b'#' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
        } else if b == b'=' {
            tokens.push(Token::Assign);
            pos += 1;
        } else if b == b'"' {
            let start = pos + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end] != b'"' {
                end += 1;
            }
            if end >= bytes.len() {
                return Err(LukError::Configuration(
                    "unterminated string in configuration file".to_string(),
                ));
            }
            tokens.push(Token::String(&contents[start..end]));
            pos = end + 1;
        } else if b.is_ascii_alphabetic() {
            let start = pos;
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push(Token::Keyword(&contents[start..pos]));
        } else {
            return Err(LukError::Configuration(format!(
                "invalid character in configuration file: '{}'",
                b as char
            )));
        }
    }

    Ok(tokens)
}

fn parse_pairs<'a>(tokens: &[Token<'a>]) -> Result<Vec<(&'a str, &'a str)>> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match (tokens.get(i), tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(Token::Keyword(key)), Some(Token::Assign), Some(Token::String(value))) => {
                pairs.push((*key, *value));
                i += 3;
            }
            _ => {
                return Err(LukError::Configuration(
                    "malformed key/value pair in configuration file".to_string(),
                ));
            }
        }
    }
    Ok(pairs)
}

fn get<'a>(pairs: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|&&(k, _)| k == key).map(|&(_, v)| v)
}

fn get_required(pairs: &[(&str, &str)], key: &str) -> Result<String> {
    get(pairs, key)
        .map(str::to_string)
        .ok_or_else(|| LukError::Configuration(format!("missing required parameter: {key}")))
}

/// Load and validate the configuration file at `path`.
pub fn load(path: &Path) -> Result<Config> {
    info!(path = %path.display(), "reading configuration file");
    let contents = std::fs::read_to_string(path)?;
    let tokens = scan(&contents)?;
    let pairs = parse_pairs(&tokens)?;

    let config = Config {
        server_address: get_required(&pairs, "server_address")?,
        server_port: get_required(&pairs, "server_port")?,
        server_password: get_required(&pairs, "server_password")?,
        database_path: get_required(&pairs, "database_path")?,
        database_save_on_store: get(&pairs, "database_save_on_store") == Some("true"),
    };

    info!("configuration file successfully read");
    Ok(config)
}

impl Config {
    /// Resolve `"localhost"` to its loopback numeric form, matching the
    /// reference's `LukInitServer` special-casing.
    pub fn resolved_server_address(&self) -> &str {
        if self.server_address == "localhost" {
            "127.0.0.1"
        } else {
            &self.server_address
        }
    }

    pub fn display(&self) {
        println!("server_address -> {}", self.server_address);
        println!("server_port -> {}", self.server_port);
        println!("server_password -> {}", self.server_password);
        println!("database_path -> {}", self.database_path);
        println!(
            "database_save_on_store -> {}",
            self.database_save_on_store
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_conf(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("luk.conf");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn parses_minimal_config() {
        let (_dir, path) = write_conf(
            "server_address = \"localhost\"\n\
             server_port = \"10666\"\n\
             server_password = \"hunter2\"\n\
             database_path = \"./database.lukd\"\n",
        );
        let config = load(&path).unwrap();
        assert_eq!(config.server_address, "localhost");
        assert_eq!(config.resolved_server_address(), "127.0.0.1");
        assert!(!config.database_save_on_store);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let (_dir, path) = write_conf(
            "# this is a comment\n\
             server_address = \"localhost\"\n\
             \n\
             server_port = \"10666\" # trailing comment\n\
             server_password = \"p\"\n\
             database_path = \"d\"\n\
             database_save_on_store = \"true\"\n",
        );
        let config = load(&path).unwrap();
        assert!(config.database_save_on_store);
    }

    #[test]
    fn missing_required_parameter_is_an_error() {
        let (_dir, path) = write_conf("server_address = \"localhost\"\n");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, LukError::Configuration(_)));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_dir, path) = write_conf("server_address = \"localhost\n");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, LukError::Configuration(_)));
    }
}
