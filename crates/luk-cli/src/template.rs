//! Blank configuration file template, generated by `-g`.
//!
//! Grounded on `original_source/src/configuration_file_template.h`.

use luk_core::{LukError, Result};
use std::path::Path;
use tracing::info;

pub const TEMPLATE: &str = concat!(
    "# The IP address of the RCON server. You can use the special value\n",
    "# \"localhost\" to refer to the current machine as the host.\n",
    "server_address = \"localhost\"\n",
    "# The port number of the server.\n",
    "server_port = \"10666\"\n",
    "# Enter the RCON password that the server uses for logging in.\n",
    "server_password = \"\"\n",
    "\n",
    "# Enter a file path to where you would like to have the database file\n",
    "# stored at. The database file stores data that the RCON server passes to it.\n",
    "database_path = \"./database.lukd\"\n",
);

/// Write a blank config to `path`, refusing to overwrite an existing file
///.
pub fn generate(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(LukError::Configuration(format!(
            "file already exists: {}",
            path.display()
        )));
    }

    std::fs::write(path, TEMPLATE)?;
    info!(path = %path.display(), "generated a blank configuration file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_template_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("luk.conf");
        generate(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("server_address = \"localhost\""));
    }

    #[test]
    fn refuses_to_overwrite_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("luk.conf");
        std::fs::write(&path, "existing").unwrap();

        let err = generate(&path).unwrap_err();
        assert!(matches!(err, LukError::Configuration(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing");
    }
}
