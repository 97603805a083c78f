//! Command-line flags.
//!
//! Grounded on `original_source/src/luk.c`'s `PROGA_FindArg` usage: `-h`
//! help, `-g` generate a blank config, `-c <path>` config path override,
//! `-p` view loaded parameters, `-s` skip mode, `-d <map>` delete a map
//! entry then exit.

use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE_PATH: &str = "./luk.conf";

#[derive(Debug, Parser)]
#[command(
    name = "luk",
    about = "luk is a permanent data storage environment for Skulltag.",
    after_help = "To quit luk when running, press Ctrl+C\n\n\
luk was developed by Positron with help from Aiur850, Jroc, and Frank."
)]
pub struct Cli {
    /// Specify path to a configuration file.
    #[arg(short = 'c', value_name = "path_to_file")]
    pub config_path: Option<PathBuf>,

    /// Deletes data of <map_lump> from database.
    #[arg(short = 'd', value_name = "map_lump")]
    pub delete_map: Option<String>,

    /// Generate a blank configuration file in the present directory.
    #[arg(short = 'g')]
    pub generate_config: bool,

    /// View loaded configuration parameters.
    #[arg(short = 'p')]
    pub view_params: bool,

    /// Skip mode: skip loading and saving of the database file.
    #[arg(short = 's')]
    pub skip_mode: bool,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE_PATH))
    }
}
