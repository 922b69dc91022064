//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "keyswift", version, about = "Script-driven keyboard remapper for Linux")]
pub struct Cli {
    /// Comma-separated device-name substrings; every matching device is
    /// grabbed exclusively.
    #[arg(long, required = true, value_delimiter = ',', value_name = "NAMES")]
    pub keyboards: Vec<String>,

    /// Rule script path (default: $XDG_CONFIG_HOME/keyswift/config.rhai).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Display name of the virtual output device; also excluded from
    /// keyboard matching.
    #[arg(long, default_value = "keyswift", value_name = "NAME")]
    pub output_device_name: String,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}
