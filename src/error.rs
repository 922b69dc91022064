//! Crate-wide error type.
//!
//! Startup failures (script, output device, zero usable keyboards) are fatal
//! and bubble up to `main` via `Result`. Everything that happens after the
//! device loops start is logged and contained instead -- no error crosses a
//! loop boundary.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A key name in a script rule or `send_keys` call did not resolve.
    #[error("unknown key name {0:?}")]
    UnknownKey(String),

    /// Startup configuration problem that is not a script read/compile
    /// failure (e.g. no home directory to resolve the default script path).
    #[error("configuration: {0}")]
    Config(String),

    /// The rule script could not be read from disk.
    #[error("failed to read script {path}: {source}")]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The rule script failed to compile. Fatal at startup.
    #[error("script compile error: {0}")]
    ScriptCompile(String),

    /// An input device could not be opened or exclusively grabbed.
    #[error("device {path}: {source}")]
    Device {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No device matched the `--keyboards` patterns (or all matches failed
    /// to grab).
    #[error("no usable keyboard matched {patterns:?}")]
    NoKeyboards { patterns: Vec<String> },

    /// The virtual output device could not be created.
    #[error("failed to create virtual output: {0}")]
    Output(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
