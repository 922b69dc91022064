//! Rule-script location and loading.
//!
//! The script path comes from `--config` when given, otherwise from
//! `$XDG_CONFIG_HOME/keyswift/config.rhai`, falling back to
//! `~/.config/keyswift/config.rhai`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub const SCRIPT_FILE: &str = "config.rhai";

/// Resolves the script path from the flag and the environment.
pub fn resolve_script_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        config_dir_from(
            std::env::var_os("XDG_CONFIG_HOME"),
            std::env::var_os("HOME"),
        )
        .map(|dir| dir.join("keyswift").join(SCRIPT_FILE))
    })
}

/// Picks the configuration base directory from environment values.
///
/// Extracted so the precedence rules can be unit-tested without mutating
/// process environment variables.
fn config_dir_from(xdg: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg));
    }
    home.filter(|v| !v.is_empty()).map(|h| {
        let mut p = PathBuf::from(h);
        p.push(".config");
        p
    })
}

/// Reads the whole script. Unreadable scripts are fatal at startup.
pub fn read_script(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::ScriptRead {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins() {
        let path = resolve_script_path(Some(PathBuf::from("/tmp/rules.rhai")));
        assert_eq!(path, Some(PathBuf::from("/tmp/rules.rhai")));
    }

    #[test]
    fn xdg_config_home_takes_precedence() {
        let dir = config_dir_from(
            Some(OsString::from("/custom/config")),
            Some(OsString::from("/home/user")),
        );
        assert_eq!(dir, Some(PathBuf::from("/custom/config")));
    }

    #[test]
    fn home_fallback_appends_dot_config() {
        let dir = config_dir_from(None, Some(OsString::from("/home/user")));
        assert_eq!(dir, Some(PathBuf::from("/home/user/.config")));
    }

    #[test]
    fn empty_xdg_value_is_treated_as_unset() {
        let dir = config_dir_from(Some(OsString::new()), Some(OsString::from("/home/user")));
        assert_eq!(dir, Some(PathBuf::from("/home/user/.config")));
    }

    #[test]
    fn no_environment_means_no_path() {
        assert_eq!(config_dir_from(None, None), None);
    }

    #[test]
    fn read_script_round_trips_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCRIPT_FILE);
        std::fs::write(&path, "// rules\n").unwrap();
        assert_eq!(read_script(&path).unwrap(), "// rules\n");
    }

    #[test]
    fn missing_script_reports_the_path() {
        let err = read_script(Path::new("/nonexistent/config.rhai")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.rhai"), "{err}");
    }
}
