//! Parsers for ESS (`payglobal.config`), WFE (`tenants.config`) and IIS
//! `web.config` files.
//!
//! A missing file, a malformed file and a well-formed file with absent fields
//! are three distinct outcomes: the first two are [`ConfigError`] variants,
//! the third is a record whose fields are individually `None`.

mod connection;
mod ess;
mod web;
mod wfe;
pub mod xml;

pub use connection::{parse_connection_string, sql_endpoint, ConnectionParts, SqlEndpoint, DEFAULT_SQL_PORT};
pub use ess::{parse_ess_config, parse_ess_str};
pub use web::{inspect_web_config, inspect_web_str, WebConfigInfo};
pub use wfe::{parse_wfe_config, parse_wfe_str};

use readiness_core::CheckError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ESS_CONFIG_FILE: &str = "payglobal.config";
pub const WFE_CONFIG_FILE: &str = "tenants.config";
pub const WEB_CONFIG_FILE: &str = "web.config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }
}

impl From<ConfigError> for CheckError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NotFound { .. } => CheckError::NotFound(e.to_string()),
            ConfigError::Parse { .. } => CheckError::Parse(e.to_string()),
            ConfigError::Io { ref source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
                CheckError::PermissionDenied(e.to_string())
            }
            ConfigError::Io { .. } => CheckError::Other(e.into()),
        }
    }
}

/// Read a configuration file as text, mapping a missing file to
/// [`ConfigError::NotFound`].
pub fn read_config(path: &Path) -> Result<String, ConfigError> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ConfigError::NotFound { path: path.to_path_buf() }),
        Err(source) => Err(ConfigError::Io { path: path.to_path_buf(), source }),
    }
}

/// Locate `file_name` directly under `dir`, ignoring case. IIS deployments
/// copied from Windows keep arbitrary casing (`PayGlobal.config`).
pub fn find_config_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let direct = dir.join(file_name);
    if direct.is_file() {
        return Some(direct);
    }
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.eq_ignore_ascii_case(file_name))
                    .unwrap_or(false)
        })
}

/// Path where `file_name` is expected: the located file, or the canonical
/// name under `dir` when absent (used in not-found messages).
pub fn config_path(dir: &Path, file_name: &str) -> PathBuf {
    find_config_file(dir, file_name).unwrap_or_else(|| dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(&dir.path().join(ESS_CONFIG_FILE)).unwrap_err();
        assert!(err.is_not_found());
        let ce: CheckError = err.into();
        assert_eq!(ce.kind(), "not-found");
    }

    #[test]
    fn finds_config_ignoring_case() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("PayGlobal.Config"), "<x/>").unwrap();
        let found = find_config_file(dir.path(), ESS_CONFIG_FILE).unwrap();
        assert!(found.ends_with("PayGlobal.Config"));
        assert!(find_config_file(dir.path(), WFE_CONFIG_FILE).is_none());
        assert_eq!(config_path(dir.path(), WFE_CONFIG_FILE), dir.path().join(WFE_CONFIG_FILE));
    }

    #[test]
    fn parse_error_converts_to_parse_kind() {
        let e = ConfigError::Parse { path: PathBuf::from("t.config"), message: "boom".into() };
        assert!(e.to_string().contains("boom"));
        let ce: CheckError = e.into();
        assert_eq!(ce.kind(), "parse");
    }
}
