use crate::connection::parse_connection_string;
use crate::xml::{parse_document, Element};
use crate::{read_config, ConfigError};
use readiness_core::EssConfig;
use std::path::Path;
use tracing::debug;

pub fn parse_ess_config(path: &Path) -> Result<EssConfig, ConfigError> {
    let text = read_config(path)?;
    let cfg = parse_ess_str(&text).map_err(|message| ConfigError::Parse { path: path.to_path_buf(), message })?;
    debug!(path = %path.display(), server = ?cfg.database_server, database = ?cfg.database_name, "parsed ESS config");
    Ok(cfg)
}

/// Parse `payglobal.config` content. Only XML errors fail; a document without
/// a `<connection type="sql">` element yields an all-`None` record.
pub fn parse_ess_str(xml: &str) -> Result<EssConfig, String> {
    let root = parse_document(xml)?;
    let conn = root
        .descendants()
        .into_iter()
        .find(|e| e.is("connection") && e.attr("type").map(|t| t.trim().eq_ignore_ascii_case("sql")).unwrap_or(false));

    let connection_string = conn.and_then(connection_text);
    let parts = connection_string.as_deref().map(parse_connection_string).unwrap_or_default();
    Ok(EssConfig { connection_string, database_server: parts.server, database_name: parts.database })
}

fn connection_text(e: &Element) -> Option<String> {
    let text = e.text.trim();
    if !text.is_empty() {
        return Some(text.to_string());
    }
    e.value_of(&["connectionString", "value"])
}
