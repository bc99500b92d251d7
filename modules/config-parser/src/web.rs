use crate::xml::parse_document;
use crate::{read_config, ConfigError};
use serde::Serialize;
use std::path::Path;

/// What the readiness checks need from an application's `web.config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebConfigInfo {
    /// Sections protected by a configuration provider, in document order.
    pub encrypted_sections: Vec<String>,
    pub single_sign_on: bool,
    /// `<system.web><authentication mode=".."/>`, when present.
    pub authentication_mode: Option<String>,
}

impl WebConfigInfo {
    pub fn is_encrypted(&self) -> bool {
        !self.encrypted_sections.is_empty()
    }

    /// Single sign-on combined with encrypted sections must be decrypted
    /// before the upgrade can rewrite the file.
    pub fn requires_decryption(&self) -> bool {
        self.single_sign_on && self.is_encrypted()
    }
}

pub fn inspect_web_config(path: &Path) -> Result<WebConfigInfo, ConfigError> {
    let text = read_config(path)?;
    inspect_web_str(&text).map_err(|message| ConfigError::Parse { path: path.to_path_buf(), message })
}

pub fn inspect_web_str(xml: &str) -> Result<WebConfigInfo, String> {
    let root = parse_document(xml)?;
    let mut info = WebConfigInfo::default();

    for e in root.descendants() {
        let protected = e.attr("configProtectionProvider").is_some() || e.child("EncryptedData").is_some();
        if protected && !info.encrypted_sections.iter().any(|s| s.eq_ignore_ascii_case(&e.name)) {
            info.encrypted_sections.push(e.name.clone());
        }
        if e.is("authentication") {
            if let Some(mode) = e.attr("mode") {
                info.authentication_mode = Some(mode.to_string());
            }
        }
        if e.is("add") {
            if let (Some(key), Some(value)) = (e.attr("key"), e.attr("value")) {
                if is_sso_setting(key, value) {
                    info.single_sign_on = true;
                }
            }
        }
    }
    Ok(info)
}

fn is_sso_setting(key: &str, value: &str) -> bool {
    let k = key.to_ascii_lowercase();
    let v = value.trim().to_ascii_lowercase();
    if k.contains("authenticationmode") || k.contains("authmode") || k.contains("logintype") {
        return v.replace([' ', '-', '_'], "").contains("singlesignon") || v == "sso";
    }
    if k.contains("singlesignon") || k == "sso" || k.ends_with(".sso") {
        return matches!(v.as_str(), "true" | "1" | "yes" | "enabled" | "on");
    }
    false
}
