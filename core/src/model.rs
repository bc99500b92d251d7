use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InstanceType {
    #[serde(rename = "ESS")]
    Ess,
    #[serde(rename = "WFE")]
    Wfe,
    #[default]
    Unknown,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Ess => "ESS",
            InstanceType::Wfe => "WFE",
            InstanceType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection details parsed from an ESS `payglobal.config`.
/// Fields are `None` when the file lacks them; absence is never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssConfig {
    pub connection_string: Option<String>,
    pub database_server: Option<String>,
    pub database_name: Option<String>,
}

/// One `<tenant>` entry of a WFE `tenants.config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub connection_string: Option<String>,
    pub database_server: Option<String>,
    pub database_name: Option<String>,
    pub client_url: Option<String>,
    pub workflow_engine_path: Option<String>,
    pub workflow_engine_physical_path: Option<String>,
    pub from_email_address: Option<String>,
}

/// One IIS application that may be an ESS or WFE deployment.
///
/// `application_path` always starts with `/` and is unique within `site_name`.
/// Database and tenant fields are filled from the parsed configuration file
/// when one could be read; a missing file leaves them empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub site_name: String,
    pub application_path: String,
    pub application_pool: String,
    pub physical_path: PathBuf,
    pub instance_type: InstanceType,
    pub alias: String,
    pub ess_site_url: Option<String>,
    pub connection_string: Option<String>,
    pub database_server: Option<String>,
    pub database_name: Option<String>,
    pub tenant_id: Option<String>,
    pub tenants: Vec<TenantConfig>,
}

impl Instance {
    /// Build an unclassified candidate. The alias is the last segment of the
    /// application path, or the site name for a site root.
    pub fn candidate(
        site_name: impl Into<String>,
        application_path: impl Into<String>,
        application_pool: impl Into<String>,
        physical_path: impl Into<PathBuf>,
    ) -> Self {
        let site_name = site_name.into();
        let mut application_path = application_path.into();
        if !application_path.starts_with('/') {
            application_path.insert(0, '/');
        }
        let alias = alias_for(&site_name, &application_path);
        Instance {
            site_name,
            application_path,
            application_pool: application_pool.into(),
            physical_path: physical_path.into(),
            alias,
            ..Default::default()
        }
    }

    /// Identifier used as the prefix of per-instance check names.
    pub fn id(&self) -> String {
        if self.application_path == "/" {
            self.site_name.clone()
        } else {
            format!("{}{}", self.site_name, self.application_path)
        }
    }

    /// Key under which IIS guarantees uniqueness.
    pub fn key(&self) -> (String, String) {
        (self.site_name.clone(), self.application_path.to_ascii_lowercase())
    }

    pub fn apply_ess_config(&mut self, cfg: EssConfig) {
        self.connection_string = cfg.connection_string;
        self.database_server = cfg.database_server;
        self.database_name = cfg.database_name;
    }

    pub fn apply_tenants(&mut self, tenants: Vec<TenantConfig>) {
        if let Some(first) = tenants.first() {
            self.tenant_id = Some(first.tenant_id.clone());
            self.database_server = first.database_server.clone();
            self.database_name = first.database_name.clone();
            self.connection_string = first.connection_string.clone();
        }
        self.tenants = tenants;
    }
}

fn alias_for(site_name: &str, application_path: &str) -> String {
    application_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| site_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_is_last_segment() {
        let i = Instance::candidate("Default Web Site", "/HR/ESS", "EssPool", "C:\\inetpub\\ess");
        assert_eq!(i.alias, "ESS");
        assert_eq!(i.id(), "Default Web Site/HR/ESS");
        assert_eq!(i.instance_type, InstanceType::Unknown);
    }

    #[test]
    fn root_alias_falls_back_to_site() {
        let i = Instance::candidate("Payroll", "/", "DefaultAppPool", "C:\\inetpub\\wwwroot");
        assert_eq!(i.alias, "Payroll");
        assert_eq!(i.id(), "Payroll");
    }

    #[test]
    fn path_is_normalized_with_leading_slash() {
        let i = Instance::candidate("Site", "WFE", "", "");
        assert_eq!(i.application_path, "/WFE");
    }

    #[test]
    fn tenants_populate_first_entry_fields() {
        let mut i = Instance::candidate("Site", "/WFE", "", "");
        i.apply_tenants(vec![
            TenantConfig { tenant_id: "T1".into(), database_server: Some("SQL02".into()), ..Default::default() },
            TenantConfig { tenant_id: "T2".into(), ..Default::default() },
        ]);
        assert_eq!(i.tenant_id.as_deref(), Some("T1"));
        assert_eq!(i.database_server.as_deref(), Some("SQL02"));
        assert_eq!(i.tenants.len(), 2);
    }

    #[test]
    fn instance_type_serializes_as_label() {
        let s = serde_json::to_string(&InstanceType::Wfe).unwrap();
        assert_eq!(s, "\"WFE\"");
    }
}
