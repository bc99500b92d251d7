use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteRecord {
    pub name: String,
    pub physical_path: PathBuf,
    pub application_pool: String,
    pub state: Option<String>,
    /// `serverAutoStart`; a start-up preference, not the runtime state.
    pub auto_start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRecord {
    pub path: String,
    pub physical_path: PathBuf,
    pub application_pool: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppPoolRecord {
    pub name: String,
    /// Runtime state ("Started", "Stopped") when the source knows it.
    pub state: Option<String>,
    pub auto_start: bool,
    pub runtime_version: Option<String>,
}

impl AppPoolRecord {
    pub fn is_running(&self) -> Option<bool> {
        self.state.as_deref().map(|s| s.eq_ignore_ascii_case("started"))
    }
}

/// Read-only view of the IIS configuration.
///
/// Implementations return empty lists when IIS is not installed rather than
/// failing; `is_available` tells the two cases apart.
pub trait IisQuery {
    fn is_available(&self) -> bool;
    /// Why an installed IIS configuration cannot be read, if it cannot.
    fn load_error(&self) -> Option<String> {
        None
    }
    fn version(&self) -> Option<String> {
        None
    }
    fn list_sites(&self) -> Result<Vec<SiteRecord>>;
    /// Non-root applications of a site, in configuration order.
    fn list_applications(&self, site_name: &str) -> Result<Vec<ApplicationRecord>>;
    fn list_app_pools(&self) -> Result<Vec<AppPoolRecord>>;
}

/// IIS configuration held in memory. Used by tests and by callers that
/// already have the data from another source.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIis {
    pub available: bool,
    pub version: Option<String>,
    pub sites: Vec<SiteRecord>,
    pub applications: Vec<(String, ApplicationRecord)>,
    pub app_pools: Vec<AppPoolRecord>,
    /// Sites whose application listing fails, as if access were denied.
    pub failing_sites: Vec<String>,
}

impl InMemoryIis {
    pub fn new() -> Self {
        InMemoryIis { available: true, ..Default::default() }
    }

    pub fn with_site(mut self, name: &str, physical_path: impl Into<PathBuf>, pool: &str) -> Self {
        self.sites.push(SiteRecord {
            name: name.to_string(),
            physical_path: physical_path.into(),
            application_pool: pool.to_string(),
            state: Some("Started".into()),
            auto_start: true,
        });
        self.ensure_pool(pool);
        self
    }

    pub fn with_application(mut self, site: &str, path: &str, physical_path: impl Into<PathBuf>, pool: &str) -> Self {
        self.applications.push((
            site.to_string(),
            ApplicationRecord { path: path.to_string(), physical_path: physical_path.into(), application_pool: pool.to_string() },
        ));
        self.ensure_pool(pool);
        self
    }

    pub fn with_pool_state(mut self, pool: &str, state: &str) -> Self {
        self.ensure_pool(pool);
        if let Some(p) = self.app_pools.iter_mut().find(|p| p.name == pool) {
            p.state = Some(state.to_string());
        }
        self
    }

    pub fn failing(mut self, site: &str) -> Self {
        self.failing_sites.push(site.to_string());
        self
    }

    fn ensure_pool(&mut self, pool: &str) {
        if !pool.is_empty() && !self.app_pools.iter().any(|p| p.name == pool) {
            self.app_pools.push(AppPoolRecord {
                name: pool.to_string(),
                state: Some("Started".into()),
                auto_start: true,
                runtime_version: Some("v4.0".into()),
            });
        }
    }
}

impl IisQuery for InMemoryIis {
    fn is_available(&self) -> bool {
        self.available
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn list_sites(&self) -> Result<Vec<SiteRecord>> {
        Ok(if self.available { self.sites.clone() } else { Vec::new() })
    }

    fn list_applications(&self, site_name: &str) -> Result<Vec<ApplicationRecord>> {
        if self.failing_sites.iter().any(|s| s == site_name) {
            return Err(anyhow!("access denied reading applications of site '{}'", site_name));
        }
        Ok(self.applications.iter().filter(|(s, _)| s == site_name).map(|(_, a)| a.clone()).collect())
    }

    fn list_app_pools(&self) -> Result<Vec<AppPoolRecord>> {
        Ok(if self.available { self.app_pools.clone() } else { Vec::new() })
    }
}
