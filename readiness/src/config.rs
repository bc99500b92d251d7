use anyhow::{Context, Result};
use host_facts::{SystemFacts, TcpReachability};
use readiness_report::ReportFormat;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use validation::{ApiSettings, EngineSettings, Requirements};

pub const DEFAULT_CONFIG_FILE: &str = "ess-readiness.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct RequirementsConfig {
    pub min_memory_mb: Option<u64>,
    pub min_free_disk_gb: Option<u64>,
    pub min_cpu_cores: Option<usize>,
    pub min_cpu_mhz: Option<u64>,
    pub allowed_os: Option<Vec<String>>,
    pub min_dotnet_version: Option<String>,
    pub min_iis_version: Option<String>,
    pub min_sites: Option<usize>,
    pub min_app_pools: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ApiConfig {
    pub timeout_secs: Option<u64>,
    pub batch_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_secs: Option<u64>,
    pub accept_invalid_certs: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct IisConfig {
    pub application_host_config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct NetworkConfig {
    pub internet_probe: Option<String>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SecurityConfig {
    pub write_probe_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct FactsConfig {
    pub dotnet_version: Option<String>,
    pub iis_version: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ReportConfig {
    pub format: Option<String>,
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub requirements: Option<RequirementsConfig>,
    pub api: Option<ApiConfig>,
    pub iis: Option<IisConfig>,
    pub network: Option<NetworkConfig>,
    pub database: Option<DatabaseConfig>,
    pub security: Option<SecurityConfig>,
    pub facts: Option<FactsConfig>,
    pub report: Option<ReportConfig>,
    pub site_urls: Option<BTreeMap<String, String>>,
}

/// Load the YAML config. An explicit path must exist and parse; the implicit
/// `./ess-readiness.yaml` is skipped with a warning when it does not parse.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    match path {
        Some(p) => {
            let s = fs::read_to_string(p).with_context(|| format!("cannot read config {}", p.display()))?;
            let cfg = serde_yaml::from_str(&s).with_context(|| format!("invalid config {}", p.display()))?;
            info!(path = %p.display(), "loaded configuration");
            Ok(Some(cfg))
        }
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if !p.exists() {
                return Ok(None);
            }
            let parsed = fs::read_to_string(p)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_yaml::from_str::<Config>(&s).map_err(anyhow::Error::from));
            match parsed {
                Ok(cfg) => {
                    info!(path = %p.display(), "loaded configuration");
                    Ok(Some(cfg))
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "ignoring unreadable configuration file");
                    Ok(None)
                }
            }
        }
    }
}

impl Config {
    pub fn engine_settings(&self) -> EngineSettings {
        let mut req = Requirements::default();
        if let Some(r) = &self.requirements {
            if let Some(v) = r.min_memory_mb { req.min_memory_mb = v; }
            if let Some(v) = r.min_free_disk_gb { req.min_free_disk_gb = v; }
            if let Some(v) = r.min_cpu_cores { req.min_cpu_cores = v; }
            if let Some(v) = r.min_cpu_mhz { req.min_cpu_mhz = v; }
            if let Some(v) = &r.allowed_os { req.allowed_os = v.clone(); }
            if let Some(v) = &r.min_dotnet_version { req.min_dotnet_version = v.clone(); }
            if let Some(v) = &r.min_iis_version { req.min_iis_version = v.clone(); }
            if let Some(v) = r.min_sites { req.min_sites = v; }
            if let Some(v) = r.min_app_pools { req.min_app_pools = v; }
        }

        let mut api = ApiSettings::default();
        if let Some(a) = &self.api {
            if let Some(v) = a.timeout_secs { api.timeout = Duration::from_secs(v); }
            if let Some(v) = a.batch_timeout_secs { api.batch_timeout = Duration::from_secs(v); }
            if let Some(v) = a.max_retries { api.max_retries = v; }
            if let Some(v) = a.retry_delay_secs { api.retry_delay = Duration::from_secs(v); }
            if let Some(v) = a.accept_invalid_certs { api.accept_invalid_certs = v; }
        }

        let mut settings = EngineSettings { requirements: req, api, ..Default::default() };
        if let Some(dir) = self.security.as_ref().and_then(|s| s.write_probe_dir.clone()) {
            settings.write_probe_dir = dir;
        }
        settings
    }

    pub fn reachability(&self) -> TcpReachability {
        let mut r = TcpReachability::default();
        if let Some(n) = &self.network {
            if let Some(t) = &n.internet_probe { r.internet_target = t.clone(); }
            if let Some(ms) = n.connect_timeout_ms { r.internet_timeout = Duration::from_millis(ms); }
        }
        if let Some(ms) = self.database.as_ref().and_then(|d| d.connect_timeout_ms) {
            r.db_timeout = Duration::from_millis(ms);
        }
        r
    }

    pub fn application_host_path(&self) -> PathBuf {
        self.iis
            .as_ref()
            .and_then(|i| i.application_host_config.clone())
            .unwrap_or_else(iis_discovery::default_path)
    }

    /// Operator-supplied versions win over anything measured.
    pub fn apply_fact_overrides(&self, facts: &mut SystemFacts) {
        if let Some(f) = &self.facts {
            if f.dotnet_version.is_some() { facts.dotnet_version = f.dotnet_version.clone(); }
            if f.iis_version.is_some() { facts.iis_version = f.iis_version.clone(); }
        }
    }

    pub fn site_urls(&self) -> BTreeMap<String, String> {
        self.site_urls.clone().unwrap_or_default()
    }

    pub fn report_format(&self) -> Option<ReportFormat> {
        let name = self.report.as_ref()?.format.as_deref()?;
        let parsed = ReportFormat::parse(name);
        if parsed.is_none() {
            warn!(format = name, "unknown report format in configuration; using default");
        }
        parsed
    }

    pub fn report_dir(&self) -> Option<PathBuf> {
        self.report.as_ref().and_then(|r| r.out_dir.clone())
    }
}
