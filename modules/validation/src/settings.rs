use health_probe::ProbeOptions;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum host requirements for an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirements {
    pub min_memory_mb: u64,
    pub min_free_disk_gb: u64,
    pub min_cpu_cores: usize,
    pub min_cpu_mhz: u64,
    /// Accepted when any entry occurs in the reported OS version (case-insensitive).
    pub allowed_os: Vec<String>,
    pub min_dotnet_version: String,
    pub min_iis_version: String,
    pub min_sites: usize,
    pub min_app_pools: usize,
}

impl Default for Requirements {
    fn default() -> Self {
        Requirements {
            min_memory_mb: 8192,
            min_free_disk_gb: 20,
            min_cpu_cores: 4,
            min_cpu_mhz: 2000,
            allowed_os: ["Windows Server 2016", "Windows Server 2019", "Windows Server 2022", "Windows Server 2025"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_dotnet_version: "4.8".into(),
            min_iis_version: "10.0".into(),
            min_sites: 1,
            min_app_pools: 1,
        }
    }
}

/// Health-check API call settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiSettings {
    /// Per-attempt timeout when a single instance is probed.
    pub timeout: Duration,
    /// Per-attempt timeout when several instances are probed in one run.
    pub batch_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub accept_invalid_certs: bool,
    pub use_system_proxy: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            timeout: Duration::from_secs(60),
            batch_timeout: Duration::from_secs(90),
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
            accept_invalid_certs: false,
            use_system_proxy: true,
        }
    }
}

impl ApiSettings {
    pub fn probe_options(&self, batch: bool) -> ProbeOptions {
        ProbeOptions {
            timeout: if batch { self.batch_timeout } else { self.timeout },
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            accept_invalid_certs: self.accept_invalid_certs,
            use_system_proxy: self.use_system_proxy,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSettings {
    pub requirements: Requirements,
    pub api: ApiSettings,
    /// Directory used by the file-system write probe.
    pub write_probe_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            requirements: Requirements::default(),
            api: ApiSettings::default(),
            write_probe_dir: std::env::temp_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_api_defaults() {
        let api = ApiSettings::default();
        assert_eq!(api.timeout, Duration::from_secs(60));
        assert_eq!(api.batch_timeout, Duration::from_secs(90));
        assert_eq!(api.max_retries, 2);
        assert_eq!(api.retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn batch_mode_uses_batch_timeout() {
        let api = ApiSettings::default();
        assert_eq!(api.probe_options(false).timeout, Duration::from_secs(60));
        assert_eq!(api.probe_options(true).timeout, Duration::from_secs(90));
        assert_eq!(api.probe_options(true).max_retries, 2);
    }
}
