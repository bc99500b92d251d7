//! Host fact collectors: hardware, OS, network reachability and privileges.
//!
//! Each collector is a plain information-gathering call. The traits exist so
//! validation can run against canned facts in tests.

mod network;
mod security;
pub mod sqlbrowser;

pub use network::{list_active_adapters, AdapterInfo, TcpReachability};
pub use sqlbrowser::UnresolvedInstance;
pub use security::{is_elevated, probe_write_access, LocalSecurity};

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use sysinfo::{Disks, System};
use tracing::debug;

/// Facts compared against the minimum requirements. `None` means the fact
/// could not be measured on this host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemFacts {
    pub host_name: Option<String>,
    pub os_version: Option<String>,
    pub total_memory_mb: Option<u64>,
    pub free_disk_gb: Option<u64>,
    pub system_volume: Option<String>,
    pub cpu_cores: Option<usize>,
    pub cpu_mhz: Option<u64>,
    pub dotnet_version: Option<String>,
    pub iis_version: Option<String>,
}

/// Opens a connection to the database named by an instance's configuration.
pub trait DbConnector {
    /// Returns a short description of the established connection.
    fn connect(&self, data_source: &str, database: &str) -> Result<String>;
}

pub trait NetworkProbe {
    /// Outbound connectivity check; returns what was reached.
    fn internet(&self) -> Result<String>;
    fn active_adapters(&self) -> Result<Vec<AdapterInfo>>;
}

pub trait SecurityProbe {
    fn is_elevated(&self) -> Result<bool>;
    fn probe_write(&self, dir: &Path) -> Result<()>;
}

fn nonzero(v: u64) -> Option<u64> {
    (v > 0).then_some(v)
}

/// Collect hardware and OS facts via `sysinfo`. .NET and IIS versions are not
/// measurable this way and stay `None` unless supplied by the caller.
pub fn collect_system_facts() -> SystemFacts {
    let sys = System::new_all();
    let disks = Disks::new_with_refreshed_list();

    let system_mount = match std::env::var("SystemDrive") {
        Ok(d) => format!("{}\\", d.trim_end_matches('\\')),
        Err(_) => "/".to_string(),
    };
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point().to_string_lossy().eq_ignore_ascii_case(&system_mount))
        .or_else(|| disks.list().first());

    let facts = SystemFacts {
        host_name: System::host_name(),
        os_version: System::long_os_version(),
        total_memory_mb: nonzero(sys.total_memory() / (1024 * 1024)),
        free_disk_gb: disk.and_then(|d| nonzero(d.available_space() / (1024 * 1024 * 1024))),
        system_volume: disk.map(|d| d.mount_point().to_string_lossy().to_string()),
        cpu_cores: Some(sys.cpus().len()).filter(|n| *n > 0),
        cpu_mhz: sys.cpus().first().and_then(|c| nonzero(c.frequency())),
        dotnet_version: None,
        iis_version: None,
    };
    debug!(?facts, "collected system facts");
    facts
}
