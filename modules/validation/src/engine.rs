use crate::settings::EngineSettings;
use health_probe::HealthProbe;
use host_facts::{DbConnector, NetworkProbe, SecurityProbe, SystemFacts};
use iis_discovery::{AppPoolRecord, IisQuery};
use readiness_core::{compare_versions, error_chain, CheckError, Instance, InstanceType, ResultStore, Status};
use std::cmp::Ordering;
use std::fmt::Display;
use tracing::{info, warn};

pub mod category {
    pub const SYSTEM: &str = "System Requirements";
    pub const IIS: &str = "IIS Configuration";
    pub const DATABASE: &str = "Database Connectivity";
    pub const NETWORK: &str = "Network";
    pub const SECURITY: &str = "Security";
    pub const DISCOVERY: &str = "Discovery";
    pub const INSTANCE: &str = "Instance";
    pub const APP_POOL: &str = "Application Pool";
    pub const PHYSICAL_PATH: &str = "Physical Path";
    pub const CONFIG_FILES: &str = "Configuration Files";
    pub const ENCRYPTION: &str = "Encryption";
    pub const API_HEALTH: &str = "API Health";
    pub const TENANTS: &str = "WFE Tenants";
}

/// Outcome of one assertion before it is stamped into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: Status,
    pub message: String,
}

impl Verdict {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Verdict { status, message: message.into() }
    }
    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(Status::Pass, message)
    }
    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(Status::Fail, message)
    }
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Status::Warning, message)
    }
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Status::Info, message)
    }
}

pub type CheckResult = Result<Verdict, CheckError>;

/// Text recorded for a failed assertion.
pub fn failure_message(err: &CheckError) -> String {
    match err {
        CheckError::Other(inner) => error_chain(inner),
        CheckError::PermissionDenied(_) => format!("{}; re-run from an elevated (Administrator) prompt", err),
        _ => err.to_string(),
    }
}

/// Run one assertion and record exactly one result for it. An error becomes
/// a FAIL carrying its message; nothing propagates to the caller.
pub fn guarded<F>(store: &mut ResultStore, category: &str, check: &str, f: F)
where
    F: FnOnce() -> CheckResult,
{
    let verdict = match f() {
        Ok(v) => v,
        Err(e) => {
            warn!(category, check, kind = e.kind(), error = %e, "check failed");
            Verdict::fail(failure_message(&e))
        }
    };
    store.add(category, check, verdict.status, verdict.message);
}

fn at_least<T: PartialOrd + Display>(actual: Option<T>, minimum: T, unit: &str, what: &str) -> Verdict {
    match actual {
        None => Verdict::warning(format!("{} could not be measured (minimum {} {})", what, minimum, unit)),
        Some(v) if v >= minimum => Verdict::pass(format!("{} {} (minimum {} {})", v, unit, minimum, unit)),
        Some(v) => Verdict::fail(format!("{} {} is below the minimum of {} {}", v, unit, minimum, unit)),
    }
}

fn version_at_least(actual: Option<&str>, minimum: &str, what: &str) -> Verdict {
    match actual.map(str::trim).filter(|s| !s.is_empty()) {
        None => Verdict::warning(format!("{} version could not be determined (minimum {})", what, minimum)),
        Some(v) if compare_versions(v, minimum) != Ordering::Less => {
            Verdict::pass(format!("{} {} (minimum {})", what, v, minimum))
        }
        Some(v) => Verdict::fail(format!("{} {} is older than the minimum {}", what, v, minimum)),
    }
}

fn os_allowed(actual: Option<&str>, allowed: &[String]) -> Verdict {
    let Some(os) = actual.map(str::trim).filter(|s| !s.is_empty()) else {
        return Verdict::warning("operating system version could not be determined");
    };
    let lower = os.to_lowercase();
    if allowed.iter().any(|a| lower.contains(&a.to_lowercase())) {
        Verdict::pass(format!("{} is supported", os))
    } else {
        Verdict::fail(format!("{} is not a supported operating system (supported: {})", os, allowed.join(", ")))
    }
}

/// Runs every check group against the selected instances.
pub struct ValidationEngine<'a> {
    pub(crate) settings: EngineSettings,
    pub(crate) iis: &'a dyn IisQuery,
    pub(crate) db: &'a dyn DbConnector,
    pub(crate) network: &'a dyn NetworkProbe,
    pub(crate) security: &'a dyn SecurityProbe,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(
        settings: EngineSettings,
        iis: &'a dyn IisQuery,
        db: &'a dyn DbConnector,
        network: &'a dyn NetworkProbe,
        security: &'a dyn SecurityProbe,
    ) -> Self {
        ValidationEngine { settings, iis, db, network, security }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn iis(&self) -> &'a dyn IisQuery {
        self.iis
    }

    /// Append one result per assertion to `store`. Groups are independent;
    /// instances are validated one after another.
    pub async fn validate(&self, instances: &[Instance], facts: &SystemFacts, store: &mut ResultStore) {
        info!(instances = instances.len(), "validating host");
        self.check_system(facts, store);
        self.check_iis(facts, store);
        self.check_network(store);
        self.check_security(store);

        if instances.is_empty() {
            return;
        }
        let pools: Result<Vec<AppPoolRecord>, String> =
            self.iis.list_app_pools().map_err(|e| format!("cannot list application pools: {}", error_chain(&e)));
        let probe = self.build_probe(instances);
        for inst in instances {
            self.check_instance(inst, &pools, &probe, store).await;
        }
        info!(results = store.len(), "validation finished");
    }

    /// One client per run. Several probed instances share the batch timeout.
    fn build_probe(&self, instances: &[Instance]) -> Result<HealthProbe, String> {
        let probed = instances
            .iter()
            .filter(|i| i.instance_type == InstanceType::Ess && i.ess_site_url.is_some())
            .count();
        let opts = self.settings.api.probe_options(probed > 1);
        HealthProbe::new(opts).map_err(|e| format!("cannot build HTTP client: {}", error_chain(&e)))
    }

    pub fn check_system(&self, facts: &SystemFacts, store: &mut ResultStore) {
        let req = &self.settings.requirements;
        let cat = category::SYSTEM;
        guarded(store, cat, "Memory", || Ok(at_least(facts.total_memory_mb, req.min_memory_mb, "MB", "total memory")));
        guarded(store, cat, "Free Disk Space", || {
            let what = match &facts.system_volume {
                Some(v) => format!("free space on {}", v),
                None => "free disk space".to_string(),
            };
            Ok(at_least(facts.free_disk_gb, req.min_free_disk_gb, "GB", &what))
        });
        guarded(store, cat, "CPU Cores", || Ok(at_least(facts.cpu_cores, req.min_cpu_cores, "cores", "CPU core count")));
        guarded(store, cat, "CPU Speed", || Ok(at_least(facts.cpu_mhz, req.min_cpu_mhz, "MHz", "CPU speed")));
        guarded(store, cat, "Operating System", || Ok(os_allowed(facts.os_version.as_deref(), &req.allowed_os)));
        guarded(store, cat, ".NET Framework", || {
            Ok(version_at_least(facts.dotnet_version.as_deref(), &req.min_dotnet_version, ".NET Framework"))
        });
    }

    /// When IIS is absent or its configuration is unreadable this records a
    /// single FAIL and nothing else.
    pub fn check_iis(&self, facts: &SystemFacts, store: &mut ResultStore) {
        let req = &self.settings.requirements;
        let cat = category::IIS;
        if !self.iis.is_available() {
            store.add(
                cat,
                "IIS Installed",
                Status::Fail,
                "IIS is not installed (applicationHost.config not found); discovery and instance checks skipped",
            );
            return;
        }
        if let Some(err) = self.iis.load_error() {
            store.add(
                cat,
                "IIS Installed",
                Status::Fail,
                format!("IIS configuration cannot be read: {}; discovery and instance checks skipped", err),
            );
            return;
        }
        store.add(cat, "IIS Installed", Status::Pass, "IIS configuration is readable");
        guarded(store, cat, "Site Count", || {
            let n = self.iis.list_sites()?.len();
            Ok(at_least(Some(n), req.min_sites, "site(s)", "IIS sites"))
        });
        guarded(store, cat, "Application Pool Count", || {
            let n = self.iis.list_app_pools()?.len();
            Ok(at_least(Some(n), req.min_app_pools, "pool(s)", "application pools"))
        });
        guarded(store, cat, "IIS Version", || {
            let version = facts.iis_version.clone().or_else(|| self.iis.version());
            Ok(version_at_least(version.as_deref(), &req.min_iis_version, "IIS"))
        });
    }

    pub fn check_network(&self, store: &mut ResultStore) {
        let cat = category::NETWORK;
        guarded(store, cat, "Network Adapters", || {
            let adapters = self.network.active_adapters()?;
            if adapters.is_empty() {
                return Ok(Verdict::fail("no active network adapters found"));
            }
            let names: Vec<&str> = adapters.iter().map(|a| a.name.as_str()).collect();
            Ok(Verdict::pass(format!("{} active adapter(s): {}", adapters.len(), names.join(", "))))
        });
        guarded(store, cat, "Internet Connectivity", || {
            Ok(match self.network.internet() {
                Ok(detail) => Verdict::pass(detail),
                Err(e) => Verdict::warning(format!(
                    "internet not reachable: {} (acceptable on isolated networks)",
                    error_chain(&e)
                )),
            })
        });
    }

    pub fn check_security(&self, store: &mut ResultStore) {
        let cat = category::SECURITY;
        guarded(store, cat, "Administrator Privileges", || {
            if self.security.is_elevated()? {
                Ok(Verdict::pass("running with administrator privileges"))
            } else {
                Err(CheckError::PermissionDenied("process is not running as administrator".into()))
            }
        });
        let dir = &self.settings.write_probe_dir;
        guarded(store, cat, "File System Write Access", || {
            self.security.probe_write(dir).map_err(|e| {
                CheckError::PermissionDenied(format!("cannot write to {}: {}", dir.display(), error_chain(&e)))
            })?;
            Ok(Verdict::pass(format!("write access to {} confirmed", dir.display())))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn minimum_comparisons() {
        assert_eq!(at_least(Some(16384u64), 8192, "MB", "memory").status, Status::Pass);
        assert_eq!(at_least(Some(8192u64), 8192, "MB", "memory").status, Status::Pass);
        assert_eq!(at_least(Some(4096u64), 8192, "MB", "memory").status, Status::Fail);
        assert_eq!(at_least(None, 8192u64, "MB", "memory").status, Status::Warning);
    }

    #[test]
    fn version_comparisons() {
        assert_eq!(version_at_least(Some("4.8.1"), "4.8", ".NET").status, Status::Pass);
        assert_eq!(version_at_least(Some("4.7.2"), "4.8", ".NET").status, Status::Fail);
        assert_eq!(version_at_least(Some("10.0"), "10.0", "IIS").status, Status::Pass);
        assert_eq!(version_at_least(Some("  "), "10.0", "IIS").status, Status::Warning);
        assert_eq!(version_at_least(None, "10.0", "IIS").status, Status::Warning);
    }

    #[test]
    fn os_allow_list_is_substring_match() {
        let allowed = vec!["Windows Server 2019".to_string(), "Windows Server 2022".to_string()];
        assert_eq!(os_allowed(Some("Windows Server 2022 Datacenter 21H2"), &allowed).status, Status::Pass);
        assert_eq!(os_allowed(Some("windows server 2019 standard"), &allowed).status, Status::Pass);
        assert_eq!(os_allowed(Some("Windows Server 2012 R2"), &allowed).status, Status::Fail);
        assert_eq!(os_allowed(None, &allowed).status, Status::Warning);
    }

    #[test]
    fn guarded_records_error_as_fail() {
        let mut store = ResultStore::new();
        guarded(&mut store, "Cat", "boom", || {
            let e: anyhow::Result<()> = Err(anyhow!("access denied")).context("listing sites");
            e?;
            Ok(Verdict::pass("unreachable"))
        });
        guarded(&mut store, "Cat", "fine", || Ok(Verdict::info("ok")));
        assert_eq!(store.len(), 2);
        let failed = store.find("boom").unwrap();
        assert_eq!(failed.status, Status::Fail);
        assert_eq!(failed.message, "listing sites: access denied");
        assert_eq!(store.find("fine").unwrap().status, Status::Info);
    }

    #[test]
    fn permission_denied_carries_remediation() {
        let msg = failure_message(&CheckError::PermissionDenied("not elevated".into()));
        assert!(msg.starts_with("permission denied: not elevated"));
        assert!(msg.contains("Administrator"));
    }
}
