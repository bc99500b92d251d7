use crate::engine::{category, guarded, Verdict, ValidationEngine};
use config_parser::{
    find_config_file, inspect_web_config, parse_ess_config, parse_wfe_config, ESS_CONFIG_FILE, WEB_CONFIG_FILE,
    WFE_CONFIG_FILE,
};
use health_probe::{HealthProbe, ProbeOutcome};
use host_facts::UnresolvedInstance;
use iis_discovery::AppPoolRecord;
use readiness_core::{error_chain, CheckError, EssConfig, Instance, InstanceType, ResultStore, Status, TenantConfig};
use std::path::PathBuf;
use tracing::debug;

fn summary_line(inst: &Instance) -> String {
    let mut line = format!(
        "{} instance '{}' at {}{} (pool '{}', path {})",
        inst.instance_type,
        inst.alias,
        inst.site_name,
        if inst.application_path == "/" { "" } else { inst.application_path.as_str() },
        inst.application_pool,
        inst.physical_path.display()
    );
    if let Some(url) = &inst.ess_site_url {
        line.push_str(&format!(", site URL {}", url));
    }
    line
}

fn missing_fields(pairs: &[(&str, bool)]) -> Vec<String> {
    pairs.iter().filter(|(_, present)| !present).map(|(name, _)| name.to_string()).collect()
}

/// Fold a probe outcome into results: one for the endpoint, one per
/// reported component.
pub fn record_probe_outcome(id: &str, outcome: &ProbeOutcome, store: &mut ResultStore) {
    let check = format!("{} - API Health", id);
    let cat = category::API_HEALTH;
    if !outcome.success {
        let error = outcome.error.as_deref().unwrap_or("request failed");
        store.add(cat, check, Status::Fail, format!("{}: {} [{} attempt(s)]", outcome.uri, error, outcome.retry_attempts));
        return;
    }
    if outcome.non_standard_payload() {
        let detail = outcome.error.as_deref().unwrap_or("reachable but non-standard payload");
        store.add(cat, check, Status::Info, format!("{}: {}", outcome.uri, detail));
        return;
    }
    let overall = outcome.overall_status.as_deref().unwrap_or("unknown");
    let status = if outcome.is_healthy() { Status::Pass } else { Status::Warning };
    store.add(
        cat,
        check,
        status,
        format!("{} reported '{}' after {} attempt(s)", outcome.uri, overall, outcome.retry_attempts),
    );
    for c in &outcome.components {
        let status = if c.status.eq_ignore_ascii_case("healthy") { Status::Pass } else { Status::Warning };
        let message = match &c.version {
            Some(v) => format!("status '{}', version {}", c.status, v),
            None => format!("status '{}'", c.status),
        };
        store.add(cat, format!("{} - Component {}", id, c.name), status, message);
    }
}

impl<'a> ValidationEngine<'a> {
    pub(crate) async fn check_instance(
        &self,
        inst: &Instance,
        pools: &Result<Vec<AppPoolRecord>, String>,
        probe: &Result<HealthProbe, String>,
        store: &mut ResultStore,
    ) {
        let id = inst.id();
        debug!(instance = %id, kind = %inst.instance_type, "validating instance");
        store.add(category::INSTANCE, format!("{} - Summary", id), Status::Info, summary_line(inst));
        self.check_app_pool(&id, inst, pools, store);
        self.check_physical_path(&id, inst, store);
        match inst.instance_type {
            InstanceType::Ess => self.check_ess(&id, inst, probe, store).await,
            InstanceType::Wfe => self.check_wfe(&id, inst, store),
            InstanceType::Unknown => store.add(
                category::INSTANCE,
                format!("{} - Type", id),
                Status::Warning,
                "instance type could not be determined; ESS and WFE checks skipped",
            ),
        }
    }

    fn check_app_pool(&self, id: &str, inst: &Instance, pools: &Result<Vec<AppPoolRecord>, String>, store: &mut ResultStore) {
        guarded(store, category::APP_POOL, &format!("{} - Application Pool", id), || {
            let pools = pools.as_ref().map_err(|e| CheckError::Other(anyhow::anyhow!("{}", e)))?;
            let name = inst.application_pool.trim();
            if name.is_empty() {
                return Err(CheckError::NotFound("no application pool is assigned".into()));
            }
            let pool = pools
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| CheckError::NotFound(format!("application pool '{}' does not exist", name)))?;
            Ok(match pool.is_running() {
                Some(true) => Verdict::pass(format!("application pool '{}' is running", name)),
                Some(false) => Verdict::fail(format!(
                    "application pool '{}' is {}",
                    name,
                    pool.state.as_deref().unwrap_or("not running")
                )),
                None if !pool.auto_start => {
                    Verdict::warning(format!("application pool '{}' exists but does not start automatically", name))
                }
                None => Verdict::pass(format!("application pool '{}' exists (runtime state not reported)", name)),
            })
        });
    }

    fn check_physical_path(&self, id: &str, inst: &Instance, store: &mut ResultStore) {
        guarded(store, category::PHYSICAL_PATH, &format!("{} - Physical Path", id), || {
            let path = &inst.physical_path;
            if path.is_dir() {
                Ok(Verdict::pass(format!("{} exists", path.display())))
            } else {
                Err(CheckError::NotFound(format!("{} does not exist or is not a directory", path.display())))
            }
        });
    }

    fn check_config_presence(&self, id: &str, inst: &Instance, file_name: &str, store: &mut ResultStore) -> Option<PathBuf> {
        let found = find_config_file(&inst.physical_path, file_name);
        let check = format!("{} - {}", id, file_name);
        match &found {
            Some(p) => store.add(category::CONFIG_FILES, check, Status::Pass, format!("found {}", p.display())),
            None => store.add(
                category::CONFIG_FILES,
                check,
                Status::Fail,
                format!("{} not found in {}", file_name, inst.physical_path.display()),
            ),
        }
        found
    }

    async fn check_ess(&self, id: &str, inst: &Instance, probe: &Result<HealthProbe, String>, store: &mut ResultStore) {
        let mut server = inst.database_server.clone();
        let mut database = inst.database_name.clone();

        if let Some(path) = self.check_config_presence(id, inst, ESS_CONFIG_FILE, store) {
            let mut parsed: Option<EssConfig> = None;
            guarded(store, category::CONFIG_FILES, &format!("{} - {} Contents", id, ESS_CONFIG_FILE), || {
                let cfg = parse_ess_config(&path)?;
                let verdict = if cfg.connection_string.is_none() {
                    Verdict::warning("no <connection type=\"sql\"> element found")
                } else {
                    let missing = missing_fields(&[
                        ("data source", cfg.database_server.is_some()),
                        ("initial catalog", cfg.database_name.is_some()),
                    ]);
                    if missing.is_empty() {
                        Verdict::pass(format!(
                            "SQL connection to server {}, database {}",
                            cfg.database_server.as_deref().unwrap_or_default(),
                            cfg.database_name.as_deref().unwrap_or_default()
                        ))
                    } else {
                        Verdict::warning(format!("SQL connection string is missing: {}", missing.join(", ")))
                    }
                };
                parsed = Some(cfg);
                Ok(verdict)
            });
            if let Some(cfg) = parsed {
                server = cfg.database_server;
                database = cfg.database_name;
            }
        }

        if let Some(path) = self.check_config_presence(id, inst, WEB_CONFIG_FILE, store) {
            guarded(store, category::ENCRYPTION, &format!("{} - web.config Encryption", id), || {
                let web = inspect_web_config(&path)?;
                Ok(if web.requires_decryption() {
                    Verdict::warning(format!(
                        "Single Sign-On is enabled and sections are encrypted ({}); decrypt web.config before upgrading",
                        web.encrypted_sections.join(", ")
                    ))
                } else if web.is_encrypted() {
                    Verdict::info(format!("encrypted sections: {}", web.encrypted_sections.join(", ")))
                } else {
                    Verdict::info("web.config is not encrypted")
                })
            });
        }

        self.check_database(&format!("{} - Database Connection", id), server.as_deref(), database.as_deref(), store);
        self.check_api(id, inst, probe, store).await;
    }

    fn check_wfe(&self, id: &str, inst: &Instance, store: &mut ResultStore) {
        let Some(path) = self.check_config_presence(id, inst, WFE_CONFIG_FILE, store) else {
            return;
        };
        let mut tenants: Vec<TenantConfig> = Vec::new();
        guarded(store, category::TENANTS, &format!("{} - Tenants", id), || {
            tenants = parse_wfe_config(&path)?;
            if tenants.is_empty() {
                return Ok(Verdict::fail(format!("no <tenant> elements in {}", path.display())));
            }
            let ids: Vec<&str> = tenants.iter().map(|t| t.tenant_id.as_str()).collect();
            Ok(Verdict::pass(format!("{} tenant(s): {}", tenants.len(), ids.join(", "))))
        });

        for (n, tenant) in tenants.iter().enumerate() {
            let label = if tenant.tenant_id.trim().is_empty() { format!("#{}", n + 1) } else { tenant.tenant_id.clone() };
            let check = format!("{} - Tenant {}", id, label);
            let missing = missing_fields(&[
                ("id", !tenant.tenant_id.trim().is_empty()),
                ("workflowDatabaseServer", tenant.database_server.is_some()),
                ("workflowDatabaseName", tenant.database_name.is_some()),
            ]);
            if missing.is_empty() {
                store.add(
                    category::TENANTS,
                    check,
                    Status::Info,
                    format!(
                        "database {} on {}{}",
                        tenant.database_name.as_deref().unwrap_or_default(),
                        tenant.database_server.as_deref().unwrap_or_default(),
                        tenant.client_url.as_deref().map(|u| format!(", client URL {}", u)).unwrap_or_default()
                    ),
                );
            } else {
                store.add(category::TENANTS, check, Status::Warning, format!("tenant is missing: {}", missing.join(", ")));
            }
            self.check_database(
                &format!("{} - Tenant {} Database Connection", id, label),
                tenant.database_server.as_deref(),
                tenant.database_name.as_deref(),
                store,
            );
        }
    }

    /// Failure text from the connector is kept verbatim.
    fn check_database(&self, check: &str, server: Option<&str>, database: Option<&str>, store: &mut ResultStore) {
        let (Some(server), Some(database)) = (server, database) else {
            store.add(
                category::DATABASE,
                check,
                Status::Warning,
                "database server or name not resolved; connection not attempted",
            );
            return;
        };
        guarded(store, category::DATABASE, check, || {
            Ok(match self.db.connect(server, database) {
                Ok(detail) => Verdict::pass(format!("connected to {} / {}: {}", server, database, detail)),
                Err(e) => match e.downcast_ref::<UnresolvedInstance>() {
                    Some(u) => Verdict::warning(format!(
                        "named instance port could not be resolved; connection to {} / {} not attempted: {}",
                        server, database, u
                    )),
                    None => Verdict::fail(format!("cannot connect to {} / {}: {}", server, database, error_chain(&e))),
                },
            })
        });
    }

    async fn check_api(&self, id: &str, inst: &Instance, probe: &Result<HealthProbe, String>, store: &mut ResultStore) {
        let Some(url) = inst.ess_site_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            store.add(
                category::API_HEALTH,
                format!("{} - API Health", id),
                Status::Info,
                "no site URL supplied; health check not run",
            );
            return;
        };
        match probe {
            Ok(p) => {
                let outcome = p.probe(url).await;
                record_probe_outcome(id, &outcome, store);
            }
            Err(e) => store.add(category::API_HEALTH, format!("{} - API Health", id), Status::Fail, e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_probe::{Component, Termination};

    fn outcome() -> ProbeOutcome {
        ProbeOutcome {
            uri: "https://ess.example/api/v1/healthcheck".into(),
            status_code: Some(200),
            success: true,
            overall_status: Some("Healthy".into()),
            components: vec![
                Component { name: "Database".into(), status: "Healthy".into(), version: Some("12.1".into()) },
                Component { name: "Mail".into(), status: "Degraded".into(), version: None },
            ],
            error: None,
            retry_attempts: 1,
            termination: Termination::Success,
            failure: None,
        }
    }

    #[test]
    fn healthy_outcome_with_components() {
        let mut store = ResultStore::new();
        record_probe_outcome("Site/ESS", &outcome(), &mut store);
        assert_eq!(store.len(), 3);
        assert_eq!(store.find("Site/ESS - API Health").unwrap().status, Status::Pass);
        assert_eq!(store.find("Site/ESS - Component Database").unwrap().status, Status::Pass);
        assert_eq!(store.find("Site/ESS - Component Mail").unwrap().status, Status::Warning);
    }

    #[test]
    fn non_standard_payload_is_info() {
        let mut o = outcome();
        o.overall_status = None;
        o.components.clear();
        o.termination = Termination::NonStandardPayload;
        o.error = Some("reachable but non-standard payload: expected value".into());
        let mut store = ResultStore::new();
        record_probe_outcome("x", &o, &mut store);
        let r = store.find("x - API Health").unwrap();
        assert_eq!(r.status, Status::Info);
        assert!(r.message.contains("non-standard payload"));
    }

    #[test]
    fn failed_outcome_reports_attempts() {
        let mut o = outcome();
        o.success = false;
        o.components.clear();
        o.overall_status = None;
        o.retry_attempts = 3;
        o.termination = Termination::RetriesExhausted;
        o.error = Some("timeout: operation timed out (retries exhausted after 3 attempt(s))".into());
        let mut store = ResultStore::new();
        record_probe_outcome("x", &o, &mut store);
        let r = store.find("x - API Health").unwrap();
        assert_eq!(r.status, Status::Fail);
        assert!(r.message.contains("3 attempt(s)"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn degraded_overall_is_warning() {
        let mut o = outcome();
        o.overall_status = Some("Degraded".into());
        o.components.clear();
        let mut store = ResultStore::new();
        record_probe_outcome("x", &o, &mut store);
        assert_eq!(store.find("x - API Health").unwrap().status, Status::Warning);
    }

    #[test]
    fn summary_mentions_location() {
        let inst = Instance::candidate("Default Web Site", "/ESS", "EssPool", "C:\\inetpub\\ESS");
        let line = summary_line(&inst);
        assert!(line.contains("Default Web Site/ESS"));
        assert!(line.contains("EssPool"));
    }
}
