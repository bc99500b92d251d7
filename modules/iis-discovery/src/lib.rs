//! Instance discovery over IIS sites and applications.

mod applicationhost;
mod classify;
mod iis;

pub use applicationhost::{default_path, expand_env, ApplicationHostConfig};
pub use classify::classify;
pub use iis::{AppPoolRecord, ApplicationRecord, IisQuery, InMemoryIis, SiteRecord};

use config_parser::{find_config_file, parse_ess_config, parse_wfe_config, ESS_CONFIG_FILE, WFE_CONFIG_FILE};
use readiness_core::{error_chain, Instance, InstanceType};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A site whose applications could not be enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSite {
    pub site_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub instances: Vec<Instance>,
    pub skipped: Vec<SkippedSite>,
}

/// Enumerate every site root and sub-application as an [`Instance`].
///
/// Order follows IIS: sites in enumeration order, each root before its
/// sub-applications. No sorting is applied. A site that fails to enumerate is
/// skipped with a warning and recorded in [`Discovery::skipped`]. Fails only
/// when the site list itself cannot be read.
pub fn discover_detailed(iis: &dyn IisQuery) -> anyhow::Result<Discovery> {
    let sites = iis.list_sites()?;
    info!(sites = sites.len(), "enumerating IIS sites");
    let mut out = Discovery::default();

    for site in sites {
        let apps = match iis.list_applications(&site.name) {
            Ok(a) => a,
            Err(e) => {
                let reason = error_chain(&e);
                warn!(site = %site.name, error = %reason, "skipping site");
                out.skipped.push(SkippedSite { site_name: site.name.clone(), reason });
                continue;
            }
        };
        out.instances.push(build_candidate(&site.name, "/", &site.application_pool, &site.physical_path));
        for app in apps {
            out.instances.push(build_candidate(&site.name, &app.path, &app.application_pool, &app.physical_path));
        }
    }
    info!(instances = out.instances.len(), skipped = out.skipped.len(), "discovery complete");
    Ok(out)
}

/// Candidate instances only. IIS being absent or unreadable yields an empty list.
pub fn discover(iis: &dyn IisQuery) -> Vec<Instance> {
    match discover_detailed(iis) {
        Ok(d) => d.instances,
        Err(e) => {
            warn!(error = %error_chain(&e), "cannot enumerate IIS sites");
            Vec::new()
        }
    }
}

fn build_candidate(site: &str, path: &str, pool: &str, physical: &std::path::Path) -> Instance {
    let mut inst = Instance::candidate(site, path, pool, physical);
    inst.instance_type = classify(&inst.application_path, &physical.to_string_lossy());
    enrich(&mut inst);
    debug!(site, path = %inst.application_path, kind = %inst.instance_type, "candidate");
    inst
}

/// Fill connection and tenant fields from the instance's configuration file.
/// A missing or malformed file leaves them empty; the validation pass reports it.
pub fn enrich(inst: &mut Instance) {
    match inst.instance_type {
        InstanceType::Ess => {
            let Some(path) = find_config_file(&inst.physical_path, ESS_CONFIG_FILE) else { return };
            match parse_ess_config(&path) {
                Ok(cfg) => inst.apply_ess_config(cfg),
                Err(e) => debug!(instance = %inst.id(), error = %e, "ESS config not usable during discovery"),
            }
        }
        InstanceType::Wfe => {
            let Some(path) = find_config_file(&inst.physical_path, WFE_CONFIG_FILE) else { return };
            match parse_wfe_config(&path) {
                Ok(tenants) => inst.apply_tenants(tenants),
                Err(e) => debug!(instance = %inst.id(), error = %e, "WFE config not usable during discovery"),
            }
        }
        InstanceType::Unknown => {}
    }
}
