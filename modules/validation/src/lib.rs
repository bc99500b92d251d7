//! Readiness validation: requirement settings, the check engine, instance
//! selection and the run orchestrator that ties discovery to validation.

pub mod engine;
mod instance;
pub mod selection;
pub mod settings;

pub use engine::{category, failure_message, guarded, CheckResult, ValidationEngine, Verdict};
pub use instance::record_probe_outcome;
pub use selection::{site_url_for, AutoSelector, CannedSelector, InstanceSelector};
pub use settings::{ApiSettings, EngineSettings, Requirements};

use host_facts::SystemFacts;
use iis_discovery::{discover_detailed, SkippedSite};
use readiness_core::{error_chain, Instance, InstanceType, ResultStore, Status};
use serde::Serialize;
use tracing::{info, warn};

/// What a run discovered and validated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    pub candidates: Vec<Instance>,
    pub selected: Vec<Instance>,
    pub skipped: Vec<SkippedSite>,
}

fn count(instances: &[Instance], kind: InstanceType) -> usize {
    instances.iter().filter(|i| i.instance_type == kind).count()
}

/// One full readiness run: reset the store, discover, select, validate.
///
/// When IIS is absent or its configuration is unreadable, discovery and
/// selection are skipped; the engine records that condition once and the
/// host-level groups still run.
pub async fn run(
    engine: &ValidationEngine<'_>,
    selector: &mut dyn InstanceSelector,
    facts: &SystemFacts,
    store: &mut ResultStore,
) -> RunOutcome {
    store.clear();
    let mut outcome = RunOutcome::default();
    let iis = engine.iis();

    if iis.is_available() && iis.load_error().is_none() {
        match discover_detailed(iis) {
            Ok(d) => {
                for s in &d.skipped {
                    store.add(
                        category::DISCOVERY,
                        format!("{} - Enumeration", s.site_name),
                        Status::Warning,
                        format!("site skipped: {}", s.reason),
                    );
                }
                outcome.candidates = d.instances;
                outcome.skipped = d.skipped;
            }
            Err(e) => store.add(category::DISCOVERY, "Site Enumeration", Status::Fail, error_chain(&e)),
        }
        let c = &outcome.candidates;
        store.add(
            category::DISCOVERY,
            "Candidates",
            Status::Info,
            format!(
                "{} candidate instance(s): {} ESS, {} WFE, {} unknown",
                c.len(),
                count(c, InstanceType::Ess),
                count(c, InstanceType::Wfe),
                count(c, InstanceType::Unknown)
            ),
        );

        if !outcome.candidates.is_empty() {
            match selector.select(&outcome.candidates) {
                Ok(selected) => outcome.selected = selected,
                Err(e) => store.add(category::DISCOVERY, "Instance Selection", Status::Fail, error_chain(&e)),
            }
        }
        if outcome.selected.is_empty() {
            store.add(
                category::DISCOVERY,
                "Selected Instances",
                Status::Warning,
                "no instances selected; only host-level checks were run",
            );
        } else {
            let ids: Vec<String> = outcome.selected.iter().map(|i| i.id()).collect();
            store.add(
                category::DISCOVERY,
                "Selected Instances",
                Status::Info,
                format!("{} selected: {}", ids.len(), ids.join(", ")),
            );
        }
    } else {
        warn!("IIS configuration is not available; skipping discovery");
    }

    info!(candidates = outcome.candidates.len(), selected = outcome.selected.len(), "starting validation");
    engine.validate(&outcome.selected, facts, store).await;
    outcome
}
