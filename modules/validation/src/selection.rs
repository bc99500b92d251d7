use anyhow::{bail, Result};
use readiness_core::{Instance, InstanceType};
use std::collections::BTreeMap;

/// Chooses which discovered candidates are validated.
///
/// Implementations present the candidates however they like (console prompt,
/// fixed list, automatic rule) and return the confirmed subset, with
/// `ess_site_url` filled for ESS entries that should be probed. The returned
/// instances are treated as already validated.
pub trait InstanceSelector {
    fn select(&mut self, candidates: &[Instance]) -> Result<Vec<Instance>>;
}

/// Site URL configured for an instance, keyed by alias or by instance id
/// (case-insensitive).
pub fn site_url_for(inst: &Instance, site_urls: &BTreeMap<String, String>) -> Option<String> {
    let id = inst.id();
    site_urls
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(&inst.alias) || k.eq_ignore_ascii_case(&id))
        .map(|(_, v)| v.clone())
}

/// Selects every ESS and WFE candidate and skips Unknown ones.
#[derive(Debug, Clone, Default)]
pub struct AutoSelector {
    site_urls: BTreeMap<String, String>,
}

impl AutoSelector {
    pub fn new(site_urls: BTreeMap<String, String>) -> Self {
        AutoSelector { site_urls }
    }
}

impl InstanceSelector for AutoSelector {
    fn select(&mut self, candidates: &[Instance]) -> Result<Vec<Instance>> {
        Ok(candidates
            .iter()
            .filter(|c| c.instance_type != InstanceType::Unknown)
            .cloned()
            .map(|mut inst| {
                if inst.instance_type == InstanceType::Ess && inst.ess_site_url.is_none() {
                    inst.ess_site_url = site_url_for(&inst, &self.site_urls);
                }
                inst
            })
            .collect())
    }
}

/// Fixed selections by instance id, for scripted runs and tests.
#[derive(Debug, Clone, Default)]
pub struct CannedSelector {
    picks: Vec<(String, Option<InstanceType>, Option<String>)>,
}

impl CannedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick(mut self, id: &str, site_url: Option<&str>) -> Self {
        self.picks.push((id.to_string(), None, site_url.map(str::to_string)));
        self
    }

    /// Select `id` and override its classification, as an operator would for
    /// an Unknown candidate.
    pub fn pick_as(mut self, id: &str, kind: InstanceType, site_url: Option<&str>) -> Self {
        self.picks.push((id.to_string(), Some(kind), site_url.map(str::to_string)));
        self
    }
}

impl InstanceSelector for CannedSelector {
    fn select(&mut self, candidates: &[Instance]) -> Result<Vec<Instance>> {
        let mut out = Vec::with_capacity(self.picks.len());
        for (id, kind, url) in &self.picks {
            let Some(found) = candidates.iter().find(|c| c.id().eq_ignore_ascii_case(id)) else {
                bail!("no discovered instance named '{}'", id);
            };
            let mut inst = found.clone();
            if let Some(kind) = kind {
                inst.instance_type = *kind;
            }
            if url.is_some() {
                inst.ess_site_url = url.clone();
            }
            out.push(inst);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Instance> {
        let mut ess = Instance::candidate("Default Web Site", "/ESS", "EssPool", "/srv/ess");
        ess.instance_type = InstanceType::Ess;
        let mut wfe = Instance::candidate("Default Web Site", "/WFE", "WfePool", "/srv/wfe");
        wfe.instance_type = InstanceType::Wfe;
        let root = Instance::candidate("Default Web Site", "/", "DefaultAppPool", "/srv/root");
        vec![root, ess, wfe]
    }

    #[test]
    fn auto_skips_unknown_and_fills_urls() {
        let mut urls = BTreeMap::new();
        urls.insert("ess".to_string(), "https://ess.example".to_string());
        let picked = AutoSelector::new(urls).select(&candidates()).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].ess_site_url.as_deref(), Some("https://ess.example"));
        assert_eq!(picked[1].ess_site_url, None);
    }

    #[test]
    fn url_lookup_by_instance_id() {
        let mut urls = BTreeMap::new();
        urls.insert("Default Web Site/ESS".to_string(), "https://h".to_string());
        let c = candidates();
        assert_eq!(site_url_for(&c[1], &urls).as_deref(), Some("https://h"));
        assert_eq!(site_url_for(&c[2], &urls), None);
    }

    #[test]
    fn canned_picks_in_given_order() {
        let mut sel = CannedSelector::new()
            .pick("Default Web Site/WFE", None)
            .pick_as("Default Web Site", InstanceType::Ess, Some("http://root"));
        let picked = sel.select(&candidates()).unwrap();
        assert_eq!(picked[0].alias, "WFE");
        assert_eq!(picked[1].instance_type, InstanceType::Ess);
        assert_eq!(picked[1].ess_site_url.as_deref(), Some("http://root"));
    }

    #[test]
    fn canned_unknown_id_is_an_error() {
        let mut sel = CannedSelector::new().pick("Nope", None);
        assert!(sel.select(&candidates()).is_err());
    }
}
