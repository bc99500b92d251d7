//! [`IisQuery`] backed by IIS's `applicationHost.config`.

use crate::iis::{AppPoolRecord, ApplicationRecord, IisQuery, SiteRecord};
use anyhow::{anyhow, Result};
use config_parser::xml::{parse_document, Element};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct ApplicationHostConfig {
    path: PathBuf,
    root: std::result::Result<Option<Element>, String>,
}

/// `%windir%\System32\inetsrv\config\applicationHost.config`.
pub fn default_path() -> PathBuf {
    let windir = std::env::var("windir")
        .or_else(|_| std::env::var("SystemRoot"))
        .unwrap_or_else(|_| "C:\\Windows".to_string());
    PathBuf::from(format!("{}\\System32\\inetsrv\\config\\applicationHost.config", windir))
}

/// Expand `%VAR%` references. `%SystemDrive%` falls back to `C:`; other
/// unknown variables are left untouched.
pub fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(v) => out.push_str(&v),
                    Err(_) if name.eq_ignore_ascii_case("SystemDrive") => out.push_str("C:"),
                    Err(_) => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

impl ApplicationHostConfig {
    /// Load and parse the file. A missing file means IIS is not installed;
    /// a malformed one makes every listing fail with the parse message.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let root = match config_parser::read_config(&path) {
            Ok(text) => parse_document(&text).map(Some),
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "applicationHost.config not present");
                Ok(None)
            }
            Err(e) => Err(e.to_string()),
        };
        if let Err(msg) = &root {
            warn!(path = %path.display(), error = %msg, "cannot parse applicationHost.config");
        }
        ApplicationHostConfig { path, root }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn root(&self) -> Result<Option<&Element>> {
        match &self.root {
            Ok(r) => Ok(r.as_ref()),
            Err(msg) => Err(anyhow!("{}: {}", self.path.display(), msg)),
        }
    }

    fn sites_element(&self) -> Result<Option<&Element>> {
        Ok(self.root()?.and_then(|r| r.descendants().into_iter().find(|e| e.is("sites"))))
    }

    fn find_site(&self, name: &str) -> Result<Option<&Element>> {
        Ok(self
            .sites_element()?
            .and_then(|s| s.children.iter().find(|c| c.is("site") && c.attr("name") == Some(name))))
    }
}

fn default_pool(sites: &Element, site: &Element) -> String {
    site.child("applicationDefaults")
        .or_else(|| sites.child("applicationDefaults"))
        .and_then(|d| d.attr("applicationPool"))
        .unwrap_or("DefaultAppPool")
        .to_string()
}

fn app_physical_path(app: &Element) -> PathBuf {
    let vdir = app
        .children
        .iter()
        .find(|c| c.is("virtualDirectory") && c.attr("path") == Some("/"))
        .or_else(|| app.child("virtualDirectory"));
    PathBuf::from(expand_env(vdir.and_then(|v| v.attr("physicalPath")).unwrap_or("")))
}

impl IisQuery for ApplicationHostConfig {
    fn is_available(&self) -> bool {
        !matches!(self.root, Ok(None))
    }

    fn load_error(&self) -> Option<String> {
        self.root.as_ref().err().map(|msg| format!("{}: {}", self.path.display(), msg))
    }

    fn list_sites(&self) -> Result<Vec<SiteRecord>> {
        let Some(sites) = self.sites_element()? else { return Ok(Vec::new()) };
        Ok(sites
            .children
            .iter()
            .filter(|c| c.is("site"))
            .map(|site| {
                let pool_default = default_pool(sites, site);
                let root_app = site.children.iter().find(|c| c.is("application") && c.attr("path") == Some("/"));
                SiteRecord {
                    name: site.attr("name").unwrap_or_default().to_string(),
                    physical_path: root_app.map(app_physical_path).unwrap_or_default(),
                    application_pool: root_app
                        .and_then(|a| a.attr("applicationPool"))
                        .map(|s| s.to_string())
                        .unwrap_or(pool_default),
                    state: None,
                    auto_start: !site.attr("serverAutoStart").map(|v| v.eq_ignore_ascii_case("false")).unwrap_or(false),
                }
            })
            .collect())
    }

    fn list_applications(&self, site_name: &str) -> Result<Vec<ApplicationRecord>> {
        let Some(sites) = self.sites_element()? else { return Ok(Vec::new()) };
        let site = self.find_site(site_name)?.ok_or_else(|| anyhow!("site '{}' not found", site_name))?;
        let pool_default = default_pool(sites, site);
        Ok(site
            .children
            .iter()
            .filter(|c| c.is("application"))
            .filter_map(|app| {
                let path = app.attr("path")?;
                if path == "/" {
                    return None;
                }
                Some(ApplicationRecord {
                    path: path.to_string(),
                    physical_path: app_physical_path(app),
                    application_pool: app.attr("applicationPool").map(|s| s.to_string()).unwrap_or_else(|| pool_default.clone()),
                })
            })
            .collect())
    }

    fn list_app_pools(&self) -> Result<Vec<AppPoolRecord>> {
        let Some(root) = self.root()? else { return Ok(Vec::new()) };
        let Some(pools) = root.descendants().into_iter().find(|e| e.is("applicationPools")) else {
            return Ok(Vec::new());
        };
        Ok(pools
            .children
            .iter()
            .filter(|c| c.is("add"))
            .filter_map(|p| {
                Some(AppPoolRecord {
                    name: p.attr("name")?.to_string(),
                    state: None,
                    auto_start: !p.attr("autoStart").map(|v| v.eq_ignore_ascii_case("false")).unwrap_or(false),
                    runtime_version: p.attr("managedRuntimeVersion").map(|s| s.to_string()),
                })
            })
            .collect())
    }
}
