use crate::SecurityProbe;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Whether the process runs with administrative rights.
#[cfg(unix)]
pub fn is_elevated() -> Result<bool> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    Ok(unsafe { libc::geteuid() } == 0)
}

/// Whether the process runs with administrative rights. `net session`
/// succeeds only in an elevated token.
#[cfg(windows)]
pub fn is_elevated() -> Result<bool> {
    let status = std::process::Command::new("net")
        .arg("session")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .context("failed to run 'net session'")?;
    Ok(status.success())
}

#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> Result<bool> {
    anyhow::bail!("elevation check not supported on this platform")
}

/// Create, write and remove a marker file in `dir`.
pub fn probe_write_access(dir: &Path) -> Result<()> {
    let marker = dir.join(format!(".ess-readiness-write-probe-{}", std::process::id()));
    let mut f = fs::File::create(&marker).with_context(|| format!("cannot create {}", marker.display()))?;
    f.write_all(b"probe").with_context(|| format!("cannot write {}", marker.display()))?;
    drop(f);
    fs::remove_file(&marker).with_context(|| format!("cannot remove {}", marker.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct LocalSecurity;

impl SecurityProbe for LocalSecurity {
    fn is_elevated(&self) -> Result<bool> {
        is_elevated()
    }

    fn probe_write(&self, dir: &Path) -> Result<()> {
        probe_write_access(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_probe_leaves_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        probe_write_access(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn write_probe_fails_on_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe_write_access(&dir.path().join("absent")).unwrap_err();
        assert!(err.to_string().contains("cannot create"));
    }

    #[test]
    fn elevation_check_answers() {
        assert!(is_elevated().is_ok());
    }
}
