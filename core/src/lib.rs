//! Core data model and shared types for the readiness engine.

pub mod error;
pub mod model;
pub mod store;

pub use error::{error_chain, CheckError};
pub use model::{EssConfig, Instance, InstanceType, TenantConfig};
pub use store::{HealthCheckResult, ResultStore, Status, Summary};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Compare two dotted version strings numerically ("4.8" < "4.10", "10.0" == "10").
/// Non-numeric components compare as zero.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.trim()
            .split(|c: char| c == '.' || c == ',')
            .map(|p| {
                let digits: String = p
                    .trim_start_matches(|c: char| !c.is_ascii_digit())
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    };
    let (va, vb) = (parse(a), parse(b));
    let len = va.len().max(vb.len());
    for i in 0..len {
        let x = va.get(i).copied().unwrap_or(0);
        let y = vb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("4.8", "4.10"), Ordering::Less);
        assert_eq!(compare_versions("10.0", "10"), Ordering::Equal);
        assert_eq!(compare_versions("4.8.1", "4.8"), Ordering::Greater);
        assert_eq!(compare_versions("v4.7.2", "4.8"), Ordering::Less);
    }
}
