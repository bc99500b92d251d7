use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
    Warning,
    Info,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Warning => "WARNING",
            Status::Info => "INFO",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded outcome. Never mutated once appended to a [`ResultStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub category: String,
    pub check: String,
    pub status: Status,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HealthCheckResult {
    pub fn new(category: impl Into<String>, check: impl Into<String>, status: Status, message: impl Into<String>) -> Self {
        HealthCheckResult {
            category: category.into(),
            check: check.into(),
            status,
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub pass: usize,
    pub fail: usize,
    pub warning: usize,
    pub info: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.pass + self.fail + self.warning + self.info
    }
}

/// Append-only collection of results for a single run.
///
/// The store is owned by the caller and passed by `&mut` into every check, so
/// there is no process-wide state. Callers that validate instances in parallel
/// must wrap it in a `Mutex` or feed it from a channel; report consumers treat
/// the order of results as attribution-only.
#[derive(Debug, Default, Clone)]
pub struct ResultStore {
    results: Vec<HealthCheckResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, category: impl Into<String>, check: impl Into<String>, status: Status, message: impl Into<String>) {
        self.push(HealthCheckResult::new(category, check, status, message));
    }

    pub fn push(&mut self, result: HealthCheckResult) {
        self.results.push(result);
    }

    /// Drop every result. Only called at the start of a fresh run.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn results(&self) -> &[HealthCheckResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a HealthCheckResult> + 'a {
        self.results.iter().filter(move |r| r.category == category)
    }

    /// First result whose check name matches exactly.
    pub fn find(&self, check: &str) -> Option<&HealthCheckResult> {
        self.results.iter().find(|r| r.check == check)
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for r in &self.results {
            match r.status {
                Status::Pass => s.pass += 1,
                Status::Fail => s.fail += 1,
                Status::Warning => s.warning += 1,
                Status::Info => s.info += 1,
            }
        }
        s
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.status == Status::Fail)
    }

    pub fn into_results(self) -> Vec<HealthCheckResult> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_sum_to_adds() {
        let mut store = ResultStore::new();
        let statuses = [Status::Pass, Status::Fail, Status::Warning, Status::Info, Status::Pass, Status::Pass, Status::Info];
        for (i, s) in statuses.iter().enumerate() {
            store.add("System Requirements", format!("check {}", i), *s, "m");
        }
        let sum = store.summary();
        assert_eq!(sum.total(), statuses.len());
        assert_eq!(sum.pass, 3);
        assert_eq!(sum.fail, 1);
        assert_eq!(sum.warning, 1);
        assert_eq!(sum.info, 2);
        assert!(store.has_failures());
    }

    #[test]
    fn clear_resets() {
        let mut store = ResultStore::new();
        store.add("Network", "adapters", Status::Pass, "2 active");
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.summary().total(), 0);
    }

    #[test]
    fn category_filter_and_find() {
        let mut store = ResultStore::new();
        store.add("Network", "Internet Connectivity", Status::Warning, "offline");
        store.add("Security", "Administrator", Status::Pass, "elevated");
        assert_eq!(store.by_category("Security").count(), 1);
        assert_eq!(store.find("Internet Connectivity").map(|r| r.status), Some(Status::Warning));
        assert!(store.find("missing").is_none());
    }

    #[test]
    fn result_serializes_with_uppercase_status_and_rfc3339() {
        let r = HealthCheckResult::new("Security", "Administrator", Status::Fail, "not elevated");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "FAIL");
        assert!(v["timestamp"].as_str().unwrap().contains('T'));
    }
}
