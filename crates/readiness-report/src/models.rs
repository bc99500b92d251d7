use readiness_core::{HealthCheckResult, Instance, ResultStore, Summary};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Everything one readiness run produced, in a stable serialisable shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub host: String,
    pub tool_version: String,
    pub instances: Vec<Instance>,
    pub results: Vec<HealthCheckResult>,
    pub summary: Summary,
}

impl RunReport {
    pub fn new(host: impl Into<String>, tool_version: impl Into<String>, instances: Vec<Instance>, store: ResultStore) -> Self {
        let summary = store.summary();
        let results = store.into_results();
        RunReport {
            run_id: Uuid::now_v7(),
            generated_at: OffsetDateTime::now_utc(),
            host: host.into(),
            tool_version: tool_version.into(),
            instances,
            results,
            summary,
        }
    }

    /// No FAIL result was recorded.
    pub fn is_ready(&self) -> bool {
        self.summary.fail == 0
    }

    /// Process exit status for this report: 0 when ready, 2 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_ready() {
            0
        } else {
            2
        }
    }

    /// Categories in order of first appearance.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in &self.results {
            if !out.contains(&r.category.as_str()) {
                out.push(&r.category);
            }
        }
        out
    }
}
