//! Remote health-check probe for ESS endpoints with fixed-delay retries.

mod policy;

pub use policy::{after_failure, classify_error, classify_status, error_text, FailureKind, Step, Termination};

use anyhow::Result;
use reqwest::{redirect::Policy, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const HEALTH_PATH: &str = "/api/v1/healthcheck";

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
    pub use_system_proxy: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
            user_agent: format!("ess-readiness/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: false,
            use_system_proxy: true,
        }
    }
}

impl ProbeOptions {
    pub fn from_secs(timeout_secs: u64, max_retries: u32, retry_delay_secs: u64) -> Self {
        ProbeOptions {
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            retry_delay: Duration::from_secs(retry_delay_secs),
            ..Default::default()
        }
    }

    /// Upper bound on one probe call's wall-clock time.
    pub fn worst_case(&self) -> Duration {
        self.timeout * (self.max_retries + 1) + self.retry_delay * self.max_retries
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Status")]
    pub status: String,
    #[serde(default, alias = "Version")]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(rename = "overallStatus", alias = "OverallStatus")]
    overall_status: String,
    #[serde(default, alias = "Components")]
    components: Vec<Component>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub uri: String,
    pub status_code: Option<u16>,
    pub success: bool,
    pub overall_status: Option<String>,
    pub components: Vec<Component>,
    pub error: Option<String>,
    /// Attempts made, the initial one included.
    pub retry_attempts: u32,
    pub termination: Termination,
    pub failure: Option<FailureKind>,
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        self.success && self.overall_status.as_deref().map(|s| s.eq_ignore_ascii_case("healthy")).unwrap_or(false)
    }

    pub fn non_standard_payload(&self) -> bool {
        self.termination == Termination::NonStandardPayload
    }
}

/// `<base>/api/v1/healthcheck`. Only absolute http(s) URLs are accepted.
pub fn endpoint_url(base_url: &str) -> std::result::Result<Url, String> {
    let base = base_url.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{}{}", base, HEALTH_PATH)).map_err(|e| format!("'{}': {}", base_url, e))?;
    if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() {
        Ok(url)
    } else {
        Err(format!("'{}': unsupported scheme '{}'", base_url, url.scheme()))
    }
}

const MAX_REDIRECTS: usize = 5;

/// Scheme or host moves are followed; anything that leaves the health-check
/// path (a login page) is not.
fn stays_on_endpoint(url: &Url) -> bool {
    url.path().trim_end_matches('/').ends_with(HEALTH_PATH)
}

enum Attempt {
    Healthy { code: u16, payload: Payload },
    NonStandard { code: u16, detail: String },
    Failed { code: Option<u16>, kind: FailureKind, detail: String },
}

pub struct HealthProbe {
    client: Client,
    opts: ProbeOptions,
}

impl HealthProbe {
    pub fn new(opts: ProbeOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .redirect(Policy::custom(|attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if stays_on_endpoint(attempt.url()) {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .timeout(opts.timeout)
            .connect_timeout(opts.timeout)
            .user_agent(opts.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .danger_accept_invalid_certs(opts.accept_invalid_certs);
        if !opts.use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(HealthProbe { client: builder.build()?, opts })
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.opts
    }

    /// Probe `<base_url>/api/v1/healthcheck` until it answers, a terminal
    /// failure occurs, or the retries are used up. Never returns an error:
    /// every failure mode is described by the outcome.
    pub async fn probe(&self, base_url: &str) -> ProbeOutcome {
        let url = match endpoint_url(base_url) {
            Ok(u) => u,
            Err(detail) => {
                warn!(base_url, error = %detail, "malformed health-check url");
                return ProbeOutcome {
                    uri: format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH),
                    status_code: None,
                    success: false,
                    overall_status: None,
                    components: Vec::new(),
                    error: Some(format!("{}: {}", FailureKind::MalformedUrl, detail)),
                    retry_attempts: 1,
                    termination: Termination::Terminal,
                    failure: Some(FailureKind::MalformedUrl),
                };
            }
        };
        let uri = url.to_string();

        let mut step = Step::Attempt(1);
        let mut last: Option<(Option<u16>, FailureKind, String)> = None;
        let mut attempts = 0;
        loop {
            match step {
                Step::Attempt(n) => {
                    attempts = n;
                    if n > 1 && !self.opts.retry_delay.is_zero() {
                        tokio::time::sleep(self.opts.retry_delay).await;
                    }
                    debug!(uri = %uri, attempt = n, "health-check attempt");
                    match self.attempt(url.clone()).await {
                        Attempt::Healthy { code, payload } => {
                            info!(uri = %uri, status = %payload.overall_status, attempts = n, "health-check answered");
                            return ProbeOutcome {
                                uri,
                                status_code: Some(code),
                                success: true,
                                overall_status: Some(payload.overall_status),
                                components: payload.components,
                                error: None,
                                retry_attempts: n,
                                termination: Termination::Success,
                                failure: None,
                            };
                        }
                        Attempt::NonStandard { code, detail } => {
                            info!(uri = %uri, attempts = n, "health-check reachable with non-standard payload");
                            return ProbeOutcome {
                                uri,
                                status_code: Some(code),
                                success: true,
                                overall_status: None,
                                components: Vec::new(),
                                error: Some(format!("reachable but non-standard payload: {}", detail)),
                                retry_attempts: n,
                                termination: Termination::NonStandardPayload,
                                failure: None,
                            };
                        }
                        Attempt::Failed { code, kind, detail } => {
                            warn!(uri = %uri, attempt = n, kind = %kind, error = %detail, "health-check attempt failed");
                            step = after_failure(n, self.opts.max_retries, kind);
                            last = Some((code, kind, detail));
                        }
                    }
                }
                Step::Done(termination) => {
                    let (code, kind, detail) = last.unwrap_or((None, FailureKind::Other, "no attempt made".into()));
                    let suffix = match termination {
                        Termination::RetriesExhausted => format!(" (retries exhausted after {} attempt(s))", attempts),
                        _ => String::new(),
                    };
                    return ProbeOutcome {
                        uri,
                        status_code: code,
                        success: false,
                        overall_status: None,
                        components: Vec::new(),
                        error: Some(format!("{}: {}{}", kind, detail, suffix)),
                        retry_attempts: attempts,
                        termination,
                        failure: Some(kind),
                    };
                }
            }
        }
    }

    async fn attempt(&self, url: Url) -> Attempt {
        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Failed { code: None, kind: classify_error(&e), detail: error_text(&e) },
        };
        let code = resp.status().as_u16();
        if resp.status().is_redirection() {
            let target = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("elsewhere")
                .to_string();
            return Attempt::Failed {
                code: Some(code),
                kind: FailureKind::Unauthorized,
                detail: format!("HTTP {} redirect to {} (authentication required)", resp.status(), target),
            };
        }
        if let Some(kind) = classify_status(code) {
            return Attempt::Failed { code: Some(code), kind, detail: format!("HTTP {}", resp.status()) };
        }
        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => return Attempt::Failed { code: Some(code), kind: classify_error(&e), detail: error_text(&e) },
        };
        match serde_json::from_slice::<Payload>(&body) {
            Ok(payload) => Attempt::Healthy { code, payload },
            Err(e) => Attempt::NonStandard { code, detail: e.to_string() },
        }
    }
}

/// One-shot convenience wrapper.
pub async fn probe(base_url: &str, opts: ProbeOptions) -> Result<ProbeOutcome> {
    Ok(HealthProbe::new(opts)?.probe(base_url).await)
}
