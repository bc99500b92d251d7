use regex::Regex;
use std::sync::OnceLock;

/// Server and database tokens of an ADO-style connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParts {
    pub server: Option<String>,
    pub database: Option<String>,
}

fn server_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|;)\s*(?:data\s+source|server|address|addr|network\s+address)\s*=\s*([^;]*)")
            .expect("static regex")
    })
}

fn database_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|;)\s*(?:initial\s+catalog|database)\s*=\s*([^;]*)").expect("static regex")
    })
}

fn capture(re: &Regex, s: &str) -> Option<String> {
    re.captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_matches('"').trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Tokens may appear in any order; unmatched tokens come back as `None`.
pub fn parse_connection_string(s: &str) -> ConnectionParts {
    ConnectionParts { server: capture(server_re(), s), database: capture(database_re(), s) }
}

pub const DEFAULT_SQL_PORT: u16 = 1433;

/// Where a SQL Server data source points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlEndpoint {
    pub host: String,
    /// Explicit `,port`.
    pub port: Option<u16>,
    /// Named instance from `host\INSTANCE`.
    pub instance: Option<String>,
}

impl SqlEndpoint {
    /// Named instance without an explicit port; its port must be looked up
    /// through SQL Browser.
    pub fn needs_browser(&self) -> bool {
        self.port.is_none() && self.instance.is_some()
    }
}

/// Split a SQL Server data source into host, optional port and optional
/// instance name. A `tcp:` prefix is dropped.
pub fn sql_endpoint(data_source: &str) -> SqlEndpoint {
    let ds = data_source.trim();
    let ds = ds.strip_prefix("tcp:").or_else(|| ds.strip_prefix("TCP:")).unwrap_or(ds);
    let (server, port) = match ds.split_once(',') {
        Some((h, p)) => (h, Some(p.trim().parse::<u16>().unwrap_or(DEFAULT_SQL_PORT))),
        None => (ds, None),
    };
    let (host, instance) = match server.split_once('\\') {
        Some((h, i)) => (h.trim(), Some(i.trim()).filter(|i| !i.is_empty()).map(str::to_string)),
        None => (server.trim(), None),
    };
    let host = match host {
        "." | "(local)" | "localhost" => "127.0.0.1",
        other => other,
    };
    SqlEndpoint { host: host.to_string(), port, instance }
}
