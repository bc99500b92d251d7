use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config_parser::{inspect_web_config, parse_ess_config, parse_wfe_config};
use health_probe::HealthProbe;
use host_facts::{collect_system_facts, LocalSecurity};
use iis_discovery::{discover_detailed, ApplicationHostConfig, IisQuery};
use readiness_core::ResultStore;
use readiness_report::{default_file_name, write_report, ReportFormat, RunReport};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use validation::{run, AutoSelector, RunOutcome, ValidationEngine};

mod config;
mod console;
mod logging;

use config::Config;
use console::ConsoleSelector;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ReportKind { Html, Json, Csv }

impl From<ReportKind> for ReportFormat {
    fn from(k: ReportKind) -> Self {
        match k {
            ReportKind::Html => ReportFormat::Html,
            ReportKind::Json => ReportFormat::Json,
            ReportKind::Csv => ReportFormat::Csv,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ConfigKind { Ess, Wfe, Web }

#[derive(Debug, Parser)]
#[command(name = "ess-readiness", version, about = "ESS/WFE pre-upgrade readiness checker")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./ess-readiness.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug-level logging (ESS_READINESS_LOG overrides)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// List candidate ESS/WFE instances found in IIS
    Discover {
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run every readiness check and write a report
    Check {
        /// Select all ESS and WFE instances without prompting
        #[arg(long, default_value_t = false)]
        auto: bool,
        /// ESS base URL for an instance alias, e.g. ESS=https://ess.corp (repeatable)
        #[arg(long = "site-url", value_name = "ALIAS=URL")]
        site_urls: Vec<String>,
        /// Report file (overwrites). Default: ess-readiness-<host>-<time>.<ext>
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Report format: html, json or csv
        #[arg(long, value_enum)]
        format: Option<ReportKind>,
        /// Per-attempt health-check timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Health-check retries after the first attempt
        #[arg(long)]
        retries: Option<u32>,
        /// Fixed delay between health-check attempts in seconds
        #[arg(long)]
        retry_delay_secs: Option<u64>,
    },
    /// Call <BASE_URL>/api/v1/healthcheck once, with retries
    Probe {
        /// ESS base URL, e.g. https://ess.corp.example/ESS
        base_url: String,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long)]
        retries: Option<u32>,
        #[arg(long)]
        retry_delay_secs: Option<u64>,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Parse a configuration file and print what was extracted (JSON)
    ParseConfig {
        file: PathBuf,
        #[arg(long, value_enum)]
        kind: ConfigKind,
    },
}

fn parse_site_url(s: &str) -> Result<(String, String)> {
    let (alias, url) = s.split_once('=').ok_or_else(|| anyhow!("expected ALIAS=URL, got '{}'", s))?;
    let (alias, url) = (alias.trim(), url.trim());
    if alias.is_empty() || url.is_empty() {
        return Err(anyhow!("expected ALIAS=URL, got '{}'", s));
    }
    Ok((alias.to_string(), url.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    let cfg = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    match cli.command {
        Commands::Version => {
            println!("ess-readiness {} (core {})", env!("CARGO_PKG_VERSION"), readiness_core::version());
        }
        Commands::Discover { format } => {
            let iis = ApplicationHostConfig::load(cfg.application_host_path());
            if !iis.is_available() {
                return Err(anyhow!("IIS configuration not found at {}", iis.path().display()));
            }
            let found = discover_detailed(&iis)?;
            match format {
                OutputFormat::Text => {
                    println!("candidate instances ({}):", found.instances.len());
                    for i in &found.instances {
                        println!("  {:<7} {:<40} pool={} path={}", i.instance_type.as_str(), i.id(), i.application_pool, i.physical_path.display());
                    }
                    for s in &found.skipped {
                        println!("  skipped site {}: {}", s.site_name, s.reason);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&found)?),
            }
        }
        Commands::Check { auto, site_urls, out, format, timeout_secs, retries, retry_delay_secs } => {
            let mut urls = cfg.site_urls();
            for s in &site_urls {
                let (alias, url) = parse_site_url(s)?;
                urls.insert(alias, url);
            }
            let opts = CheckOptions { auto, urls, out, format: format.map(ReportFormat::from), timeout_secs, retries, retry_delay_secs };
            let code = run_check(&cfg, opts)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Probe { base_url, timeout_secs, retries, retry_delay_secs, format } => {
            let mut opts = cfg.engine_settings().api.probe_options(false);
            if let Some(t) = timeout_secs { opts.timeout = Duration::from_secs(t); }
            if let Some(r) = retries { opts.max_retries = r; }
            if let Some(d) = retry_delay_secs { opts.retry_delay = Duration::from_secs(d); }
            let probe = HealthProbe::new(opts)?;
            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            let outcome = rt.block_on(probe.probe(&base_url));
            let duration_ms = started.elapsed().as_millis();
            match format {
                OutputFormat::Text => {
                    if outcome.success {
                        println!(
                            "{}: {} ({} attempt(s), {} ms)",
                            outcome.uri,
                            outcome.overall_status.as_deref().or(outcome.error.as_deref()).unwrap_or("reachable"),
                            outcome.retry_attempts,
                            duration_ms
                        );
                        for c in &outcome.components {
                            println!("  {} {} {}", c.name, c.status, c.version.as_deref().unwrap_or(""));
                        }
                    } else {
                        println!("{}: {}", outcome.uri, outcome.error.as_deref().unwrap_or("failed"));
                    }
                }
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "outcome": outcome,
                        "duration_ms": duration_ms,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
            if !outcome.success {
                std::process::exit(2);
            }
        }
        Commands::ParseConfig { file, kind } => {
            let value = match kind {
                ConfigKind::Ess => serde_json::to_value(parse_ess_config(&file)?)?,
                ConfigKind::Wfe => serde_json::to_value(parse_wfe_config(&file)?)?,
                ConfigKind::Web => serde_json::to_value(inspect_web_config(&file)?)?,
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

struct CheckOptions {
    auto: bool,
    urls: BTreeMap<String, String>,
    out: Option<PathBuf>,
    format: Option<ReportFormat>,
    timeout_secs: Option<u64>,
    retries: Option<u32>,
    retry_delay_secs: Option<u64>,
}

fn run_check(cfg: &Config, opts: CheckOptions) -> Result<i32> {
    let mut settings = cfg.engine_settings();
    if let Some(t) = opts.timeout_secs {
        settings.api.timeout = Duration::from_secs(t);
        settings.api.batch_timeout = Duration::from_secs(t);
    }
    if let Some(r) = opts.retries { settings.api.max_retries = r; }
    if let Some(d) = opts.retry_delay_secs { settings.api.retry_delay = Duration::from_secs(d); }

    let iis = ApplicationHostConfig::load(cfg.application_host_path());
    let reach = cfg.reachability();
    let security = LocalSecurity;
    let mut facts = collect_system_facts();
    cfg.apply_fact_overrides(&mut facts);
    if facts.iis_version.is_none() {
        facts.iis_version = iis.version();
    }

    let engine = ValidationEngine::new(settings, &iis, &reach, &reach, &security);
    let mut store = ResultStore::new();
    let rt = tokio::runtime::Runtime::new()?;
    let started = Instant::now();
    let outcome: RunOutcome = if opts.auto {
        let mut selector = AutoSelector::new(opts.urls);
        rt.block_on(run(&engine, &mut selector, &facts, &mut store))
    } else {
        let stdin = std::io::stdin();
        let mut selector = ConsoleSelector::new(stdin.lock(), std::io::stderr(), opts.urls);
        rt.block_on(run(&engine, &mut selector, &facts, &mut store))
    };
    info!(results = store.len(), elapsed_ms = started.elapsed().as_millis() as u64, "run complete");

    let host = facts.host_name.clone().unwrap_or_else(|| "localhost".to_string());
    let report = RunReport::new(host, env!("CARGO_PKG_VERSION"), outcome.selected, store);
    let format = opts.format.or_else(|| cfg.report_format()).unwrap_or_default();
    let path = match opts.out {
        Some(p) => p,
        None => {
            let name = default_file_name(&report, format);
            cfg.report_dir().map(|d| d.join(&name)).unwrap_or_else(|| PathBuf::from(name))
        }
    };
    write_report(&report, format, &path).with_context(|| format!("writing report to {}", path.display()))?;

    let s = report.summary;
    println!(
        "{}: {} passed, {} failed, {} warnings, {} info -> {}",
        if report.is_ready() { "READY" } else { "NOT READY" },
        s.pass,
        s.fail,
        s.warning,
        s.info,
        path.display()
    );
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_url_pairs() {
        assert_eq!(parse_site_url("ESS=https://h/ESS").unwrap(), ("ESS".to_string(), "https://h/ESS".to_string()));
        assert_eq!(parse_site_url(" a = http://x?y=1 ").unwrap().1, "http://x?y=1");
        assert!(parse_site_url("ESS").is_err());
        assert!(parse_site_url("=http://x").is_err());
    }

    #[test]
    fn cli_parses_check_flags() {
        let cli = Cli::try_parse_from([
            "ess-readiness", "check", "--auto", "--site-url", "ESS=https://h", "--format", "csv", "--retries", "0",
        ])
        .unwrap();
        match cli.command {
            Commands::Check { auto, site_urls, format, retries, .. } => {
                assert!(auto);
                assert_eq!(site_urls, vec!["ESS=https://h".to_string()]);
                assert_eq!(format, Some(ReportKind::Csv));
                assert_eq!(retries, Some(0));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_parses_parse_config() {
        let cli = Cli::try_parse_from(["ess-readiness", "parse-config", "tenants.config", "--kind", "wfe"]).unwrap();
        assert!(matches!(cli.command, Commands::ParseConfig { kind: ConfigKind::Wfe, .. }));
    }
}
