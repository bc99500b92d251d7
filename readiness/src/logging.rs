use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

pub const LOG_ENV: &str = "ESS_READINESS_LOG";

/// Install the stderr subscriber. `ESS_READINESS_LOG` takes an `EnvFilter`
/// directive (`validation=debug,health_probe=info`); without it the level is
/// `info`, or `debug` with `--verbose`. Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .init();
    });
}
