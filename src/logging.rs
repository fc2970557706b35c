use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the default directive.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "lead_scoring=debug"
    } else {
        "lead_scoring=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoUtc::rfc_3339())
        .with_target(false)
        .init();
}
