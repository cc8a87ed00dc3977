//! tracing-subscriber setup.

use sketchwire_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `-v`, then `logging.level`, then `info`,
/// plus any per-crate `logging.filters` directives.
fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = if verbose {
        "debug"
    } else {
        config.level.as_deref().unwrap_or("info")
    };
    let mut filter = EnvFilter::new(level);
    for directive in &config.filters {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("ignoring log filter {directive:?}: {e}"),
        }
    }
    filter
}

pub fn init(config: &LoggingConfig, verbose: bool) {
    let filter = build_filter(config, verbose);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let json = config.format == "json";
    let stdout = config.output == "stdout";

    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}
