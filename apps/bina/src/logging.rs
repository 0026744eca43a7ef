//! Diagnostic logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the `tracing` filter directive.
pub const LOG_ENV: &str = "BINA_LOG";

/// Installs the global subscriber, writing to stderr.
///
/// `BINA_LOG` wins when set; otherwise the level is `debug` for plans that ask
/// for it and `warn` for everything else. Later calls are no-ops.
pub fn init(debug: bool) {
    let env = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(filter_directive(env.as_deref(), debug))
        .unwrap_or_else(|_| EnvFilter::new(default_level(debug)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_level(debug: bool) -> &'static str {
    if debug { "debug" } else { "warn" }
}

fn filter_directive(env: Option<&str>, debug: bool) -> String {
    match env.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => default_level(debug).to_string(),
    }
}
