//! Logging setup for the `survey` binary.
//!
//! Engine decisions (pruning, reveals, rejected answers, save failures) are
//! emitted by `survey-spec` through `tracing`; this module routes them to
//! stderr so stdout stays clean for rendered output.

use std::io;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. `RUST_LOG` overrides the default level,
/// which is `warn`, or `debug` with `--verbose`.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let layer = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(verbose)
        .without_time();

    // A subscriber may already be set when running under a test harness.
    if let Err(error) = tracing_subscriber::registry()
        .with(build_env_filter(level))
        .with(layer)
        .try_init()
    {
        tracing::debug!(%error, "global subscriber already installed");
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,survey={level},survey_spec={level}",
            level = level
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init_logging(false);
        init_logging(true);
        tracing::warn!("still routed after a repeated init");
    }

    #[test]
    fn default_filter_scopes_crate_levels() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = build_env_filter(Level::DEBUG).to_string();
        assert!(filter.contains("survey=debug"));
        assert!(filter.contains("survey_spec=debug"));
    }
}
