//! Tracing initialisation for valmon hosts.
//!
//! The engine itself only emits `tracing` events; whoever embeds it decides
//! where they go. Binaries call [`init_tracing`] once at startup. Log lines
//! always go to stderr so stdout stays free for command output.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "VALMON_LOG";

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber.
///
/// * `json`: emit newline-delimited JSON instead of human-readable lines.
/// * `level`: verbosity when neither `VALMON_LOG` nor `RUST_LOG` is set.
///
/// Later calls are ignored; the global subscriber can be set only once.
pub fn init_tracing(json: bool, level: Level) {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber belongs to `#[traced_test]` in this binary.
    #[test]
    fn env_filter_falls_back_to_level() {
        let filter = env_filter(Level::WARN);
        assert!(!filter.to_string().is_empty());
    }
}
