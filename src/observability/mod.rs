//! # Observability Infrastructure
//!
//! Installs the global `tracing` subscriber.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` with `verbose` and `info`
/// without. Logs go to stderr so that command output stays clean. A second
/// call is ignored.
pub fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder().with_env_filter(filter).with_writer(std::io::stderr);
    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if result.is_err() {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_ignored() {
        init_logging(false, false);
        init_logging(true, true);
        tracing::info!("still logging");
    }
}
