//! Logging init for the command-line front end. The library only emits
//! `tracing` events; hosts install their own subscriber.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,fetchlinks=debug";

/// Log to stderr, filtered by `RUST_LOG` unless `verbose` asks for everything.
pub fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
