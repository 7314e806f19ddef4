//! Diagnostic logging setup
//!
//! Logs go to stderr so stdout stays reserved for the operator dialogue.
//! `RUST_LOG` always wins; otherwise the level follows `--verbose`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset and `--verbose` is off
const DEFAULT_FILTER: &str = "warn";

/// Filter used when `RUST_LOG` is unset and `--verbose` is on
const VERBOSE_FILTER: &str = "info,fileagent=debug";

/// Pick the fallback filter directive for the given verbosity
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Initialize the tracing subscriber
///
/// # Example
/// ```ignore
/// init_tracing(true)?;
/// ```
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(filter = default_filter(verbose), "Tracing initialized");

    Ok(())
}
