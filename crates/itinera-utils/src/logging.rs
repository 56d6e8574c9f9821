//! Tracing setup and request spans.
//!
//! Library code only emits `tracing` events; the binary decides where they
//! go by calling [`init_tracing`] once at startup.

use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the filter is `itinera=info,warn`, or
/// `itinera=debug,info` when `verbose` is true. Verbose output also reports
/// span close events so per-request durations show up.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "itinera=debug,info"
    } else {
        "itinera=info,warn"
    }
}

/// Span wrapping one orchestrated request.
///
/// `kind` names the request type (`itinerary`, `intent`, `answer`) and `key`
/// is its cache key or another stable identifier.
pub fn request_span(kind: &str, key: &str) -> tracing::Span {
    span!(Level::INFO, "request", kind = %kind, key = %key)
}
