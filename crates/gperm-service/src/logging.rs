//! Subscriber setup driven by [`LoggingSettings`].
//!
//! The filter is `logging.level` plus one directive per `logging.targets`
//! entry, so engine internals can be turned up without flooding the rest:
//!
//! ```yaml
//! logging:
//!   level: info
//!   json: true
//!   targets:
//!     gperm_domain: debug
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured filter. With `json: true`
//! each event is one line:
//!
//! ```json
//! {"timestamp":"2026-01-15T10:30:00.000Z","level":"INFO","target":"gperm_service::service","fields":{"message":"saved permission override","group_id":3}}
//! ```

use tracing::Subscriber;
use tracing_subscriber::fmt::{self, format::FmtSpan, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{prelude::*, EnvFilter, Layer};

use crate::config::LoggingSettings;

/// Filter directives for `settings`, e.g. `info,gperm_domain=debug`.
pub fn directives(settings: &LoggingSettings) -> String {
    let mut directives = settings.level.to_lowercase();
    for (target, level) in &settings.targets {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(&level.to_lowercase());
    }
    directives
}

fn format_layer<S, W>(settings: &LoggingSettings, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let span_events = if settings.spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    if settings.json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_current_span(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .boxed()
    }
}

/// The configured subscriber writing to `writer`.
///
/// Ignores `RUST_LOG`; used to capture output in tests.
pub fn subscriber_with_writer<W>(
    settings: &LoggingSettings,
    writer: W,
) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new(directives(settings)))
        .with(format_layer(settings, writer))
}

/// Installs the global subscriber writing to stdout.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(settings)));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(settings, std::io::stdout));
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
