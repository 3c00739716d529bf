use std::io::IsTerminal;

use portcullis_config::log::{LogFormat, LoggingConfig};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs the global `tracing` subscriber from the logging config.
/// Safe to call more than once; only the first call wins, which keeps
/// test binaries from panicking when several tests set up logging.
pub fn configure_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(config.env_filter_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let is_terminal = std::io::stdout().is_terminal();
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
    let timer = UtcTime::rfc_3339();

    let layer = match config.format {
        LogFormat::Json => fmt_layer
            .json()
            .with_timer(timer)
            .with_thread_ids(false)
            .with_target(false)
            .with_ansi(false)
            .flatten_event(true)
            .boxed(),
        LogFormat::Compact => fmt_layer
            .compact()
            .with_timer(timer)
            .with_thread_ids(false)
            .with_target(false)
            .with_ansi(is_terminal)
            .boxed(),
        LogFormat::Pretty => fmt_layer
            .pretty()
            .with_timer(timer)
            .with_ansi(is_terminal)
            .boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}
