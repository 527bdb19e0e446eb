use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console logging for the runner.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sos_leads=info,sos_pipeline=info"));

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // try_init: tests and embedding callers may have installed a subscriber already
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
