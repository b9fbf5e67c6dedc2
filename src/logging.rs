use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins over the configured level.
pub fn init_logger(default_level: &str) {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter_layer)
        .init();
}
